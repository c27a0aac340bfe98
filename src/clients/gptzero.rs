//! 检测器 A（GPTZero）
//!
//! 文档级给出 ai / human / mixed 三类概率（0-1）、置信度类别，
//! 句子级给出是否高亮为疑似 AI。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn, Instrument, Span};

use super::endpoint::{DetectorEndpoint, DetectorSettings};
use super::governor::Sleeper;
use super::transport::HttpTransport;
use super::{or_default, Detector};
use crate::error::DetectorError;
use crate::models::{keys, DetectorKind, FieldValue, NormalizedDetectorResult};

const KIND: DetectorKind = DetectorKind::GptZero;

// ========== 原始响应 ==========
// 每个字段缺失或为 null 时取默认值（0 / "" / 空列表 / false）

#[derive(Debug, Default, Deserialize)]
struct GptZeroResponse {
    #[serde(default, deserialize_with = "or_default")]
    version: String,
    #[serde(default, rename = "scanId", deserialize_with = "or_default")]
    scan_id: String,
    #[serde(default, deserialize_with = "or_default")]
    documents: Vec<GptZeroDocument>,
}

#[derive(Debug, Default, Deserialize)]
struct GptZeroDocument {
    #[serde(default, deserialize_with = "or_default")]
    average_generated_prob: f64,
    #[serde(default, deserialize_with = "or_default")]
    class_probabilities: ClassProbabilities,
    #[serde(default, deserialize_with = "or_default")]
    confidence_category: String,
    #[serde(default, deserialize_with = "or_default")]
    confidence_score: f64,
    #[serde(default, deserialize_with = "or_default")]
    predicted_class: String,
    #[serde(default, deserialize_with = "or_default")]
    document_classification: String,
    #[serde(default, deserialize_with = "or_default")]
    result_message: String,
    #[serde(default, deserialize_with = "or_default")]
    sentences: Vec<GptZeroSentence>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassProbabilities {
    #[serde(default, deserialize_with = "or_default")]
    ai: f64,
    #[serde(default, deserialize_with = "or_default")]
    human: f64,
    #[serde(default, deserialize_with = "or_default")]
    mixed: f64,
}

#[derive(Debug, Default, Deserialize)]
struct GptZeroSentence {
    #[serde(default, deserialize_with = "or_default")]
    sentence: String,
    #[serde(default, deserialize_with = "or_default")]
    highlight_sentence_for_ai: bool,
}

fn parse_response(body: &str) -> Result<GptZeroResponse, DetectorError> {
    if body.trim().is_empty() {
        return Err(DetectorError::malformed(KIND, "API返回空响应"));
    }
    serde_json::from_str(body).map_err(|e| DetectorError::malformed(KIND, e.to_string()))
}

/// 原始响应 → 归一化结果（只取第一个文档）
fn normalize(response: GptZeroResponse) -> NormalizedDetectorResult {
    let GptZeroResponse {
        version,
        scan_id,
        documents,
    } = response;
    let doc = documents.into_iter().next().unwrap_or_default();

    let mut ai_probability = doc.class_probabilities.ai;
    if !KIND.is_valid_score(ai_probability) {
        warn!("{} 返回的概率越界: {}，已截断到 [0, 1]", KIND, ai_probability);
        ai_probability = ai_probability.clamp(0.0, KIND.scale_max());
    }

    let mut fields = BTreeMap::new();
    fields.insert(keys::VERSION.to_string(), FieldValue::from(version));
    fields.insert(keys::SCAN_ID.to_string(), FieldValue::from(scan_id));
    fields.insert(
        keys::AVERAGE_GENERATED_PROB.to_string(),
        FieldValue::from(doc.average_generated_prob),
    );
    fields.insert(keys::PROB_AI.to_string(), FieldValue::from(doc.class_probabilities.ai));
    fields.insert(
        keys::PROB_HUMAN.to_string(),
        FieldValue::from(doc.class_probabilities.human),
    );
    fields.insert(
        keys::PROB_MIXED.to_string(),
        FieldValue::from(doc.class_probabilities.mixed),
    );
    fields.insert(
        keys::CONFIDENCE_CATEGORY.to_string(),
        FieldValue::from(doc.confidence_category),
    );
    fields.insert(
        keys::CONFIDENCE_SCORE.to_string(),
        FieldValue::from(doc.confidence_score),
    );
    fields.insert(
        keys::PREDICTED_CLASS.to_string(),
        FieldValue::from(doc.predicted_class),
    );
    fields.insert(
        keys::DOCUMENT_CLASSIFICATION.to_string(),
        FieldValue::from(doc.document_classification),
    );

    let highlighted_spans = doc
        .sentences
        .into_iter()
        .filter(|s| s.highlight_sentence_for_ai)
        .map(|s| s.sentence)
        .collect();

    NormalizedDetectorResult {
        ai_probability,
        confidence_fields: fields,
        highlighted_spans,
        raw_message: Some(doc.result_message),
    }
}

/// GPTZero 客户端
pub struct GptZeroClient {
    endpoint: DetectorEndpoint,
    api_key: String,
    span: Span,
}

impl GptZeroClient {
    pub fn new(
        settings: &DetectorSettings,
        transport: Arc<dyn HttpTransport>,
        sleeper: Arc<dyn Sleeper>,
        span: Span,
    ) -> Self {
        Self {
            endpoint: DetectorEndpoint::new(KIND, settings, transport, sleeper),
            api_key: settings.api_key.clone(),
            span,
        }
    }
}

#[async_trait]
impl Detector for GptZeroClient {
    fn kind(&self) -> DetectorKind {
        KIND
    }

    async fn detect(&mut self, text: &str) -> Result<NormalizedDetectorResult, DetectorError> {
        let span = self.span.clone();
        async {
            let headers = [
                ("accept", "application/json".to_string()),
                ("X-Api-Key", self.api_key.clone()),
            ];
            let payload = json!({
                "document": text,
                "multilingual": true
            });

            let reply = self.endpoint.send(&headers, &payload).await?;
            let result = normalize(parse_response(&reply.body)?);
            info!("✓ {} 检测完成，AI 概率: {:.3}", KIND, result.ai_probability);
            Ok(result)
        }
        .instrument(span)
        .await
    }
}
