//! 检测器 B（ZeroGPT）
//!
//! 给出 0-100 的 AI 百分比、AI 词数和疑似 AI 的句子列表。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn, Instrument, Span};

use super::endpoint::{DetectorEndpoint, DetectorSettings};
use super::governor::Sleeper;
use super::transport::HttpTransport;
use super::{or_default, Detector};
use crate::error::DetectorError;
use crate::models::{keys, DetectorKind, FieldValue, NormalizedDetectorResult};

const KIND: DetectorKind = DetectorKind::ZeroGpt;

/// 服务端 success=false 且没有 message 时使用
const DEFAULT_FAILURE_MESSAGE: &str = "分析失败";

#[derive(Debug, Default, Deserialize)]
struct ZeroGptResponse {
    #[serde(default, deserialize_with = "or_default")]
    success: bool,
    #[serde(default, deserialize_with = "or_default")]
    message: String,
    #[serde(default, deserialize_with = "or_default")]
    data: ZeroGptData,
}

#[derive(Debug, Default, Deserialize)]
struct ZeroGptData {
    #[serde(default, rename = "textWords", deserialize_with = "or_default")]
    text_words: f64,
    #[serde(default, rename = "aiWords", deserialize_with = "or_default")]
    ai_words: f64,
    #[serde(default, rename = "fakePercentage", deserialize_with = "or_default")]
    fake_percentage: f64,
    #[serde(default, deserialize_with = "or_default")]
    sentences: Vec<Value>,
    /// 疑似 AI 的句子
    #[serde(default, deserialize_with = "or_default")]
    h: Vec<Value>,
    #[serde(default, deserialize_with = "or_default")]
    feedback: String,
}

fn parse_response(body: &str) -> Result<ZeroGptResponse, DetectorError> {
    if body.trim().is_empty() {
        return Err(DetectorError::malformed(KIND, "API返回空响应"));
    }
    serde_json::from_str(body).map_err(|e| DetectorError::malformed(KIND, e.to_string()))
}

fn span_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// 原始响应 → 归一化结果
///
/// success=false 表示服务端拒绝分析：分数记 0，保留服务端消息。
fn normalize(response: ZeroGptResponse) -> NormalizedDetectorResult {
    let ZeroGptResponse {
        success,
        message,
        data,
    } = response;

    if !success {
        warn!("{} API返回错误: {}", KIND, message);
        let mut fields = BTreeMap::new();
        fields.insert(keys::SUCCESS.to_string(), FieldValue::Flag(false));
        fields.insert(keys::TEXT_WORDS.to_string(), FieldValue::Number(0.0));
        fields.insert(keys::AI_WORDS.to_string(), FieldValue::Number(0.0));
        fields.insert(keys::SENTENCE_COUNT.to_string(), FieldValue::Number(0.0));
        fields.insert(keys::FEEDBACK.to_string(), FieldValue::Text(String::new()));
        let raw_message = if message.is_empty() {
            DEFAULT_FAILURE_MESSAGE.to_string()
        } else {
            message
        };
        return NormalizedDetectorResult {
            ai_probability: 0.0,
            confidence_fields: fields,
            highlighted_spans: Vec::new(),
            raw_message: Some(raw_message),
        };
    }

    let mut ai_probability = data.fake_percentage;
    if !KIND.is_valid_score(ai_probability) {
        warn!("{} 返回的百分比越界: {}，已截断到 [0, 100]", KIND, ai_probability);
        ai_probability = ai_probability.clamp(0.0, KIND.scale_max());
    }

    let mut fields = BTreeMap::new();
    fields.insert(keys::SUCCESS.to_string(), FieldValue::Flag(true));
    fields.insert(keys::TEXT_WORDS.to_string(), FieldValue::Number(data.text_words));
    fields.insert(keys::AI_WORDS.to_string(), FieldValue::Number(data.ai_words));
    fields.insert(
        keys::SENTENCE_COUNT.to_string(),
        FieldValue::Number(data.sentences.len() as f64),
    );
    fields.insert(keys::FEEDBACK.to_string(), FieldValue::Text(data.feedback));

    NormalizedDetectorResult {
        ai_probability,
        confidence_fields: fields,
        highlighted_spans: data.h.into_iter().map(span_text).collect(),
        raw_message: Some(message),
    }
}

/// ZeroGPT 客户端
pub struct ZeroGptClient {
    endpoint: DetectorEndpoint,
    api_key: String,
    span: Span,
}

impl ZeroGptClient {
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
impl Detector for ZeroGptClient {
    fn kind(&self) -> DetectorKind {
        KIND
    }

    async fn detect(&mut self, text: &str) -> Result<NormalizedDetectorResult, DetectorError> {
        let span = self.span.clone();
        async {
            let headers = [("ApiKey", self.api_key.clone())];
            let payload = json!({
                "text": "",
                "input_text": text
            });

            let reply = self.endpoint.send(&headers, &payload).await?;
            let result = normalize(parse_response(&reply.body)?);
            info!("✓ {} 检测完成，AI 比例: {:.1}%", KIND, result.ai_probability);
            Ok(result)
        }
        .instrument(span)
        .await
    }
}
