//! 检测结果模型
//!
//! 两个检测器的原始响应各不相同，进入编排层之前都会被映射成
//! [`NormalizedDetectorResult`]，再按文档合并为 [`CombinedRecord`]。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 调用失败时写入的分数标记
pub const FAILURE_SENTINEL: f64 = -1.0;

/// 检测器种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    /// 检测器 A：0-1 概率
    GptZero,
    /// 检测器 B：0-100 百分比
    ZeroGpt,
}

impl DetectorKind {
    pub const ALL: [DetectorKind; 2] = [DetectorKind::GptZero, DetectorKind::ZeroGpt];

    /// 获取显示名称
    pub fn name(self) -> &'static str {
        match self {
            DetectorKind::GptZero => "GPTZero",
            DetectorKind::ZeroGpt => "ZeroGPT",
        }
    }

    /// 分数取值上限（A 为 1，B 为 100）
    pub fn scale_max(self) -> f64 {
        match self {
            DetectorKind::GptZero => 1.0,
            DetectorKind::ZeroGpt => 100.0,
        }
    }

    /// 把百分比阈值换算成该检测器原生刻度上的分界值
    ///
    /// A 使用 `t / 100`，B 直接使用 `t`。
    pub fn cutoff(self, percent: u8) -> f64 {
        match self {
            DetectorKind::GptZero => f64::from(percent) / 100.0,
            DetectorKind::ZeroGpt => f64::from(percent),
        }
    }

    pub fn is_valid_score(self, value: f64) -> bool {
        (0.0..=self.scale_max()).contains(&value)
    }

    /// 该检测器归一化结果中的字段表
    pub fn field_table(self) -> &'static [FieldSpec] {
        match self {
            DetectorKind::GptZero => GPTZERO_FIELDS,
            DetectorKind::ZeroGpt => ZEROGPT_FIELDS,
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 字段类型，决定缺省值和失败标记
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Number,
    Text,
    Flag,
}

/// 归一化结果中的一个字段
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub key: &'static str,
    pub ty: FieldType,
}

impl FieldSpec {
    const fn new(key: &'static str, ty: FieldType) -> Self {
        Self { key, ty }
    }

    /// 失败占位：数值为 -1，其余为空
    fn failure_value(&self) -> FieldValue {
        match self.ty {
            FieldType::Number => FieldValue::Number(FAILURE_SENTINEL),
            FieldType::Text | FieldType::Flag => FieldValue::Null,
        }
    }
}

pub mod keys {
    pub const VERSION: &str = "version";
    pub const SCAN_ID: &str = "scan_id";
    pub const AVERAGE_GENERATED_PROB: &str = "average_generated_prob";
    pub const PROB_AI: &str = "prob_ai";
    pub const PROB_HUMAN: &str = "prob_human";
    pub const PROB_MIXED: &str = "prob_mixed";
    pub const CONFIDENCE_CATEGORY: &str = "confidence_category";
    pub const CONFIDENCE_SCORE: &str = "confidence_score";
    pub const PREDICTED_CLASS: &str = "predicted_class";
    pub const DOCUMENT_CLASSIFICATION: &str = "document_classification";

    pub const SUCCESS: &str = "success";
    pub const TEXT_WORDS: &str = "text_words";
    pub const AI_WORDS: &str = "ai_words";
    pub const SENTENCE_COUNT: &str = "sentence_count";
    pub const FEEDBACK: &str = "feedback";
}

static GPTZERO_FIELDS: &[FieldSpec] = &[
    FieldSpec::new(keys::VERSION, FieldType::Text),
    FieldSpec::new(keys::SCAN_ID, FieldType::Text),
    FieldSpec::new(keys::AVERAGE_GENERATED_PROB, FieldType::Number),
    FieldSpec::new(keys::PROB_AI, FieldType::Number),
    FieldSpec::new(keys::PROB_HUMAN, FieldType::Number),
    FieldSpec::new(keys::PROB_MIXED, FieldType::Number),
    FieldSpec::new(keys::CONFIDENCE_CATEGORY, FieldType::Text),
    FieldSpec::new(keys::CONFIDENCE_SCORE, FieldType::Number),
    FieldSpec::new(keys::PREDICTED_CLASS, FieldType::Text),
    FieldSpec::new(keys::DOCUMENT_CLASSIFICATION, FieldType::Text),
];

static ZEROGPT_FIELDS: &[FieldSpec] = &[
    FieldSpec::new(keys::SUCCESS, FieldType::Flag),
    FieldSpec::new(keys::TEXT_WORDS, FieldType::Number),
    FieldSpec::new(keys::AI_WORDS, FieldType::Number),
    FieldSpec::new(keys::SENTENCE_COUNT, FieldType::Number),
    FieldSpec::new(keys::FEEDBACK, FieldType::Text),
];

/// 附加字段的取值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Flag(bool),
    Text(String),
    Null,
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Flag(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

/// 单个检测器对单个文档的归一化结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDetectorResult {
    /// 原生刻度上的 AI 分数，失败时为 -1
    pub ai_probability: f64,
    pub confidence_fields: BTreeMap<String, FieldValue>,
    /// 被检测器标记为疑似 AI 的句子（保持原始顺序）
    pub highlighted_spans: Vec<String>,
    pub raw_message: Option<String>,
}

impl NormalizedDetectorResult {
    /// 检测失败时的固定占位结果
    pub fn failed(kind: DetectorKind) -> Self {
        let confidence_fields = kind
            .field_table()
            .iter()
            .map(|spec| (spec.key.to_string(), spec.failure_value()))
            .collect();
        Self {
            ai_probability: FAILURE_SENTINEL,
            confidence_fields,
            highlighted_spans: Vec::new(),
            raw_message: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.ai_probability == FAILURE_SENTINEL
    }

    /// 有效分数；失败占位返回 `None`
    pub fn score(&self) -> Option<f64> {
        (!self.is_failure()).then_some(self.ai_probability)
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.confidence_fields.get(key)
    }
}

/// 单个文档两个检测器的合并记录，是参与者报告的持久化单元
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedRecord {
    pub document_id: String,
    pub source_text: String,
    pub detector_a: NormalizedDetectorResult,
    pub detector_b: NormalizedDetectorResult,
}

impl CombinedRecord {
    pub fn result(&self, kind: DetectorKind) -> &NormalizedDetectorResult {
        match kind {
            DetectorKind::GptZero => &self.detector_a,
            DetectorKind::ZeroGpt => &self.detector_b,
        }
    }

    pub fn score(&self, kind: DetectorKind) -> Option<f64> {
        self.result(kind).score()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoff_uses_native_scale() {
        assert_eq!(DetectorKind::GptZero.cutoff(40), 0.4);
        assert_eq!(DetectorKind::ZeroGpt.cutoff(40), 40.0);
        assert_eq!(DetectorKind::GptZero.cutoff(80), 0.8);
    }

    #[test]
    fn failed_result_marks_every_field() {
        let failed = NormalizedDetectorResult::failed(DetectorKind::GptZero);
        assert!(failed.is_failure());
        assert_eq!(failed.score(), None);
        assert_eq!(
            failed.field(keys::CONFIDENCE_SCORE),
            Some(&FieldValue::Number(FAILURE_SENTINEL))
        );
        assert_eq!(failed.field(keys::PREDICTED_CLASS), Some(&FieldValue::Null));
        assert_eq!(
            failed.confidence_fields.len(),
            DetectorKind::GptZero.field_table().len()
        );
    }

    #[test]
    fn field_values_keep_their_shape_through_json() {
        let json = r#"{"a": 1.5, "b": true, "c": "high", "d": null}"#;
        let map: BTreeMap<String, FieldValue> = serde_json::from_str(json).unwrap();
        assert_eq!(map["a"], FieldValue::Number(1.5));
        assert_eq!(map["b"], FieldValue::Flag(true));
        assert_eq!(map["c"], FieldValue::Text("high".to_string()));
        assert_eq!(map["d"], FieldValue::Null);
    }

    #[test]
    fn score_validity_per_detector() {
        assert!(DetectorKind::GptZero.is_valid_score(1.0));
        assert!(!DetectorKind::GptZero.is_valid_score(40.0));
        assert!(DetectorKind::ZeroGpt.is_valid_score(40.0));
        assert!(!DetectorKind::ZeroGpt.is_valid_score(-1.0));
    }
}
