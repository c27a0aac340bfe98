use serde::{Deserialize, Serialize};

/// 待检测文档，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRequest {
    pub document_id: String,
    pub text: String,
}

impl DetectionRequest {
    pub fn new(document_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            text: text.into(),
        }
    }
}

/// 单个参与者的全部文档（保持读取顺序）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantDocuments {
    pub participant_id: String,
    pub documents: Vec<DetectionRequest>,
}
