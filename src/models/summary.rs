use serde::{Deserialize, Serialize};

use super::detection::{CombinedRecord, DetectorKind};

/// 统计用的判定阈值（百分比）
pub const THRESHOLDS: [u8; 3] = [40, 60, 80];

/// "被标记"判定线：任一检测器达到即算
pub const FLAG_THRESHOLD: u8 = 40;

/// 持久化的参与者报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantReport {
    pub participant_id: String,
    /// 生成时间（本地时间字符串）
    #[serde(default)]
    pub generated_at: String,
    pub records: Vec<CombinedRecord>,
}

/// 某检测器在某阈值下达标的文档数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdCount {
    pub detector: DetectorKind,
    pub threshold: u8,
    pub count: usize,
}

/// 任一检测器达到某阈值的文档数及比例
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombinedFlagged {
    pub threshold: u8,
    pub count: usize,
    pub percentage: f64,
}

/// 参与者汇总（每次运行从记录重新计算）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub participant_id: String,
    pub total_documents: usize,
    pub counts_by_threshold: Vec<ThresholdCount>,
    pub combined_flagged_count_at_40: usize,
    pub percentage_flagged: f64,
    /// 每个阈值下"任一检测器达标"的文档数和比例
    #[serde(default)]
    pub combined_flagged_by_threshold: Vec<CombinedFlagged>,
    /// 没有任何有效分数时为 `None`
    pub mean_detector_a: Option<f64>,
    pub mean_detector_b: Option<f64>,
}

impl ParticipantSummary {
    pub fn count_at(&self, detector: DetectorKind, threshold: u8) -> usize {
        self.counts_by_threshold
            .iter()
            .find(|c| c.detector == detector && c.threshold == threshold)
            .map(|c| c.count)
            .unwrap_or(0)
    }

    pub fn combined_at(&self, threshold: u8) -> Option<CombinedFlagged> {
        self.combined_flagged_by_threshold
            .iter()
            .find(|c| c.threshold == threshold)
            .copied()
    }

    pub fn mean(&self, detector: DetectorKind) -> Option<f64> {
        match detector {
            DetectorKind::GptZero => self.mean_detector_a,
            DetectorKind::ZeroGpt => self.mean_detector_b,
        }
    }
}

/// 按标记比例降序排列的汇总表
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsolidatedTable {
    rows: Vec<ParticipantSummary>,
}

impl ConsolidatedTable {
    /// 按 `percentage_flagged` 降序稳定排序，比例相同保持原顺序
    pub fn ranked(mut rows: Vec<ParticipantSummary>) -> Self {
        rows.sort_by(|a, b| b.percentage_flagged.total_cmp(&a.percentage_flagged));
        Self { rows }
    }

    pub fn rows(&self) -> &[ParticipantSummary] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParticipantSummary> {
        self.rows.iter()
    }
}
