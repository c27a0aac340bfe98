//! 批量文档分析器 - 编排层
//!
//! ## 职责
//!
//! 处理单个参与者的全部文档：按固定大小分批，每个文档依次调用两个检测器，
//! 把结果合并为 [`CombinedRecord`]。
//!
//! ## 核心规则
//!
//! 1. **顺序执行**：先检测器 A 再检测器 B，所有调用严格串行
//! 2. **失败降级**：单个检测器失败时记录日志，并用失败占位结果代替，文档不丢弃
//! 3. **节奏控制**：每个文档后等待 `document_delay`，批次之间等待 `batch_delay`（最后一批之后不等）
//! 4. **不做重试**：限流重试只发生在客户端内部；限流重试耗尽是唯一会中止运行的错误

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::clients::{Detector, Sleeper};
use crate::config::Config;
use crate::error::DetectorError;
use crate::models::{CombinedRecord, DetectionRequest, NormalizedDetectorResult};
use crate::utils::logging::{log_batch_complete, log_batch_start};

/// 批处理节奏
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    pub batch_size: usize,
    pub document_delay: Duration,
    pub batch_delay: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 40,
            document_delay: Duration::from_secs(1),
            batch_delay: Duration::from_secs(5),
        }
    }
}

impl From<&Config> for BatchSettings {
    fn from(config: &Config) -> Self {
        Self {
            batch_size: config.batch_size,
            document_delay: config.document_delay(),
            batch_delay: config.batch_delay(),
        }
    }
}

/// 把 `len` 个元素切成连续的批次，最后一批可以不满
pub fn partition(len: usize, batch_size: usize) -> Vec<Range<usize>> {
    let batch_size = batch_size.max(1);
    (0..len)
        .step_by(batch_size)
        .map(|start| start..(start + batch_size).min(len))
        .collect()
}

/// 累计统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisStats {
    pub documents: usize,
    pub batches: usize,
    pub failures_a: usize,
    pub failures_b: usize,
}

/// 批量分析器
pub struct BatchAnalyzer<A, B> {
    detector_a: A,
    detector_b: B,
    sleeper: Arc<dyn Sleeper>,
    settings: BatchSettings,
    stats: AnalysisStats,
}

impl<A: Detector, B: Detector> BatchAnalyzer<A, B> {
    pub fn new(detector_a: A, detector_b: B, sleeper: Arc<dyn Sleeper>, settings: BatchSettings) -> Self {
        Self {
            detector_a,
            detector_b,
            sleeper,
            settings,
            stats: AnalysisStats::default(),
        }
    }

    /// 到目前为止（可跨多个参与者）的统计
    pub fn stats(&self) -> AnalysisStats {
        self.stats
    }

    /// 分析一组文档
    ///
    /// # 返回
    /// 与输入同长度、同顺序的合并记录；只有致命错误才会返回 `Err`
    pub async fn analyze(&mut self, documents: &[DetectionRequest]) -> Result<Vec<CombinedRecord>, DetectorError> {
        let total = documents.len();
        let batches = partition(total, self.settings.batch_size);
        let total_batches = batches.len();
        let mut records = Vec::with_capacity(total);

        for (batch_idx, range) in batches.into_iter().enumerate() {
            let batch_num = batch_idx + 1;
            log_batch_start(batch_num, total_batches, range.start + 1, range.end, total);

            let failures_before = self.stats.failures_a + self.stats.failures_b;
            let batch_len = range.len();
            for request in &documents[range] {
                info!("🔍 正在分析文档: {}", request.document_id);
                records.push(self.analyze_document(request).await?);
                self.stats.documents += 1;
                self.sleeper.sleep(self.settings.document_delay).await;
            }
            self.stats.batches += 1;

            let failures = self.stats.failures_a + self.stats.failures_b - failures_before;
            log_batch_complete(batch_num, batch_len, failures);

            if batch_num < total_batches {
                info!(
                    "⏳ 等待 {} 秒后开始下一批...",
                    self.settings.batch_delay.as_secs_f64()
                );
                self.sleeper.sleep(self.settings.batch_delay).await;
            }
        }

        Ok(records)
    }

    async fn analyze_document(&mut self, request: &DetectionRequest) -> Result<CombinedRecord, DetectorError> {
        let detector_a = match guarded(&mut self.detector_a, request).await? {
            Some(result) => result,
            None => {
                self.stats.failures_a += 1;
                NormalizedDetectorResult::failed(self.detector_a.kind())
            }
        };
        let detector_b = match guarded(&mut self.detector_b, request).await? {
            Some(result) => result,
            None => {
                self.stats.failures_b += 1;
                NormalizedDetectorResult::failed(self.detector_b.kind())
            }
        };

        Ok(CombinedRecord {
            document_id: request.document_id.clone(),
            source_text: request.text.clone(),
            detector_a,
            detector_b,
        })
    }
}

/// 调用单个检测器：非致命错误记日志后返回 `None`
async fn guarded<D: Detector>(
    detector: &mut D,
    request: &DetectionRequest,
) -> Result<Option<NormalizedDetectorResult>, DetectorError> {
    match detector.detect(&request.text).await {
        Ok(result) => Ok(Some(result)),
        Err(e) if e.is_fatal() => {
            error!("❌ {} 分析 {} 时限流重试耗尽，中止运行", detector.kind(), request.document_id);
            Err(e)
        }
        Err(e) => {
            error!("❌ {} 分析 {} 失败: {}", detector.kind(), request.document_id, e);
            Ok(None)
        }
    }
}
