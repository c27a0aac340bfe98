//! 报告写入服务 - 业务能力层
//!
//! 负责参与者报告和汇总报告的持久化与回读，不关心检测流程

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{AppError, AppResult, ExhaustionError};
use crate::models::{
    CombinedRecord, ConsolidatedTable, DetectorKind, ParticipantReport, ParticipantSummary,
    FLAG_THRESHOLD, THRESHOLDS,
};

const REPORT_PREFIX: &str = "report_";
const CONSOLIDATED_JSON: &str = "consolidated_report.json";
const CONSOLIDATED_TXT: &str = "consolidated_report.txt";
const NO_FLAGGED_SENTENCES: &str = "没有句子被标记为 AI";

/// 参与者报告文件名
pub fn report_file_name(participant_id: &str) -> String {
    format!("{}{}.json", REPORT_PREFIX, participant_id)
}

fn report_text_name(participant_id: &str) -> String {
    format!("{}{}.txt", REPORT_PREFIX, participant_id)
}

/// 把标记句子格式化为编号列表（用于报告展示）
///
/// # 示例
/// ```
/// use ai_detect_batch::services::report_writer::format_flagged_sentences;
///
/// let text = format_flagged_sentences(&["[a] b".to_string(), " c ".to_string()]);
/// assert_eq!(text, "1. (a) b\n2. c");
/// ```
pub fn format_flagged_sentences(spans: &[String]) -> String {
    if spans.is_empty() {
        return NO_FLAGGED_SENTENCES.to_string();
    }
    spans
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s.trim().replace('[', "(").replace(']', ")")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_mean(mean: Option<f64>, decimals: usize) -> String {
    match mean {
        Some(v) => format!("{:.*}", decimals, v),
        None => "n/a".to_string(),
    }
}

fn score_decimals(kind: DetectorKind) -> usize {
    match kind {
        DetectorKind::GptZero => 3,
        DetectorKind::ZeroGpt => 1,
    }
}

/// 把单个参与者的记录渲染成可读文本（分数 + 标记句子）
pub fn render_participant_report(participant_id: &str, records: &[CombinedRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "参与者: {}", participant_id);
    let _ = writeln!(out, "文档数: {}", records.len());

    for record in records {
        let _ = writeln!(out, "\n=== {} ===", record.document_id);
        for kind in DetectorKind::ALL {
            let score = match record.score(kind) {
                Some(v) => format!("{:.*}", score_decimals(kind), v),
                None => "检测失败".to_string(),
            };
            let _ = writeln!(out, "{}: {}", kind, score);
        }
        for kind in DetectorKind::ALL {
            let result = record.result(kind);
            if result.is_failure() {
                continue;
            }
            let _ = writeln!(out, "{} 标记句子:", kind);
            let _ = writeln!(out, "{}", format_flagged_sentences(&result.highlighted_spans));
        }
    }
    out
}

/// 汇总表中"任一检测器达标"的数量和比例
fn combined_cells(summary: &ParticipantSummary, threshold: u8) -> (String, String) {
    if threshold == FLAG_THRESHOLD {
        return (
            summary.combined_flagged_count_at_40.to_string(),
            format!("{:.1}%", summary.percentage_flagged),
        );
    }
    match summary.combined_at(threshold) {
        Some(c) => (c.count.to_string(), format!("{:.1}%", c.percentage)),
        None => ("n/a".to_string(), "n/a".to_string()),
    }
}

/// 把汇总表渲染成纯文本表格
pub fn render_table(table: &ConsolidatedTable) -> String {
    let mut header = vec!["参与者".to_string(), "文档数".to_string()];
    for threshold in THRESHOLDS.iter().rev() {
        for kind in DetectorKind::ALL {
            header.push(format!("{}_{}", kind, threshold));
        }
    }
    for threshold in THRESHOLDS {
        header.push(format!("标记数(>={})", threshold));
        header.push(format!("标记比例(>={})", threshold));
    }
    header.push("GPTZero均值".to_string());
    header.push("ZeroGPT均值".to_string());

    let mut rows = vec![header];
    for summary in table.iter() {
        let mut row = vec![
            summary.participant_id.clone(),
            summary.total_documents.to_string(),
        ];
        for threshold in THRESHOLDS.iter().rev() {
            for kind in DetectorKind::ALL {
                row.push(summary.count_at(kind, *threshold).to_string());
            }
        }
        for threshold in THRESHOLDS {
            let (count, percentage) = combined_cells(summary, threshold);
            row.push(count);
            row.push(percentage);
        }
        row.push(format_mean(summary.mean_detector_a, score_decimals(DetectorKind::GptZero)));
        row.push(format_mean(summary.mean_detector_b, score_decimals(DetectorKind::ZeroGpt)));
        rows.push(row);
    }

    let columns = rows[0].len();
    let widths: Vec<usize> = (0..columns)
        .map(|c| rows.iter().map(|r| r[c].chars().count()).max().unwrap_or(0))
        .collect();

    let mut out = String::new();
    for row in &rows {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ");
        let _ = writeln!(out, "{}", line.trim_end());
    }
    out
}

/// 报告写入服务
pub struct ReportWriter {
    reports_folder: PathBuf,
}

impl ReportWriter {
    pub fn new(reports_folder: impl Into<PathBuf>) -> Self {
        Self {
            reports_folder: reports_folder.into(),
        }
    }

    pub fn reports_folder(&self) -> &Path {
        &self.reports_folder
    }

    async fn ensure_folder(&self) -> AppResult<()> {
        fs::create_dir_all(&self.reports_folder)
            .await
            .map_err(|e| AppError::file_write_failed(self.reports_folder.display().to_string(), e))
    }

    async fn write_json<T: serde::Serialize>(&self, path: &Path, value: &T) -> AppResult<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| AppError::json_failed(path.display().to_string(), e))?;
        fs::write(path, json)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))
    }

    /// 写入单个参与者的全部记录（JSON + 可读文本）
    ///
    /// 文档ID 原样写入，和内存中的记录保持一致。
    ///
    /// # 返回
    /// 返回 JSON 报告文件路径
    pub async fn write_participant_report(
        &self,
        participant_id: &str,
        records: &[CombinedRecord],
    ) -> AppResult<PathBuf> {
        self.ensure_folder().await?;

        let report = ParticipantReport {
            participant_id: participant_id.to_string(),
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            records: records.to_vec(),
        };

        let path = self.reports_folder.join(report_file_name(participant_id));
        self.write_json(&path, &report).await?;

        let txt_path = self.reports_folder.join(report_text_name(participant_id));
        fs::write(&txt_path, render_participant_report(participant_id, records))
            .await
            .map_err(|e| AppError::file_write_failed(txt_path.display().to_string(), e))?;
        info!("📝 参与者报告已生成: {}", path.display());
        Ok(path)
    }

    /// 读取报告目录中的全部参与者报告（按文件名排序）
    ///
    /// 任何一个报告无法解析都会导致整体失败。
    pub async fn load_all_reports(&self) -> AppResult<Vec<ParticipantReport>> {
        let folder_label = self.reports_folder.display().to_string();
        if !self.reports_folder.is_dir() {
            return Err(ExhaustionError::NoReports { path: folder_label }.into());
        }

        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&self.reports_folder)
            .await
            .map_err(|e| AppError::file_read_failed(folder_label.clone(), e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::file_read_failed(folder_label.clone(), e))?
        {
            let path = entry.path();
            let is_report = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(REPORT_PREFIX) && n.ends_with(".json"))
                .unwrap_or(false);
            if is_report {
                paths.push(path);
            }
        }
        paths.sort();

        if paths.is_empty() {
            return Err(ExhaustionError::NoReports { path: folder_label }.into());
        }

        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            debug!("正在读取报告: {}", path.display());
            let content = fs::read_to_string(&path)
                .await
                .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
            let report: ParticipantReport = serde_json::from_str(&content)
                .map_err(|e| AppError::json_failed(path.display().to_string(), e))?;
            reports.push(report);
        }
        info!("✓ 读取到 {} 份参与者报告", reports.len());
        Ok(reports)
    }

    /// 写入汇总报告（JSON + 文本表格）
    pub async fn write_consolidated(&self, table: &ConsolidatedTable) -> AppResult<(PathBuf, PathBuf)> {
        self.ensure_folder().await?;

        let json_path = self.reports_folder.join(CONSOLIDATED_JSON);
        self.write_json(&json_path, table).await?;

        let txt_path = self.reports_folder.join(CONSOLIDATED_TXT);
        fs::write(&txt_path, render_table(table))
            .await
            .map_err(|e| AppError::file_write_failed(txt_path.display().to_string(), e))?;

        info!("📊 汇总报告已生成: {}", json_path.display());
        Ok((json_path, txt_path))
    }
}
