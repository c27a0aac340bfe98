//! 汇总器
//!
//! 从持久化的参与者记录重新计算统计，不缓存任何中间结果。
//! 分数保持各检测器的原生刻度，阈值通过 [`DetectorKind::cutoff`] 换算。

use std::collections::HashSet;
use tracing::debug;

use crate::error::AggregateError;
use crate::models::{
    CombinedFlagged, CombinedRecord, ConsolidatedTable, DetectorKind, ParticipantReport,
    ParticipantSummary, ThresholdCount, FLAG_THRESHOLD, THRESHOLDS,
};

/// 校验记录：文档ID不重复，分数在取值范围内（失败标记除外）
fn validate(participant_id: &str, records: &[CombinedRecord]) -> Result<(), AggregateError> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.document_id.as_str()) {
            return Err(AggregateError::DuplicateDocument {
                participant: participant_id.to_string(),
                document_id: record.document_id.clone(),
            });
        }
        for kind in DetectorKind::ALL {
            if let Some(value) = record.score(kind) {
                if !kind.is_valid_score(value) {
                    return Err(AggregateError::ScoreOutOfRange {
                        participant: participant_id.to_string(),
                        document_id: record.document_id.clone(),
                        detector: kind,
                        value,
                    });
                }
            }
        }
    }
    Ok(())
}

fn count_at_least(records: &[CombinedRecord], kind: DetectorKind, threshold: u8) -> usize {
    let cutoff = kind.cutoff(threshold);
    records
        .iter()
        .filter_map(|r| r.score(kind))
        .filter(|score| *score >= cutoff)
        .count()
}

fn mean(records: &[CombinedRecord], kind: DetectorKind) -> Option<f64> {
    let scores: Vec<f64> = records.iter().filter_map(|r| r.score(kind)).collect();
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
}

/// 任一检测器达到阈值即算被标记
fn is_flagged(record: &CombinedRecord, threshold: u8) -> bool {
    DetectorKind::ALL.iter().any(|kind| {
        record
            .score(*kind)
            .map(|score| score >= kind.cutoff(threshold))
            .unwrap_or(false)
    })
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

/// 计算单个参与者的汇总
pub fn summarize(participant_id: &str, records: &[CombinedRecord]) -> Result<ParticipantSummary, AggregateError> {
    validate(participant_id, records)?;

    let total_documents = records.len();
    let counts_by_threshold = THRESHOLDS
        .iter()
        .flat_map(|threshold| {
            DetectorKind::ALL.into_iter().map(move |detector| ThresholdCount {
                detector,
                threshold: *threshold,
                count: count_at_least(records, detector, *threshold),
            })
        })
        .collect();

    let combined_flagged_by_threshold: Vec<CombinedFlagged> = THRESHOLDS
        .iter()
        .map(|threshold| {
            let count = records.iter().filter(|r| is_flagged(r, *threshold)).count();
            CombinedFlagged {
                threshold: *threshold,
                count,
                percentage: percentage(count, total_documents),
            }
        })
        .collect();

    let flagged = records.iter().filter(|r| is_flagged(r, FLAG_THRESHOLD)).count();
    let percentage_flagged = percentage(flagged, total_documents);

    debug!(
        "参与者 {}: {} 个文档，{} 个被标记 ({:.1}%)",
        participant_id, total_documents, flagged, percentage_flagged
    );

    Ok(ParticipantSummary {
        participant_id: participant_id.to_string(),
        total_documents,
        counts_by_threshold,
        combined_flagged_count_at_40: flagged,
        percentage_flagged,
        combined_flagged_by_threshold,
        mean_detector_a: mean(records, DetectorKind::GptZero),
        mean_detector_b: mean(records, DetectorKind::ZeroGpt),
    })
}

/// 汇总全部参与者，按标记比例降序排列
pub fn aggregate(reports: &[ParticipantReport]) -> Result<ConsolidatedTable, AggregateError> {
    if reports.is_empty() {
        return Err(AggregateError::NoParticipants);
    }
    let rows = reports
        .iter()
        .map(|report| summarize(&report.participant_id, &report.records))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ConsolidatedTable::ranked(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NormalizedDetectorResult;
    use std::collections::BTreeMap;

    fn result(score: f64) -> NormalizedDetectorResult {
        NormalizedDetectorResult {
            ai_probability: score,
            confidence_fields: BTreeMap::new(),
            highlighted_spans: Vec::new(),
            raw_message: None,
        }
    }

    fn records(scores: &[(f64, f64)]) -> Vec<CombinedRecord> {
        scores
            .iter()
            .enumerate()
            .map(|(i, (a, b))| CombinedRecord {
                document_id: format!("doc{}", i),
                source_text: String::new(),
                detector_a: result(*a),
                detector_b: result(*b),
            })
            .collect()
    }

    fn report(participant: &str, scores: &[(f64, f64)]) -> ParticipantReport {
        ParticipantReport {
            participant_id: participant.to_string(),
            generated_at: String::new(),
            records: records(scores),
        }
    }

    #[test]
    fn flagged_when_either_detector_reaches_40() {
        let summary = summarize("p", &records(&[(0.5, 10.0), (0.1, 50.0), (0.3, 30.0)])).unwrap();

        assert_eq!(summary.total_documents, 3);
        assert_eq!(summary.combined_flagged_count_at_40, 2);
        assert_eq!(format!("{:.1}", summary.percentage_flagged), "66.7");
    }

    #[test]
    fn empty_participant_has_zero_percentage() {
        let summary = summarize("p", &[]).unwrap();
        assert_eq!(summary.total_documents, 0);
        assert_eq!(summary.percentage_flagged, 0.0);
        assert_eq!(summary.mean_detector_a, None);
        assert_eq!(summary.mean_detector_b, None);
    }

    #[test]
    fn threshold_counts_use_native_scales() {
        let summary = summarize(
            "p",
            &records(&[(0.85, 85.0), (0.65, 40.0), (0.40, 79.9), (0.39, 10.0)]),
        )
        .unwrap();

        assert_eq!(summary.count_at(DetectorKind::GptZero, 40), 3);
        assert_eq!(summary.count_at(DetectorKind::GptZero, 60), 2);
        assert_eq!(summary.count_at(DetectorKind::GptZero, 80), 1);
        assert_eq!(summary.count_at(DetectorKind::ZeroGpt, 40), 3);
        assert_eq!(summary.count_at(DetectorKind::ZeroGpt, 60), 2);
        assert_eq!(summary.count_at(DetectorKind::ZeroGpt, 80), 1);
        assert_eq!(summary.counts_by_threshold.len(), 6);
    }

    #[test]
    fn combined_counts_per_threshold() {
        // A 或 B 任一达标：60 只有前两个，80 只有第一个（B 的 85）
        let summary = summarize(
            "p",
            &records(&[(0.10, 85.0), (0.65, 10.0), (0.45, 20.0), (0.10, 10.0)]),
        )
        .unwrap();

        let at = |t| summary.combined_at(t).unwrap();
        assert_eq!(at(40).count, 3);
        assert_eq!(at(60).count, 2);
        assert_eq!(at(80).count, 1);
        assert_eq!(at(60).percentage, 50.0);
        assert_eq!(at(80).percentage, 25.0);
        assert_eq!(at(40).count, summary.combined_flagged_count_at_40);
        assert_eq!(at(40).percentage, summary.percentage_flagged);
    }

    #[test]
    fn means_skip_failed_results() {
        let summary = summarize("p", &records(&[(0.2, -1.0), (-1.0, -1.0), (0.4, -1.0)])).unwrap();

        let mean_a = summary.mean_detector_a.unwrap();
        assert!((mean_a - 0.3).abs() < 1e-9);
        assert_eq!(summary.mean_detector_b, None);
        // 失败记录仍计入总数
        assert_eq!(summary.total_documents, 3);
    }

    #[test]
    fn failed_results_never_flag() {
        let summary = summarize("p", &records(&[(-1.0, -1.0)])).unwrap();
        assert_eq!(summary.combined_flagged_count_at_40, 0);
        assert_eq!(summary.combined_at(60).unwrap().count, 0);
        assert_eq!(summary.count_at(DetectorKind::ZeroGpt, 40), 0);
    }

    #[test]
    fn equal_percentages_keep_input_order() {
        // 30%、30%、10%
        let thirty: Vec<_> = (0..10).map(|i| if i < 3 { (0.9, 0.0) } else { (0.0, 0.0) }).collect();
        let ten: Vec<_> = (0..10).map(|i| if i < 1 { (0.9, 0.0) } else { (0.0, 0.0) }).collect();
        let reports = vec![
            report("ten", &ten),
            report("first", &thirty),
            report("second", &thirty),
        ];

        let table = aggregate(&reports).unwrap();
        let order: Vec<_> = table.iter().map(|s| s.participant_id.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "ten"]);
    }

    #[test]
    fn duplicate_document_is_rejected() {
        let mut recs = records(&[(0.1, 1.0), (0.2, 2.0)]);
        recs[1].document_id = recs[0].document_id.clone();

        let err = summarize("ana", &recs).unwrap_err();
        assert_eq!(
            err,
            AggregateError::DuplicateDocument {
                participant: "ana".to_string(),
                document_id: "doc0".to_string(),
            }
        );
    }

    #[test]
    fn out_of_range_score_is_rejected() {
        let err = summarize("ana", &records(&[(45.0, 45.0)])).unwrap_err();
        assert!(matches!(
            err,
            AggregateError::ScoreOutOfRange { detector: DetectorKind::GptZero, .. }
        ));
    }

    #[test]
    fn no_participants_is_an_error() {
        assert_eq!(aggregate(&[]).unwrap_err(), AggregateError::NoParticipants);
    }
}
