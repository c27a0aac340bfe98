use ai_detect_batch::clients::{Detector, Sleeper};
use ai_detect_batch::config::Config;
use ai_detect_batch::models::{DetectorKind, NormalizedDetectorResult};
use ai_detect_batch::orchestrator::{aggregate, App, BatchAnalyzer, BatchSettings, RunMode};
use ai_detect_batch::services::ReportWriter;
use ai_detect_batch::DetectorError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// 不真正等待的 sleeper
struct NoSleep;

#[async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, _duration: Duration) {}
}

/// 按文本长度给分的检测器；包含 "boom" 的文本返回失败
struct LengthDetector {
    kind: DetectorKind,
}

#[async_trait]
impl Detector for LengthDetector {
    fn kind(&self) -> DetectorKind {
        self.kind
    }

    async fn detect(&mut self, text: &str) -> Result<NormalizedDetectorResult, DetectorError> {
        if text.contains("boom") {
            return Err(DetectorError::transport(self.kind, "connection reset"));
        }
        let tenths = (text.len() % 10) as f64;
        let score = match self.kind {
            DetectorKind::GptZero => tenths / 10.0,
            DetectorKind::ZeroGpt => tenths * 10.0,
        };
        Ok(NormalizedDetectorResult {
            ai_probability: score,
            confidence_fields: BTreeMap::new(),
            highlighted_spans: vec![text.to_string()],
            raw_message: None,
        })
    }
}

fn write_documents(base: &Path) {
    let docs = [
        ("ana", "livro1.txt", "abcdefgh"),
        ("ana", "livro2.txt", "abc"),
        ("ana", "Livro 3.txt", "abcdefghi"),
        // 去掉方括号后与 "Livro 3" 同名，只保留一个
        ("ana", "[Livro] 3.txt", "ignored"),
        ("bruno", "a.txt", "ab"),
        ("bruno", "b.txt", "boom here"),
        ("carla", "x.txt", "abcdefg"),
    ];
    for (participant, file, text) in docs {
        let dir = base.join(participant);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(file), text).unwrap();
    }
}

fn analyzer() -> BatchAnalyzer<LengthDetector, LengthDetector> {
    BatchAnalyzer::new(
        LengthDetector { kind: DetectorKind::GptZero },
        LengthDetector { kind: DetectorKind::ZeroGpt },
        Arc::new(NoSleep),
        BatchSettings {
            batch_size: 2,
            document_delay: Duration::ZERO,
            batch_delay: Duration::ZERO,
        },
    )
}

fn config_for(base: &Path) -> Config {
    Config {
        input_folder: base.display().to_string(),
        reports_folder: base.join("reports").display().to_string(),
        gptzero_api_key: "test".to_string(),
        zerogpt_api_key: "test".to_string(),
        ..Config::default()
    }
}

#[tokio::test]
async fn full_run_persists_reports_and_ranks_participants() {
    let dir = tempfile::tempdir().unwrap();
    write_documents(dir.path());

    let app = App::initialize(config_for(dir.path()), RunMode::Full).unwrap();
    let outcome = app.run_with(&mut analyzer()).await.unwrap();

    assert_eq!(outcome.participants, 3);
    assert_eq!(outcome.stats.documents, 6);
    assert_eq!(outcome.stats.failures_a, 1);
    assert_eq!(outcome.stats.failures_b, 1);

    let reports_dir = dir.path().join("reports");
    for name in [
        "report_ana.json",
        "report_ana.txt",
        "report_bruno.json",
        "report_carla.json",
        "consolidated_report.json",
        "consolidated_report.txt",
    ] {
        assert!(reports_dir.join(name).is_file(), "missing {}", name);
    }

    // ana: 0.8 / 0.3 / 0.9 → 2 of 3; bruno: 0.2 + failure → 0 of 2; carla: 0.7 → 1 of 1
    let order: Vec<_> = outcome.table.iter().map(|s| s.participant_id.as_str()).collect();
    assert_eq!(order, vec!["carla", "ana", "bruno"]);

    let bruno = outcome.table.iter().find(|s| s.participant_id == "bruno").unwrap();
    assert_eq!(bruno.total_documents, 2);
    assert_eq!(bruno.percentage_flagged, 0.0);
}

#[tokio::test]
async fn persisted_reports_aggregate_like_in_memory_records() {
    let dir = tempfile::tempdir().unwrap();
    write_documents(dir.path());

    let app = App::initialize(config_for(dir.path()), RunMode::Full).unwrap();
    let outcome = app.run_with(&mut analyzer()).await.unwrap();

    let reloaded = ReportWriter::new(dir.path().join("reports"))
        .load_all_reports()
        .await
        .unwrap();
    assert_eq!(aggregate(&reloaded).unwrap(), outcome.table);

    let ana = reloaded.iter().find(|r| r.participant_id == "ana").unwrap();
    let ids: Vec<_> = ana.records.iter().map(|r| r.document_id.as_str()).collect();
    assert_eq!(ids, vec!["Livro 3", "livro1", "livro2"]);

    // 仅汇总模式从同一批报告得到相同结果
    let consolidate = App::initialize(config_for(dir.path()), RunMode::ConsolidateOnly).unwrap();
    let again = consolidate.run().await.unwrap();
    assert_eq!(again.table, outcome.table);
    assert_eq!(again.stats.documents, 0);
}

#[tokio::test]
async fn participant_filter_limits_the_run() {
    let dir = tempfile::tempdir().unwrap();
    write_documents(dir.path());

    let config = Config {
        participant_filter: Some("carla".to_string()),
        ..config_for(dir.path())
    };
    let app = App::initialize(config, RunMode::Full).unwrap();
    let outcome = app.run_with(&mut analyzer()).await.unwrap();

    assert_eq!(outcome.participants, 1);
    assert_eq!(outcome.table.len(), 1);
    assert!(!dir.path().join("reports/report_ana.json").exists());
}

#[tokio::test]
#[ignore] // 默认忽略，需要真实密钥：cargo test -- --ignored
async fn test_live_detectors() {
    let config = Config::load().expect("加载配置失败");
    let app = App::initialize(config, RunMode::Full).expect("初始化失败");

    let outcome = app.run().await.expect("运行失败");
    assert!(outcome.participants > 0, "应该至少处理一个参与者");
}
