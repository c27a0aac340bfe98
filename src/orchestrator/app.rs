//! 应用主流程 - 编排层
//!
//! ## 职责
//!
//! 1. **读取文档**：通过 `TextLoader` 加载全部（或指定）参与者
//! 2. **逐个参与者分析**：委托 `BatchAnalyzer` 完成分批检测
//! 3. **写入报告**：每个参与者分析完立即落盘
//! 4. **重新汇总**：从磁盘回读全部报告，计算汇总表并写入
//! 5. **全局统计**：输出文档数和检测失败次数
//!
//! 参与者之间严格串行；汇总只依赖已持久化的报告，
//! 所以 `--consolidate` 模式可以跳过检测直接重算。

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, info_span, warn};

use crate::clients::{
    Detector, DetectorSettings, GptZeroClient, HttpTransport, RateLimitPolicy, ReqwestTransport,
    Sleeper, TokioSleeper, ZeroGptClient,
};
use crate::config::Config;
use crate::models::{ConsolidatedTable, DetectorKind};
use crate::orchestrator::aggregator;
use crate::orchestrator::batch_analyzer::{AnalysisStats, BatchAnalyzer, BatchSettings};
use crate::services::{ReportWriter, TextLoader};
use crate::utils::logging::{
    log_participant_start, log_participants_loaded, log_startup, print_final_stats,
};

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// 检测 + 写报告 + 汇总
    Full,
    /// 只根据已有报告重新汇总
    ConsolidateOnly,
}

/// 一次运行的结果
#[derive(Debug)]
pub struct RunOutcome {
    pub stats: AnalysisStats,
    pub participants: usize,
    pub table: ConsolidatedTable,
}

/// 应用主结构
pub struct App {
    config: Config,
    mode: RunMode,
    writer: ReportWriter,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config, mode: RunMode) -> Result<Self> {
        config.validate().context("配置无效")?;
        if mode == RunMode::Full {
            config.require_api_keys().context("缺少检测器密钥")?;
        }
        log_startup(&config);

        let writer = ReportWriter::new(&config.reports_folder);
        Ok(Self {
            config,
            mode,
            writer,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<RunOutcome> {
        match self.mode {
            RunMode::ConsolidateOnly => {
                info!("📋 仅汇总模式：跳过检测，直接读取已有报告");
                let table = self.consolidate().await?;
                Ok(RunOutcome {
                    stats: AnalysisStats::default(),
                    participants: table.len(),
                    table,
                })
            }
            RunMode::Full => {
                let mut analyzer = self.build_analyzer()?;
                self.run_with(&mut analyzer).await
            }
        }
    }

    /// 用给定的分析器跑完整流程
    pub async fn run_with<A: Detector, B: Detector>(
        &self,
        analyzer: &mut BatchAnalyzer<A, B>,
    ) -> Result<RunOutcome> {
        let loader = TextLoader::new(&self.config.input_folder)
            .skipping(PathBuf::from(&self.config.reports_folder));
        let participants = loader
            .load(self.config.participant_filter.as_deref())
            .await
            .context("读取文档失败")?;

        let total_documents = participants.iter().map(|p| p.documents.len()).sum();
        log_participants_loaded(participants.len(), total_documents);

        let total = participants.len();
        for (idx, participant) in participants.iter().enumerate() {
            log_participant_start(idx + 1, total, &participant.participant_id, participant.documents.len());

            let records = analyzer
                .analyze(&participant.documents)
                .await
                .with_context(|| format!("参与者 {} 分析中止", participant.participant_id))?;

            self.writer
                .write_participant_report(&participant.participant_id, &records)
                .await
                .with_context(|| format!("写入参与者 {} 的报告失败", participant.participant_id))?;
        }

        let table = self.consolidate().await?;

        let stats = analyzer.stats();
        print_final_stats(total, stats.documents, stats.failures_a, stats.failures_b);

        Ok(RunOutcome {
            stats,
            participants: total,
            table,
        })
    }

    /// 从报告目录重新计算汇总表并写入
    pub async fn consolidate(&self) -> Result<ConsolidatedTable> {
        let reports = self.writer.load_all_reports().await.context("读取参与者报告失败")?;
        let table = aggregator::aggregate(&reports).context("汇总失败")?;

        for summary in table.iter() {
            if summary.total_documents == 0 {
                warn!("⚠️ 参与者 {} 的报告中没有文档", summary.participant_id);
            }
        }

        self.writer
            .write_consolidated(&table)
            .await
            .context("写入汇总报告失败")?;
        Ok(table)
    }

    fn build_analyzer(&self) -> Result<BatchAnalyzer<GptZeroClient, ZeroGptClient>> {
        let transport: Arc<dyn HttpTransport> = Arc::new(
            ReqwestTransport::new(self.config.http_timeout()).context("创建 HTTP 客户端失败")?,
        );
        let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);

        let gptzero = GptZeroClient::new(
            &detector_settings(&self.config, DetectorKind::GptZero),
            transport.clone(),
            sleeper.clone(),
            info_span!("detector", name = %DetectorKind::GptZero),
        );
        let zerogpt = ZeroGptClient::new(
            &detector_settings(&self.config, DetectorKind::ZeroGpt),
            transport,
            sleeper.clone(),
            info_span!("detector", name = %DetectorKind::ZeroGpt),
        );

        Ok(BatchAnalyzer::new(
            gptzero,
            zerogpt,
            sleeper,
            BatchSettings::from(&self.config),
        ))
    }
}

/// 从配置生成某个检测器的端点设置
pub fn detector_settings(config: &Config, kind: DetectorKind) -> DetectorSettings {
    let (url, api_key) = match kind {
        DetectorKind::GptZero => (&config.gptzero_api_url, &config.gptzero_api_key),
        DetectorKind::ZeroGpt => (&config.zerogpt_api_url, &config.zerogpt_api_key),
    };
    DetectorSettings {
        url: url.clone(),
        api_key: api_key.clone(),
        min_interval: config.min_request_interval(),
        policy: RateLimitPolicy {
            cooldown: config.rate_limit_cooldown(),
            max_retries: config.max_rate_limit_retries,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn settings_follow_config() {
        let config = Config {
            zerogpt_api_key: "zkey".to_string(),
            rate_limit_cooldown_secs: 30,
            max_rate_limit_retries: 2,
            ..Config::default()
        };

        let settings = detector_settings(&config, DetectorKind::ZeroGpt);
        assert_eq!(settings.api_key, "zkey");
        assert_eq!(settings.url, config.zerogpt_api_url);
        assert_eq!(settings.policy.cooldown, Duration::from_secs(30));
        assert_eq!(settings.policy.max_retries, 2);
        assert_eq!(settings.min_interval, Duration::from_secs(1));
    }

    #[test]
    fn full_mode_requires_api_keys() {
        assert!(App::initialize(Config::default(), RunMode::Full).is_err());
        tokio_test::assert_ok!(App::initialize(Config::default(), RunMode::ConsolidateOnly));
    }

    #[tokio::test]
    async fn consolidate_only_without_reports_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            reports_folder: dir.path().display().to_string(),
            ..Config::default()
        };

        let app = tokio_test::assert_ok!(App::initialize(config, RunMode::ConsolidateOnly));
        let err = tokio_test::assert_err!(app.run().await.map(|outcome| outcome.participants));
        assert!(format!("{:#}", err).contains("读取参与者报告失败"));
    }
}
