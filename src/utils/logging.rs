//! 日志工具模块
//!
//! 提供日志初始化、格式化和输出的辅助函数

use crate::config::Config;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 一次运行的日志会话
///
/// 持有文件写入器的 guard，`finish` 或 drop 时把缓冲的日志刷到文件。
pub struct LogSession {
    log_file: Option<PathBuf>,
    started: Instant,
    _guard: Option<WorkerGuard>,
}

impl LogSession {
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// 结束本次运行的日志
    pub fn finish(self) {
        info!("⏱️ 总耗时: {:.1} 秒", self.started.elapsed().as_secs_f64());
        if let Some(path) = &self.log_file {
            info!("日志已保存至: {}", path.display());
        }
    }
}

/// 初始化日志（每次运行调用一次）
///
/// 控制台 + `log_dir` 下的时间戳日志文件；目录不可写时只输出到控制台。
/// 日志级别默认 `info`，可通过 `RUST_LOG` 覆盖。
pub fn init(config: &Config) -> LogSession {
    let started = Instant::now();
    let env_filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let log_dir = PathBuf::from(&config.log_dir);
    if let Err(e) = fs::create_dir_all(&log_dir) {
        let _ = tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt::layer().with_target(false))
            .try_init();
        warn!("无法创建日志目录 {}: {}，仅输出到控制台", log_dir.display(), e);
        return LogSession {
            log_file: None,
            started,
            _guard: None,
        };
    }

    let file_name = format!(
        "ai_detect_{}.log",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let appender = tracing_appender::rolling::never(&log_dir, &file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init();

    LogSession {
        log_file: Some(log_dir.join(file_name)),
        started,
        _guard: Some(guard),
    }
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - AI 文本检测批处理");
    info!("📁 输入目录: {}", config.input_folder);
    info!("📊 每批文档数: {}", config.batch_size);
    info!(
        "⏱️ 文档间隔 {} 毫秒 / 批次间隔 {} 毫秒",
        config.document_delay_ms, config.batch_delay_ms
    );
    info!("{}", "=".repeat(60));
}

/// 记录参与者加载信息
///
/// # 参数
/// - `participants`: 参与者数量
/// - `documents`: 文档总数
pub fn log_participants_loaded(participants: usize, documents: usize) {
    info!("✓ 找到 {} 个参与者，共 {} 个文档", participants, documents);
}

/// 记录参与者开始处理
pub fn log_participant_start(index: usize, total: usize, participant: &str, documents: usize) {
    info!("\n{}", "=".repeat(60));
    info!("👤 参与者 {}/{}: {} ({} 个文档)", index, total, participant, documents);
    info!("{}", "=".repeat(60));
}

/// 记录批次开始信息
///
/// # 参数
/// - `batch_num`: 批次编号
/// - `total_batches`: 批次总数
/// - `start`: 起始文档编号
/// - `end`: 结束文档编号
/// - `total`: 文档总数
pub fn log_batch_start(
    batch_num: usize,
    total_batches: usize,
    start: usize,
    end: usize,
    total: usize,
) {
    info!("\n{}", "─".repeat(60));
    info!("📦 开始处理第 {}/{} 批", batch_num, total_batches);
    info!("📄 本批文档: {}-{} / 共 {} 个", start, end, total);
    info!("{}", "─".repeat(60));
}

/// 记录批次完成信息
///
/// # 参数
/// - `batch_num`: 批次编号
/// - `documents`: 本批文档数
/// - `failures`: 本批检测器失败次数（每个文档最多 2 次）
pub fn log_batch_complete(batch_num: usize, documents: usize, failures: usize) {
    info!("✓ 第 {} 批完成: {} 个文档，检测失败 {} 次", batch_num, documents, failures);
}

/// 打印最终统计信息
///
/// # 参数
/// - `participants`: 参与者数量
/// - `documents`: 文档总数
/// - `failures_a`: 检测器 A 失败次数
/// - `failures_b`: 检测器 B 失败次数
pub fn print_final_stats(participants: usize, documents: usize, failures_a: usize, failures_b: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("👥 参与者: {}", participants);
    info!("📄 文档: {}", documents);
    info!("❌ GPTZero 失败: {} / ZeroGPT 失败: {}", failures_a, failures_b);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
