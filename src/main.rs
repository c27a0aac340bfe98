use ai_detect_batch::orchestrator::{App, RunMode};
use ai_detect_batch::utils::logging;
use ai_detect_batch::Config;
use anyhow::Result;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置（失败时先用默认配置启动日志，再报告错误）
    let (mut config, load_error) = Config::load_or_default();

    // 参数：--consolidate 只重新汇总；其他参数视为参与者名
    let mut mode = RunMode::Full;
    if let Some(arg) = std::env::args().nth(1) {
        if arg == "--consolidate" {
            mode = RunMode::ConsolidateOnly;
        } else {
            config.participant_filter = Some(arg);
        }
    }

    // 初始化日志
    let session = logging::init(&config);

    if let Some(e) = load_error {
        error!("❌ 配置加载失败: {}", e);
        session.finish();
        return Err(e.into());
    }

    let result = match App::initialize(config, mode) {
        Ok(app) => app.run().await.map(|_| ()),
        Err(e) => Err(e),
    };
    if let Err(e) = &result {
        error!("❌ 运行失败: {:#}", e);
    }

    session.finish();
    result
}
