//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量检测和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用主流程
//! - 管理一次运行（初始化、运行模式、统计）
//! - 逐个参与者调度分析并写入报告
//! - 从已写入的报告重新汇总
//!
//! ### `batch_analyzer` - 批量文档分析器
//! - 把单个参与者的文档切成固定大小的批次
//! - 每个文档依次调用两个检测器，失败时降级为占位结果
//! - 控制文档间隔和批次间隔
//!
//! ### `aggregator` - 汇总器
//! - 按阈值统计、计算标记比例和均值
//! - 按标记比例降序排列
//!
//! ## 层次关系
//!
//! ```text
//! app (处理 Vec<ParticipantDocuments>)
//!     ↓
//! batch_analyzer (处理 Vec<DetectionRequest>)
//!     ↓
//! clients (检测能力：GPTZero / ZeroGPT)
//!
//! app → services (能力层：text_loader / report_writer)
//!     → aggregator (纯计算)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：app 管流程，batch_analyzer 管单个参与者，aggregator 只做计算
//! 2. **严格串行**：同一时刻只有一个检测请求
//! 3. **向下依赖**：编排层 → services / clients → models

pub mod aggregator;
pub mod app;
pub mod batch_analyzer;

// 重新导出主要类型
pub use aggregator::{aggregate, summarize};
pub use app::{App, RunMode, RunOutcome};
pub use batch_analyzer::{partition, AnalysisStats, BatchAnalyzer, BatchSettings};
