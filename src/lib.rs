//! # AI Detect Batch
//!
//! 用两个外部 AI 文本检测服务批量检测参与者文档，并生成汇总报告
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 模型层（Models）
//! - `models/` - 检测请求、归一化检测结果、合并记录、汇总表
//!
//! ### ② 客户端层（Clients）
//! - `clients/` - 每个检测服务一个客户端，负责节流、限流重试和响应映射
//! - `RateGovernor` - 同一检测器两次请求之间的最小间隔
//! - `DetectorEndpoint` - 429 冷却重试
//!
//! ### ③ 业务能力层（Services）
//! - `services/` - 读文档、写报告，不关心检测流程
//! - `TextLoader` - 读取参与者目录并修正文本编码
//! - `ReportWriter` - 参与者报告与汇总报告的读写
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 应用主流程
//! - `orchestrator/batch_analyzer` - 分批检测单个参与者的文档
//! - `orchestrator/aggregator` - 从持久化记录计算汇总表
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use clients::{Detector, GptZeroClient, ZeroGptClient};
pub use config::Config;
pub use error::{AppError, AppResult, DetectorError, DetectorErrorKind};
pub use models::{CombinedRecord, ConsolidatedTable, DetectionRequest, DetectorKind, NormalizedDetectorResult};
pub use orchestrator::{aggregate, App, BatchAnalyzer, RunMode};
