use std::fmt;
use thiserror::Error;

use crate::models::DetectorKind;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 检测器调用错误（仅致命错误会上抛到这里）
    #[error("检测器错误: {0}")]
    Detector(#[from] DetectorError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 汇总阶段错误
    #[error("汇总错误: {0}")]
    Aggregate(#[from] AggregateError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 输入耗尽（没有可处理的数据）
    #[error("输入不可用: {0}")]
    Exhausted(#[from] ExhaustionError),
}

// ========== 检测器错误 ==========

/// 检测器错误种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorErrorKind {
    /// 服务端返回 429，且未开启重试
    RateLimited,
    /// 网络或 HTTP 层失败（非限流）
    Transport,
    /// 响应无法解析为结构化数据
    MalformedResponse,
    /// 限流重试次数耗尽
    RateLimitExhausted,
}

impl fmt::Display for DetectorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DetectorErrorKind::RateLimited => "请求频率限制",
            DetectorErrorKind::Transport => "请求失败",
            DetectorErrorKind::MalformedResponse => "响应格式错误",
            DetectorErrorKind::RateLimitExhausted => "限流重试次数耗尽",
        };
        f.write_str(label)
    }
}

/// 单次检测调用的错误
#[derive(Debug, Clone, Error)]
#[error("{detector} {kind}: {detail}")]
pub struct DetectorError {
    pub detector: DetectorKind,
    pub kind: DetectorErrorKind,
    pub detail: String,
}

impl DetectorError {
    pub fn new(detector: DetectorKind, kind: DetectorErrorKind, detail: impl Into<String>) -> Self {
        Self {
            detector,
            kind,
            detail: detail.into(),
        }
    }

    pub fn transport(detector: DetectorKind, detail: impl Into<String>) -> Self {
        Self::new(detector, DetectorErrorKind::Transport, detail)
    }

    pub fn malformed(detector: DetectorKind, detail: impl Into<String>) -> Self {
        Self::new(detector, DetectorErrorKind::MalformedResponse, detail)
    }

    pub fn rate_limited(detector: DetectorKind, detail: impl Into<String>) -> Self {
        Self::new(detector, DetectorErrorKind::RateLimited, detail)
    }

    pub fn rate_limit_exhausted(detector: DetectorKind, attempts: usize) -> Self {
        Self::new(
            detector,
            DetectorErrorKind::RateLimitExhausted,
            format!("连续 {} 次请求均被限流", attempts),
        )
    }

    /// 致命错误会中止整个批次运行，其余错误降级为占位结果
    pub fn is_fatal(&self) -> bool {
        self.kind == DetectorErrorKind::RateLimitExhausted
    }
}

// ========== 文件错误 ==========

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// JSON 解析或序列化失败
    #[error("JSON处理失败 ({path}): {source}")]
    JsonFailed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

// ========== 汇总错误 ==========

/// 汇总错误：持久化记录不可信时直接失败，不做猜测修正
#[derive(Debug, Error, PartialEq)]
pub enum AggregateError {
    /// 同一参与者下出现重复文档ID
    #[error("参与者 {participant} 存在重复文档: {document_id}")]
    DuplicateDocument {
        participant: String,
        document_id: String,
    },
    /// 分数超出检测器取值范围且不是失败标记
    #[error("参与者 {participant} 文档 {document_id} 的 {detector} 分数越界: {value}")]
    ScoreOutOfRange {
        participant: String,
        document_id: String,
        detector: DetectorKind,
        value: f64,
    },
    /// 没有任何参与者
    #[error("没有可汇总的参与者")]
    NoParticipants,
}

// ========== 配置错误 ==========

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("无法读取配置文件 {path}: {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 缺少 API 密钥
    #[error("缺少 API 密钥，请设置环境变量 {var_name}")]
    MissingApiKey { var_name: String },
    /// 数值参数非法
    #[error("配置项 {field} 的值非法: {value}")]
    InvalidValue { field: String, value: String },
}

// ========== 输入耗尽 ==========

/// 没有可处理的输入，直接中止运行
#[derive(Debug, Error)]
pub enum ExhaustionError {
    /// 输入目录不存在
    #[error("输入目录不存在: {path}")]
    InputFolderMissing { path: String },
    /// 指定的参与者目录不存在
    #[error("参与者目录不存在: {participant}")]
    ParticipantMissing { participant: String },
    /// 没有任何包含文档的参与者
    #[error("在 {path} 中没有找到任何参与者文档")]
    NoParticipants { path: String },
    /// 报告目录中没有任何参与者报告
    #[error("在 {path} 中没有找到任何参与者报告")]
    NoReports { path: String },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建 JSON 处理错误
    pub fn json_failed(path: impl Into<String>, source: serde_json::Error) -> Self {
        AppError::File(FileError::JsonFailed {
            path: path.into(),
            source,
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_exhausted_rate_limit_is_fatal() {
        let kind = DetectorKind::GptZero;
        assert!(DetectorError::rate_limit_exhausted(kind, 3).is_fatal());
        assert!(!DetectorError::rate_limited(kind, "429").is_fatal());
        assert!(!DetectorError::transport(kind, "timeout").is_fatal());
        assert!(!DetectorError::malformed(kind, "empty").is_fatal());
    }

    #[test]
    fn detector_error_display_names_the_detector() {
        let err = DetectorError::transport(DetectorKind::ZeroGpt, "HTTP 500");
        let text = err.to_string();
        assert!(text.contains("ZeroGPT"));
        assert!(text.contains("HTTP 500"));
    }
}
