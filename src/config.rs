use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// 默认配置文件名（存在时自动加载）
pub const DEFAULT_CONFIG_FILE: &str = "detector.toml";

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 参与者文档根目录（每个参与者一个子目录）
    pub input_folder: String,
    /// 报告输出目录
    pub reports_folder: String,
    /// 日志目录
    pub log_dir: String,
    /// 只处理指定参与者（可选）
    pub participant_filter: Option<String>,
    // --- 检测器 A (GPTZero) ---
    pub gptzero_api_key: String,
    pub gptzero_api_url: String,
    // --- 检测器 B (ZeroGPT) ---
    pub zerogpt_api_key: String,
    pub zerogpt_api_url: String,
    // --- 批处理节奏 ---
    /// 每批文档数量
    pub batch_size: usize,
    /// 每个文档处理完后的等待（毫秒）
    pub document_delay_ms: u64,
    /// 批次之间的等待（毫秒）
    pub batch_delay_ms: u64,
    /// 同一检测器两次请求之间的最小间隔（毫秒）
    pub min_request_interval_ms: u64,
    /// 触发限流后的冷却时间（秒）
    pub rate_limit_cooldown_secs: u64,
    /// 限流后最多重试次数
    pub max_rate_limit_retries: usize,
    /// HTTP 超时（秒）
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_folder: "documents".to_string(),
            reports_folder: "documents/reports".to_string(),
            log_dir: "logs".to_string(),
            participant_filter: None,
            gptzero_api_key: String::new(),
            gptzero_api_url: "https://api.gptzero.me/v2/predict/text".to_string(),
            zerogpt_api_key: String::new(),
            zerogpt_api_url: "https://api.zerogpt.com/api/detect/detectText".to_string(),
            batch_size: 40,
            document_delay_ms: 1_000,
            batch_delay_ms: 5_000,
            min_request_interval_ms: 1_000,
            rate_limit_cooldown_secs: 60,
            max_rate_limit_retries: 5,
            http_timeout_secs: 120,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 读取 TOML 配置文件，缺省字段使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    /// 加载配置：`detector.toml`（如果存在）+ 环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// 从指定配置文件加载；文件不存在时只使用环境变量
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            Self::from_toml_file(path)?.with_env_overrides()
        } else {
            Self::from_env()
        };
        config.validate()?;
        Ok(config)
    }

    /// 加载失败时退回默认配置，并把错误交给调用方
    ///
    /// 用于在日志初始化之前读取配置：即使配置有误，日志也能按默认目录写入。
    pub fn load_or_default_from(path: &Path) -> (Self, Option<ConfigError>) {
        match Self::load_from(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    pub fn load_or_default() -> (Self, Option<ConfigError>) {
        Self::load_or_default_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    fn with_env_overrides(self) -> Self {
        Self {
            input_folder: std::env::var("INPUT_FOLDER").unwrap_or(self.input_folder),
            reports_folder: std::env::var("REPORTS_FOLDER").unwrap_or(self.reports_folder),
            log_dir: std::env::var("LOG_DIR").unwrap_or(self.log_dir),
            participant_filter: std::env::var("PARTICIPANT").ok().or(self.participant_filter),
            gptzero_api_key: std::env::var("GPTZERO_API_KEY").unwrap_or(self.gptzero_api_key),
            gptzero_api_url: std::env::var("GPTZERO_API_URL").unwrap_or(self.gptzero_api_url),
            zerogpt_api_key: std::env::var("ZEROGPT_API_KEY").unwrap_or(self.zerogpt_api_key),
            zerogpt_api_url: std::env::var("ZEROGPT_API_URL").unwrap_or(self.zerogpt_api_url),
            batch_size: std::env::var("BATCH_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(self.batch_size),
            document_delay_ms: std::env::var("DOCUMENT_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.document_delay_ms),
            batch_delay_ms: std::env::var("BATCH_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.batch_delay_ms),
            min_request_interval_ms: std::env::var("MIN_REQUEST_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.min_request_interval_ms),
            rate_limit_cooldown_secs: std::env::var("RATE_LIMIT_COOLDOWN_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.rate_limit_cooldown_secs),
            max_rate_limit_retries: std::env::var("MAX_RATE_LIMIT_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(self.max_rate_limit_retries),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(self.http_timeout_secs),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch_size".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// 调用检测器前检查密钥是否齐全
    pub fn require_api_keys(&self) -> Result<(), ConfigError> {
        if self.gptzero_api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey {
                var_name: "GPTZERO_API_KEY".to_string(),
            });
        }
        if self.zerogpt_api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey {
                var_name: "ZEROGPT_API_KEY".to_string(),
            });
        }
        Ok(())
    }

    pub fn document_delay(&self) -> Duration {
        Duration::from_millis(self.document_delay_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_batch_pacing() {
        let config = Config::default();
        assert_eq!(config.batch_size, 40);
        assert_eq!(config.document_delay(), Duration::from_secs(1));
        assert_eq!(config.batch_delay(), Duration::from_secs(5));
        assert_eq!(config.min_request_interval(), Duration::from_secs(1));
        assert_eq!(config.rate_limit_cooldown(), Duration::from_secs(60));
    }

    #[test]
    fn toml_file_overrides_only_given_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "batch_size = 10\ngptzero_api_key = \"abc\"\nparticipant_filter = \"alice\""
        )
        .unwrap();

        let config = Config::from_toml_file(file.path()).unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.gptzero_api_key, "abc");
        assert_eq!(config.participant_filter.as_deref(), Some("alice"));
        assert_eq!(config.batch_delay_ms, 5_000);
    }

    #[test]
    fn broken_toml_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "batch_size = = 3").unwrap();

        let err = Config::from_toml_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::TomlParseFailed { .. }));
    }

    #[test]
    fn missing_config_file_falls_back_to_env_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("detector.toml")).unwrap();
        assert_eq!(config.batch_size, Config::from_env().batch_size);
        assert_eq!(config.rate_limit_cooldown_secs, Config::from_env().rate_limit_cooldown_secs);
    }

    #[test]
    fn broken_config_keeps_default_log_dir() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_dir = [").unwrap();

        let (config, err) = Config::load_or_default_from(file.path());
        assert_eq!(config.log_dir, Config::default().log_dir);
        assert!(matches!(err, Some(ConfigError::TomlParseFailed { .. })));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = Config {
            batch_size: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_keys_are_reported() {
        let config = Config {
            gptzero_api_key: "a".to_string(),
            ..Config::default()
        };
        match config.require_api_keys() {
            Err(ConfigError::MissingApiKey { var_name }) => assert_eq!(var_name, "ZEROGPT_API_KEY"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
