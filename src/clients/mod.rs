//! 检测器客户端层
//!
//! 每个客户端包装一个外部检测服务：请求节流、限流重试、把原始响应映射成
//! [`NormalizedDetectorResult`]。
//!
//! ```text
//! GptZeroClient / ZeroGptClient
//!     ↓
//! DetectorEndpoint (RateGovernor + 429 重试)
//!     ↓
//! HttpTransport (reqwest)
//! ```

pub mod endpoint;
pub mod governor;
pub mod gptzero;
pub mod transport;
pub mod zerogpt;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use crate::error::DetectorError;
use crate::models::{DetectorKind, NormalizedDetectorResult};

pub use endpoint::{DetectorEndpoint, DetectorSettings, RateLimitPolicy};
pub use governor::{RateGovernor, Sleeper, TokioSleeper};
pub use gptzero::GptZeroClient;
pub use transport::{HttpReply, HttpTransport, ReqwestTransport, TransportError};
pub use zerogpt::ZeroGptClient;

/// 检测能力
#[async_trait]
pub trait Detector: Send {
    fn kind(&self) -> DetectorKind;

    /// 检测一段文本
    async fn detect(&mut self, text: &str) -> Result<NormalizedDetectorResult, DetectorError>;
}

/// 字段缺失或为 null 时都取默认值
pub(crate) fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::governor::Sleeper;
    use super::transport::{HttpReply, HttpTransport, TransportError};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// 按顺序返回预设响应的传输层，同时记录请求体
    #[derive(Default)]
    pub struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<HttpReply, TransportError>>>,
        pub requests: Mutex<Vec<(String, Vec<(&'static str, String)>, Value)>>,
    }

    impl ScriptedTransport {
        pub fn new(replies: Vec<Result<HttpReply, TransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn post_json(
            &self,
            url: &str,
            headers: &[(&'static str, String)],
            body: &Value,
        ) -> Result<HttpReply, TransportError> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), headers.to_vec(), body.clone()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError("没有更多预设响应".to_string())))
        }
    }

    /// 只记录等待时长，不真正等待
    #[derive(Default)]
    pub struct RecordingSleeper {
        pub calls: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        pub fn count_of(&self, duration: Duration) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|d| **d == duration)
                .count()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.calls.lock().unwrap().push(duration);
        }
    }
}
