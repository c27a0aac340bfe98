//! 检测器端点：节流 + 限流重试
//!
//! 两个检测器客户端共用这一层，只在 payload 的构造和解析上有区别。

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::governor::{RateGovernor, Sleeper};
use super::transport::{HttpReply, HttpTransport};
use crate::error::DetectorError;
use crate::models::DetectorKind;
use crate::utils::logging::truncate_text;

/// 触发限流（429）后的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// 每次被限流后的固定冷却时间
    pub cooldown: Duration,
    /// 最多重试次数；为 0 时直接返回 `RateLimited`
    pub max_retries: usize,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(60),
            max_retries: 5,
        }
    }
}

/// 检测器端点配置
#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub url: String,
    pub api_key: String,
    pub min_interval: Duration,
    pub policy: RateLimitPolicy,
}

/// 单个检测器的请求通道
pub struct DetectorEndpoint {
    kind: DetectorKind,
    url: String,
    transport: Arc<dyn HttpTransport>,
    sleeper: Arc<dyn Sleeper>,
    governor: RateGovernor,
    policy: RateLimitPolicy,
}

impl DetectorEndpoint {
    pub fn new(
        kind: DetectorKind,
        settings: &DetectorSettings,
        transport: Arc<dyn HttpTransport>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            kind,
            url: settings.url.clone(),
            transport,
            sleeper,
            governor: RateGovernor::new(settings.min_interval),
            policy: settings.policy,
        }
    }

    /// 发送请求，返回 2xx 响应
    ///
    /// # 返回
    /// - 429：冷却后原样重试，超过 `max_retries` 返回 `RateLimitExhausted`
    /// - 网络失败或其他非 2xx 状态：`Transport`，不重试
    pub async fn send(
        &mut self,
        headers: &[(&'static str, String)],
        body: &Value,
    ) -> Result<HttpReply, DetectorError> {
        let mut attempt = 0;
        loop {
            self.governor.wait(self.sleeper.as_ref()).await;

            info!("📤 发送请求到 {} - URL: {}", self.kind, self.url);
            let reply = self
                .transport
                .post_json(&self.url, headers, body)
                .await
                .map_err(|e| DetectorError::transport(self.kind, e.to_string()))?;

            info!("{} 状态码: {}", self.kind, reply.status);
            debug!("{} 原始响应: {}", self.kind, truncate_text(&reply.body, 500));

            if reply.is_rate_limited() {
                if self.policy.max_retries == 0 {
                    return Err(DetectorError::rate_limited(self.kind, "HTTP 429"));
                }
                if attempt >= self.policy.max_retries {
                    return Err(DetectorError::rate_limit_exhausted(self.kind, attempt + 1));
                }
                attempt += 1;
                warn!(
                    "⏳ {} 触发限流 (重试 {}/{}), 等待 {} 秒后重试...",
                    self.kind,
                    attempt,
                    self.policy.max_retries,
                    self.policy.cooldown.as_secs()
                );
                self.sleeper.sleep(self.policy.cooldown).await;
                continue;
            }

            if !reply.is_success() {
                return Err(DetectorError::transport(
                    self.kind,
                    format!("HTTP {}: {}", reply.status, truncate_text(&reply.body, 200)),
                ));
            }

            return Ok(reply);
        }
    }
}
