//! 同步 SDK 配置

use serde::{Deserialize, Serialize};

use crate::backoff::BackoffConfig;
use crate::error::{Result, SyncError};

/// 默认服务地址
pub const DEFAULT_API_BASE_URL: &str = "https://school.bytefuse.cn";

/// 订阅范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopicKind {
    /// 按学校订阅：`/ws/school/{id}`
    School,
    /// 旧版按班级订阅：`/ws/class/{id}`
    Class,
}

/// 同步 SDK 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// HTTP 服务基础地址；为空时降级为「无实时同步」
    pub api_base_url: Option<String>,
    /// 当前会话 token（Bearer）
    pub token: Option<String>,
    /// 订阅范围
    pub topic_kind: TopicKind,
    /// 重连退避配置
    pub backoff: BackoffConfig,
    /// 单次建连超时（秒）
    pub connect_timeout_secs: u64,
    /// HTTP 请求超时（秒）
    pub request_timeout_secs: u64,
    /// 事件缓冲区大小
    pub event_buffer_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: Some(DEFAULT_API_BASE_URL.to_string()),
            token: None,
            topic_kind: TopicKind::School,
            backoff: BackoffConfig::default(),
            connect_timeout_secs: 15, // 单次尝试 15s 超时，无网络时快速失败进入退避
            request_timeout_secs: 30,
            event_buffer_size: 256,
        }
    }
}

impl SyncConfig {
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::new()
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.backoff.base_delay_ms == 0 {
            return Err(SyncError::Config("重连初始间隔不能为 0".to_string()));
        }
        if self.backoff.max_delay_ms < self.backoff.base_delay_ms {
            return Err(SyncError::Config(format!(
                "重连最大间隔 {}ms 小于初始间隔 {}ms",
                self.backoff.max_delay_ms, self.backoff.base_delay_ms
            )));
        }
        if self.connect_timeout_secs == 0 {
            return Err(SyncError::Config("建连超时不能为 0".to_string()));
        }
        Ok(())
    }

    /// 去掉首尾空白后的服务地址
    pub fn base_url(&self) -> Option<&str> {
        self.api_base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// 配置构建器
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SyncConfig::default(),
        }
    }

    pub fn api_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.api_base_url = Some(url.into());
        self
    }

    /// 不配置服务地址（仅本地，无实时同步）
    pub fn without_api_base_url(mut self) -> Self {
        self.config.api_base_url = None;
        self
    }

    pub fn token<S: Into<String>>(mut self, token: S) -> Self {
        self.config.token = Some(token.into());
        self
    }

    pub fn topic_kind(mut self, kind: TopicKind) -> Self {
        self.config.topic_kind = kind;
        self
    }

    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.config.backoff = backoff;
        self
    }

    pub fn connect_timeout(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    pub fn request_timeout(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.config.event_buffer_size = size;
        self
    }

    pub fn build(self) -> SyncConfig {
        self.config
    }
}

impl Default for SyncConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = SyncConfig::builder()
            .api_base_url("http://127.0.0.1:8080/")
            .token("abc")
            .topic_kind(TopicKind::Class)
            .connect_timeout(5)
            .build();

        assert_eq!(config.base_url(), Some("http://127.0.0.1:8080/"));
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.topic_kind, TopicKind::Class);
        assert_eq!(config.connect_timeout_secs, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_base_url_is_absent() {
        let config = SyncConfig::builder().api_base_url("   ").build();
        assert_eq!(config.base_url(), None);
        let config = SyncConfig::builder().without_api_base_url().build();
        assert_eq!(config.base_url(), None);
    }

    #[test]
    fn test_validate_rejects_bad_backoff() {
        let config = SyncConfig::builder()
            .backoff(BackoffConfig {
                base_delay_ms: 2_000,
                max_delay_ms: 1_000,
            })
            .build();
        assert!(matches!(config.validate(), Err(SyncError::Config(_))));

        let config = SyncConfig::builder()
            .backoff(BackoffConfig {
                base_delay_ms: 0,
                max_delay_ms: 1_000,
            })
            .build();
        assert!(config.validate().is_err());
    }
}
