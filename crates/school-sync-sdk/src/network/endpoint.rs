//! 推送地址解析

use std::time::Duration;

use crate::config::{SyncConfig, TopicKind};
use crate::error::{Result, SyncError};
use crate::models::{ClassId, SchoolId};
use crate::network::ConnectRequest;
use crate::version;

/// 订阅主题：单一标识（学校或班级）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Topic {
    kind: TopicKind,
    id: i64,
}

impl Topic {
    pub fn school(id: SchoolId) -> Self {
        Self {
            kind: TopicKind::School,
            id,
        }
    }

    pub fn class(id: ClassId) -> Self {
        Self {
            kind: TopicKind::Class,
            id,
        }
    }

    pub fn kind(&self) -> TopicKind {
        self.kind
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// 学校主题对应的学校 ID
    pub fn school_id(&self) -> Option<SchoolId> {
        match self.kind {
            TopicKind::School => Some(self.id),
            TopicKind::Class => None,
        }
    }

    pub fn path(&self) -> String {
        match self.kind {
            TopicKind::School => format!("/ws/school/{}", self.id),
            TopicKind::Class => format!("/ws/class/{}", self.id),
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TopicKind::School => write!(f, "school:{}", self.id),
            TopicKind::Class => write!(f, "class:{}", self.id),
        }
    }
}

/// 推送服务端点：由 HTTP 基础地址推导 ws/wss 地址，并携带鉴权头
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEndpoint {
    ws_base: String,
    token: Option<String>,
    connect_timeout: Duration,
}

impl PushEndpoint {
    /// `http://` → `ws://`，`https://` → `wss://`，已是 ws/wss 的原样保留
    pub fn new(base_url: &str, token: Option<String>, connect_timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let ws_base = if let Some(rest) = trimmed.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = trimmed.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else if trimmed.starts_with("wss://") || trimmed.starts_with("ws://") {
            trimmed.to_string()
        } else {
            return Err(SyncError::Config(format!("无法识别的服务地址: {}", base_url)));
        };

        if ws_base.ends_with("://") {
            return Err(SyncError::Config(format!("服务地址缺少主机名: {}", base_url)));
        }

        Ok(Self {
            ws_base,
            token: token.filter(|t| !t.is_empty()),
            connect_timeout,
        })
    }

    /// 从配置构建；未配置服务地址时返回 `Ok(None)`
    pub fn from_config(config: &SyncConfig) -> Result<Option<Self>> {
        match config.base_url() {
            Some(base) => Self::new(
                base,
                config.token.clone(),
                Duration::from_secs(config.connect_timeout_secs),
            )
            .map(Some),
            None => Ok(None),
        }
    }

    pub fn url(&self, topic: &Topic) -> String {
        format!("{}{}", self.ws_base, topic.path())
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token.filter(|t| !t.is_empty());
    }

    pub fn request(&self, topic: &Topic) -> ConnectRequest {
        let mut headers = vec![("User-Agent".to_string(), version::user_agent())];
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        ConnectRequest {
            url: self.url(topic),
            headers,
            connect_timeout: self.connect_timeout,
        }
    }
}
