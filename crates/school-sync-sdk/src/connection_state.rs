//! 连接状态
//!
//! 推送通道的逻辑连接状态由 `ConnectionManager` 独占维护，其他组件只读。

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// 尚未启动
    Idle,
    /// 连接中
    Connecting,
    /// 已连接（已订阅）
    Open,
    /// 等待重连（第 attempt 次）
    Reconnecting { attempt: u32 },
    /// 已停止（显式 stop），不会自动重连
    Closed,
}

impl ConnectionState {
    /// 是否持有（或正在建立）一条物理连接
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "未启动"),
            ConnectionState::Connecting => write!(f, "连接中"),
            ConnectionState::Open => write!(f, "已连接"),
            ConnectionState::Reconnecting { attempt } => write!(f, "重连中(第{}次)", attempt),
            ConnectionState::Closed => write!(f, "已关闭"),
        }
    }
}

/// 连接统计
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionStats {
    /// 成功建立连接次数
    pub opens: u64,
    /// 已安排的重连次数
    pub reconnects_scheduled: u64,
    /// 已接收帧数
    pub frames_received: u64,
    /// 已丢弃帧数（格式错误或与本地无关）
    pub frames_dropped: u64,
    /// 当前连接建立时间（UTC毫秒时间戳）
    pub connected_at: Option<i64>,
    /// 最后活动时间（UTC毫秒时间戳）
    pub last_activity_time: Option<i64>,
}

impl ConnectionStats {
    pub(crate) fn mark_open(&mut self) {
        self.opens += 1;
        let now = Utc::now().timestamp_millis();
        self.connected_at = Some(now);
        self.last_activity_time = Some(now);
    }

    pub(crate) fn mark_disconnected(&mut self) {
        self.connected_at = None;
    }

    pub(crate) fn mark_frame(&mut self) {
        self.frames_received += 1;
        self.last_activity_time = Some(Utc::now().timestamp_millis());
    }

    /// 获取连接持续时间（秒）
    pub fn connection_duration_secs(&self) -> Option<i64> {
        self.connected_at.map(|connected_at| {
            let now = Utc::now().timestamp_millis();
            (now - connected_at) / 1000
        })
    }

    /// 生成统计摘要（用于日志打印）
    pub fn summary(&self, state: ConnectionState) -> String {
        let duration = match self.connection_duration_secs() {
            Some(secs) if secs >= 60 => format!("{}分{}秒", secs / 60, secs % 60),
            Some(secs) => format!("{}秒", secs),
            None => "未连接".to_string(),
        };
        format!(
            "【推送通道】状态: {} | 已连接: {} | 建连{}次/重连{}次 | 接收{}帧/丢弃{}帧",
            state,
            duration,
            self.opens,
            self.reconnects_scheduled,
            self.frames_received,
            self.frames_dropped
        )
    }
}
