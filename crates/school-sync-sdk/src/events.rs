//! 事件系统模块
//!
//! 功能包括：
//! - 连接状态变更事件
//! - 班级状态变更事件（推送 / 乐观更新 / 回滚）
//! - 状态写入失败通知
//! - 事件广播和订阅机制

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::connection_state::ConnectionState;
use crate::models::{ClassId, ClassStatus};

/// 状态变更来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateSource {
    /// 服务端推送
    Push,
    /// 本地乐观更新
    Optimistic,
    /// 写入失败后的回滚
    Rollback,
}

/// SDK 事件类型
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SyncEvent {
    /// 连接状态变更
    ConnectionStateChanged {
        old_state: ConnectionState,
        new_state: ConnectionState,
        timestamp: i64,
    },
    /// 班级状态变更
    ClassStatusChanged {
        class_id: ClassId,
        old_status: ClassStatus,
        new_status: ClassStatus,
        source: UpdateSource,
        timestamp: i64,
    },
    /// 状态写入失败（已回滚，需提示用户）
    StatusWriteFailed {
        class_id: ClassId,
        attempted: ClassStatus,
        error: String,
        timestamp: i64,
    },
    /// 推送帧被丢弃
    FrameDropped { reason: String, timestamp: i64 },
}

impl SyncEvent {
    /// 获取事件类型名称
    pub fn event_type(&self) -> &'static str {
        match self {
            SyncEvent::ConnectionStateChanged { .. } => "connection_state_changed",
            SyncEvent::ClassStatusChanged { .. } => "class_status_changed",
            SyncEvent::StatusWriteFailed { .. } => "status_write_failed",
            SyncEvent::FrameDropped { .. } => "frame_dropped",
        }
    }

    /// 获取事件时间戳（UTC毫秒）
    pub fn timestamp(&self) -> i64 {
        match self {
            SyncEvent::ConnectionStateChanged { timestamp, .. }
            | SyncEvent::ClassStatusChanged { timestamp, .. }
            | SyncEvent::StatusWriteFailed { timestamp, .. }
            | SyncEvent::FrameDropped { timestamp, .. } => *timestamp,
        }
    }
}

/// 事件构建辅助函数
pub mod event_builders {
    use super::*;

    pub fn connection_state_changed(
        old_state: ConnectionState,
        new_state: ConnectionState,
    ) -> SyncEvent {
        SyncEvent::ConnectionStateChanged {
            old_state,
            new_state,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn class_status_changed(
        class_id: ClassId,
        old_status: ClassStatus,
        new_status: ClassStatus,
        source: UpdateSource,
    ) -> SyncEvent {
        SyncEvent::ClassStatusChanged {
            class_id,
            old_status,
            new_status,
            source,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn status_write_failed(
        class_id: ClassId,
        attempted: ClassStatus,
        error: String,
    ) -> SyncEvent {
        SyncEvent::StatusWriteFailed {
            class_id,
            attempted,
            error,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn frame_dropped(reason: impl Into<String>) -> SyncEvent {
        SyncEvent::FrameDropped {
            reason: reason.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// 事件监听器类型
pub type EventListener = Box<dyn Fn(&SyncEvent) + Send + Sync>;

/// 事件统计信息
#[derive(Debug, Clone, Default)]
pub struct EventStats {
    /// 总事件数
    pub total_events: u64,
    /// 按类型分组的事件数
    pub events_by_type: HashMap<String, u64>,
    /// 监听器数量
    pub listener_count: usize,
    /// 最后事件时间
    pub last_event_time: Option<i64>,
}

/// 事件管理器
///
/// 发布是同步的（不跨 await 持锁），状态机在迁移过程中可以直接调用。
pub struct EventManager {
    /// 广播发送器
    sender: broadcast::Sender<SyncEvent>,
    /// 事件监听器映射
    listeners: Arc<parking_lot::RwLock<HashMap<String, Vec<EventListener>>>>,
    /// 事件统计
    stats: Arc<parking_lot::RwLock<EventStats>>,
}

impl EventManager {
    /// 创建新的事件管理器
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));

        Self {
            sender,
            listeners: Arc::new(parking_lot::RwLock::new(HashMap::new())),
            stats: Arc::new(parking_lot::RwLock::new(EventStats::default())),
        }
    }

    /// 发布事件
    pub fn emit(&self, event: SyncEvent) {
        debug!("Emitting event: {}", event.event_type());

        {
            let mut stats = self.stats.write();
            stats.total_events += 1;
            *stats
                .events_by_type
                .entry(event.event_type().to_string())
                .or_insert(0) += 1;
            stats.last_event_time = Some(event.timestamp());
        }

        // 无订阅者时 send 会失败，属正常场景（无 UI 客户端）
        if let Err(e) = self.sender.send(event.clone()) {
            debug!("Failed to broadcast event (no active receivers): {}", e);
        }

        let listeners = self.listeners.read();
        if let Some(event_listeners) = listeners.get(event.event_type()) {
            for listener in event_listeners {
                listener(&event);
            }
        }
        if let Some(general_listeners) = listeners.get("*") {
            for listener in general_listeners {
                listener(&event);
            }
        }
    }

    /// 订阅事件
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// 添加事件监听器（`"*"` 监听全部事件）
    pub fn add_listener<F>(&self, event_type: &str, listener: F)
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.write();
        listeners
            .entry(event_type.to_string())
            .or_default()
            .push(Box::new(listener));

        self.stats.write().listener_count = listeners.values().map(|v| v.len()).sum();

        info!("Added listener for event type: {}", event_type);
    }

    /// 移除所有监听器
    pub fn clear_listeners(&self) {
        self.listeners.write().clear();
        self.stats.write().listener_count = 0;
        info!("Cleared all event listeners");
    }

    /// 获取事件统计
    pub fn get_stats(&self) -> EventStats {
        self.stats.read().clone()
    }

    /// 获取活跃订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl std::fmt::Debug for EventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventManager")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_emit_reaches_subscribers_and_listeners() {
        let manager = EventManager::new(16);
        let mut rx = manager.subscribe();

        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        manager.add_listener("status_write_failed", move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });
        let all = Arc::new(AtomicUsize::new(0));
        let all_clone = all.clone();
        manager.add_listener("*", move |_| {
            all_clone.fetch_add(1, Ordering::SeqCst);
        });

        manager.emit(event_builders::status_write_failed(
            7,
            ClassStatus::InClass,
            "boom".to_string(),
        ));
        manager.emit(event_builders::frame_dropped("not json"));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.event_type(), "status_write_failed");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(all.load(Ordering::SeqCst), 2);

        let stats = manager.get_stats();
        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.listener_count, 2);
        assert_eq!(stats.events_by_type.get("frame_dropped"), Some(&1));
    }

    #[test]
    fn test_emit_without_subscribers_is_harmless() {
        let manager = EventManager::new(4);
        manager.emit(event_builders::connection_state_changed(
            ConnectionState::Idle,
            ConnectionState::Connecting,
        ));
        assert_eq!(manager.subscriber_count(), 0);
        assert_eq!(manager.get_stats().total_events, 1);
    }
}
