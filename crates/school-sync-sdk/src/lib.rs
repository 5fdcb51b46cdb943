//! School Sync SDK - 班级状态实时同步
//!
//! 本 SDK 让多个客户端看到一致的班级状态（已放学 / 上课中 / 放学中）：
//! - 📡 推送订阅：按学校订阅 WebSocket 推送，断线指数退避重连（1s → 15s）
//! - 🔄 推送对账：把服务端推送定点合入本地班级列表
//! - ⚡ 乐观更新：本地修改立即生效，远端失败时安全回滚
//! - 🌙 生命周期：前后台切换暂停/恢复重连，页面卸载停止订阅
//! - ⚙️ 事件系统：连接状态、状态变更、写入失败统一广播
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use school_sync_sdk::{ClassStatus, HttpClassApi, SyncConfig, SyncController};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig::builder()
//!         .api_base_url("https://school.bytefuse.cn")
//!         .token("session-token")
//!         .build();
//!
//!     let api = Arc::new(HttpClassApi::new(&config)?);
//!     let controller = SyncController::initialize(config, api).await?;
//!
//!     // 拉取会话并订阅推送
//!     controller.load_session().await?;
//!
//!     // 修改班级状态（乐观更新）
//!     let outcome = controller.update_status(2, ClassStatus::Dismissing).await?;
//!     if let Some(error) = outcome.error() {
//!         eprintln!("修改失败: {}", error);
//!     }
//!
//!     controller.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod config;
pub mod connection_state;
pub mod error;
pub mod events;
pub mod http_client;
pub mod lifecycle;
pub mod models;
pub mod network;
pub mod store;
pub mod sync;
pub mod version;

pub use backoff::{BackoffConfig, BackoffScheduler};
pub use config::{SyncConfig, SyncConfigBuilder, TopicKind, DEFAULT_API_BASE_URL};
pub use connection_state::{ConnectionState, ConnectionStats};
pub use error::{Result, SyncError};
pub use events::{EventManager, SyncEvent, UpdateSource};
pub use http_client::{ClassApi, HttpClassApi};
pub use lifecycle::{LifecycleHook, LifecycleManager, LifecyclePhase};
pub use models::{ClassId, ClassInfo, ClassStatus, RoleInfo, SchoolId, UserInfo};
pub use network::{
    CloseReason, ConnectRequest, PushEndpoint, SocketCallbacks, SocketFactory, SocketHandle, Timer,
    TimerHandle, TokioTimer, Topic, WebSocketFactory,
};
pub use store::{ClassListStore, StatusChange, StatusStore};
pub use sync::{
    reconcile, ConnectionManager, MessageReconciler, OptimisticUpdateCoordinator, SyncController,
    WriteOutcome,
};
pub use version::{BUILD_TIME, SDK_VERSION};
