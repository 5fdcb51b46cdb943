//! 实时同步模块
//!
//! 职责：
//! - 维护推送订阅（连接、断线重连、前后台切换）
//! - 把推送帧对账合入本地班级列表
//! - 本地修改的乐观更新与失败回滚

pub mod connection_manager;
pub mod controller;
pub mod optimistic;
pub mod reconciler;

pub use connection_manager::ConnectionManager;
pub use controller::SyncController;
pub use optimistic::{OptimisticUpdateCoordinator, PendingWrite, WriteOutcome};
pub use reconciler::{
    parse_frame, reconcile, DropReason, InboundEvent, MessageReconciler, CLASS_STATUS_UPDATE,
};
