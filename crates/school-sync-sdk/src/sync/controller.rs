//! 同步控制器
//!
//! 把推送连接、推送对账、乐观更新与本地班级列表组装在一起，对界面层暴露会话级接口：
//!
//! - 会话建立（`load_session` / `on_session_established`）→ 初始化列表并订阅推送
//! - 前后台切换 → 暂停/恢复重连
//! - 页面卸载 → 停止订阅
//! - 修改班级状态 → 乐观更新
//!
//! 未配置服务地址或无法确定订阅主题时降级为「无实时同步」，其余功能照常可用。

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backoff::BackoffScheduler;
use crate::config::{SyncConfig, TopicKind};
use crate::connection_state::{ConnectionState, ConnectionStats};
use crate::error::{Result, SyncError};
use crate::events::{EventManager, SyncEvent};
use crate::http_client::ClassApi;
use crate::lifecycle::LifecycleHook;
use crate::models::{ClassId, ClassInfo, ClassStatus, UserInfo};
use crate::network::{
    DriverReceiver, PushEndpoint, SocketFactory, Timer, TokioTimer, Topic, WebSocketFactory,
};
use crate::store::{ClassListStore, StatusStore};
use crate::sync::connection_manager::ConnectionManager;
use crate::sync::optimistic::{OptimisticUpdateCoordinator, WriteOutcome};
use crate::sync::reconciler::{DropReason, MessageReconciler};

/// 同步控制器
pub struct SyncController {
    config: SyncConfig,
    api: Arc<dyn ClassApi>,
    store: Arc<ClassListStore>,
    event_manager: Arc<EventManager>,
    coordinator: OptimisticUpdateCoordinator,
    /// 未配置服务地址时为 None
    connection: Option<Arc<Mutex<ConnectionManager>>>,
    driver: Mutex<Option<JoinHandle<()>>>,
    user: RwLock<Option<UserInfo>>,
    /// 旧版按班级订阅时关注的班级
    focused_class: RwLock<Option<ClassId>>,
    shut_down: AtomicBool,
}

impl SyncController {
    /// 使用默认传输（WebSocket + tokio 定时器）初始化
    pub async fn initialize(config: SyncConfig, api: Arc<dyn ClassApi>) -> Result<Arc<Self>> {
        Self::with_transport(
            config,
            api,
            Arc::new(WebSocketFactory::new()),
            Arc::new(TokioTimer::new()),
        )
    }

    /// 注入连接工厂与定时器；必须在 tokio 运行时内调用
    pub fn with_transport(
        config: SyncConfig,
        api: Arc<dyn ClassApi>,
        factory: Arc<dyn SocketFactory>,
        timer: Arc<dyn Timer>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let event_manager = Arc::new(EventManager::new(config.event_buffer_size));
        let store = Arc::new(ClassListStore::new());
        let coordinator = OptimisticUpdateCoordinator::new(
            store.clone(),
            api.clone(),
            event_manager.clone(),
        );

        let endpoint = match PushEndpoint::from_config(&config) {
            Ok(Some(endpoint)) => Some(endpoint),
            Ok(None) => {
                info!("未配置服务地址，实时同步已禁用");
                None
            }
            Err(e) => {
                warn!("⚠️ 服务地址无效，实时同步已禁用: {}", e);
                None
            }
        };

        let (driver_tx, driver_rx) = mpsc::unbounded_channel();
        let connection = endpoint.map(|endpoint| {
            Arc::new(Mutex::new(ConnectionManager::new(
                endpoint,
                factory,
                timer,
                BackoffScheduler::new(config.backoff),
                driver_tx,
            )))
        });

        let driver = connection.as_ref().map(|connection| {
            tokio::spawn(run_driver(
                driver_rx,
                Arc::downgrade(connection),
                store.clone(),
                MessageReconciler::with_events(event_manager.clone()),
                event_manager.clone(),
            ))
        });

        info!(
            "✅ 同步控制器已初始化 (realtime: {}, topic_kind: {:?})",
            connection.is_some(),
            config.topic_kind
        );

        Ok(Arc::new(Self {
            config,
            api,
            store,
            event_manager,
            coordinator,
            connection,
            driver: Mutex::new(driver),
            user: RwLock::new(None),
            focused_class: RwLock::new(None),
            shut_down: AtomicBool::new(false),
        }))
    }

    /// 对连接状态机执行操作，并在释放锁后发布其产生的事件
    fn with_connection<R>(&self, f: impl FnOnce(&mut ConnectionManager) -> R) -> Option<R> {
        let connection = self.connection.as_ref()?;
        let (result, events) = {
            let mut manager = connection.lock();
            let result = f(&mut manager);
            (result, manager.take_events())
        };
        for event in events {
            self.event_manager.emit(event);
        }
        Some(result)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(SyncError::ShuttingDown("同步控制器已关闭".to_string()));
        }
        Ok(())
    }

    // ========== 会话 ==========

    /// 拉取当前用户并建立会话
    pub async fn load_session(&self) -> Result<UserInfo> {
        self.ensure_running()?;
        let user = match self.api.fetch_current_user().await {
            Ok(user) => user,
            Err(e) => {
                if e.is_auth_failure() {
                    warn!("🔐 登录已失效，需要重新登录: {}", e);
                } else {
                    warn!("❌ 加载用户信息失败: {}", e);
                }
                return Err(e);
            }
        };
        self.on_session_established(user.clone());
        Ok(user)
    }

    /// 重新拉取会话数据（下拉刷新）
    pub async fn refresh(&self) -> Result<UserInfo> {
        debug!("🔄 刷新会话数据");
        self.load_session().await
    }

    /// 会话已建立：初始化班级列表并订阅推送
    pub fn on_session_established(&self, user: UserInfo) {
        info!(
            "👤 会话已建立: user={}, classes={}, teacher={}",
            user.username,
            user.class_infos.len(),
            user.is_teacher()
        );
        let pending = self.coordinator.pending_classes();
        for class in user.class_infos.iter().filter(|c| pending.contains(&c.id)) {
            self.coordinator.rebase(class.id, class.status);
        }
        self.store.reseed(user.class_infos.clone(), &pending);
        let topic = self.derive_topic(&user);
        *self.user.write() = Some(user);
        self.subscribe(topic);
    }

    fn derive_topic(&self, user: &UserInfo) -> Option<Topic> {
        match self.config.topic_kind {
            TopicKind::School => user.resolve_school_id().map(Topic::school),
            TopicKind::Class => {
                let focused = *self.focused_class.read();
                focused
                    .or_else(|| user.class_infos.first().map(|c| c.id))
                    .map(Topic::class)
            }
        }
    }

    fn subscribe(&self, topic: Option<Topic>) {
        match topic {
            Some(topic) => {
                if self.with_connection(|c| c.start(topic)).is_none() {
                    debug!("实时同步未启用，跳过订阅: {}", topic);
                }
            }
            None => {
                warn!("⚠️ 无法确定订阅主题（用户未绑定学校/班级），实时同步已禁用");
                self.with_connection(|c| c.stop());
            }
        }
    }

    /// 旧版按班级订阅：切换关注的班级
    pub fn focus_class(&self, class_id: Option<ClassId>) {
        *self.focused_class.write() = class_id;
        if self.config.topic_kind != TopicKind::Class {
            return;
        }
        let topic = match self.user.read().as_ref() {
            Some(user) => self.derive_topic(user),
            None => return,
        };
        self.subscribe(topic);
    }

    /// 更新推送鉴权 token（下一次建连生效）
    pub fn set_token(&self, token: Option<String>) {
        self.with_connection(|c| c.set_token(token));
    }

    // ========== 生命周期 ==========

    /// 进入后台
    pub fn pause(&self) {
        self.with_connection(|c| c.pause());
    }

    /// 回到前台
    pub fn resume(&self) {
        self.with_connection(|c| c.resume());
    }

    /// 页面卸载：停止订阅并关闭连接
    pub fn unload(&self) {
        info!("📴 页面卸载，停止实时同步");
        self.with_connection(|c| c.stop());
    }

    /// 停止订阅并结束驱动任务；之后的会话与写入请求返回 `ShuttingDown`
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.unload();
        if let Some(driver) = self.driver.lock().take() {
            driver.abort();
        }
        self.event_manager.clear_listeners();
        info!("✅ 同步控制器已关闭");
    }

    // ========== 状态修改 ==========

    /// 修改班级状态（乐观更新）
    ///
    /// 仅教师/管理员可修改；会话未加载时不做权限判断。
    pub async fn update_status(
        &self,
        class_id: ClassId,
        status: ClassStatus,
    ) -> Result<WriteOutcome> {
        self.ensure_running()?;
        let permitted = self
            .user
            .read()
            .as_ref()
            .map(UserInfo::is_teacher)
            .unwrap_or(true);
        if !permitted {
            return Err(SyncError::PermissionDenied("仅教师可以修改班级状态".to_string()));
        }
        self.coordinator.apply(class_id, status).await
    }

    /// 从服务端拉取单个班级并覆盖本地状态
    pub async fn reload_class(&self, class_id: ClassId) -> Result<ClassInfo> {
        self.ensure_running()?;
        let class = self.api.fetch_class(class_id).await?;
        if self.coordinator.pending(class_id).is_some() {
            // 在途写入结算前保留本地乐观值
            self.coordinator.rebase(class_id, class.status);
        } else if self.store.set_status(class_id, class.status).is_none() {
            debug!("班级不在本地列表中，仅返回详情: class_id={}", class_id);
        }
        Ok(class)
    }

    // ========== 查询 ==========

    pub fn classes(&self) -> Vec<ClassInfo> {
        self.store.snapshot()
    }

    pub fn class(&self, class_id: ClassId) -> Option<ClassInfo> {
        self.store.get(class_id)
    }

    pub fn store(&self) -> Arc<ClassListStore> {
        self.store.clone()
    }

    pub fn current_user(&self) -> Option<UserInfo> {
        self.user.read().clone()
    }

    pub fn is_realtime_enabled(&self) -> bool {
        self.connection.is_some()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
            .as_ref()
            .map(|c| c.lock().state())
            .unwrap_or(ConnectionState::Idle)
    }

    pub fn connection_stats(&self) -> Option<ConnectionStats> {
        self.connection.as_ref().map(|c| c.lock().stats().clone())
    }

    pub fn topic(&self) -> Option<Topic> {
        self.connection.as_ref().and_then(|c| c.lock().topic())
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_manager.subscribe()
    }

    pub fn event_manager(&self) -> Arc<EventManager> {
        self.event_manager.clone()
    }
}

impl Drop for SyncController {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.get_mut().take() {
            driver.abort();
        }
    }
}

impl std::fmt::Debug for SyncController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncController")
            .field("realtime", &self.is_realtime_enabled())
            .field("classes", &self.store.len())
            .finish()
    }
}

#[async_trait::async_trait]
impl LifecycleHook for SyncController {
    async fn on_background(&self) -> Result<()> {
        self.pause();
        Ok(())
    }

    async fn on_foreground(&self) -> Result<()> {
        self.resume();
        Ok(())
    }

    async fn on_unload(&self) -> Result<()> {
        self.unload();
        Ok(())
    }
}

/// 驱动任务：串行消费连接回调与定时器事件
async fn run_driver(
    mut rx: DriverReceiver,
    connection: Weak<Mutex<ConnectionManager>>,
    store: Arc<ClassListStore>,
    reconciler: MessageReconciler,
    event_manager: Arc<EventManager>,
) {
    debug!("🚀 推送驱动任务已启动");
    while let Some(event) = rx.recv().await {
        let Some(connection) = connection.upgrade() else {
            break;
        };

        let (frame, topic, events) = {
            let mut manager = connection.lock();
            let frame = manager.handle_event(event);
            (frame, manager.topic(), manager.take_events())
        };
        for event in events {
            event_manager.emit(event);
        }

        if let Some(frame) = frame {
            let school_id = topic.and_then(|t| t.school_id());
            match reconciler.apply(&frame, school_id, store.as_ref()) {
                Ok(_) | Err(DropReason::UnknownClass(_)) => {}
                Err(_) => connection.lock().stats_mut().frames_dropped += 1,
            }
        }
    }
    debug!("推送驱动任务已退出");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::test_helpers::MockClassApi;
    use crate::lifecycle::LifecycleManager;
    use crate::models::RoleInfo;
    use crate::network::test_helpers::{ManualTimer, RecordingSocketFactory};
    use crate::network::CloseReason;
    use crate::store::test_helpers::class;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn teacher() -> UserInfo {
        UserInfo {
            id: 1,
            username: "wang".to_string(),
            school_id: None,
            class_infos: vec![class(1, ClassStatus::Dismissed), class(2, ClassStatus::InClass)],
            role_infos: vec![RoleInfo {
                role_id: 2,
                role_name: "teacher".to_string(),
            }],
        }
    }

    struct Harness {
        controller: Arc<SyncController>,
        api: Arc<MockClassApi>,
        factory: Arc<RecordingSocketFactory>,
        timer: Arc<ManualTimer>,
    }

    fn harness_with(config: SyncConfig, user: UserInfo) -> Harness {
        let api = Arc::new(MockClassApi::with_user(user));
        let factory = RecordingSocketFactory::new();
        let timer = ManualTimer::new();
        let controller =
            SyncController::with_transport(config, api.clone(), factory.clone(), timer.clone())
                .unwrap();
        Harness {
            controller,
            api,
            factory,
            timer,
        }
    }

    fn harness() -> Harness {
        harness_with(
            SyncConfig::builder()
                .api_base_url("https://school.bytefuse.cn")
                .token("tok")
                .build(),
            teacher(),
        )
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn test_session_push_updates_only_target_class() {
        let h = harness();
        h.controller.load_session().await.unwrap();

        assert_eq!(h.factory.open_count(), 1);
        assert_eq!(h.factory.last().request.url, "wss://school.bytefuse.cn/ws/school/42");

        let socket = h.factory.last();
        socket.callbacks.on_open();
        wait_until(|| h.controller.connection_state() == ConnectionState::Open).await;

        socket.callbacks.on_message(
            r#"{"event_type":"CLASS_STATUS_UPDATE","data":{"id":2,"status":2}}"#.to_string(),
        );
        wait_until(|| {
            h.controller.class(2).map(|c| c.status) == Some(ClassStatus::Dismissing)
        })
        .await;

        let statuses: Vec<_> = h.controller.classes().iter().map(|c| (c.id, c.status)).collect();
        assert_eq!(
            statuses,
            vec![(1, ClassStatus::Dismissed), (2, ClassStatus::Dismissing)]
        );
    }

    #[tokio::test]
    async fn test_malformed_and_foreign_frames_are_counted() {
        let h = harness();
        h.controller.load_session().await.unwrap();
        let socket = h.factory.last();
        socket.callbacks.on_open();
        wait_until(|| h.controller.connection_state() == ConnectionState::Open).await;

        let before = h.controller.classes();
        socket.callbacks.on_message("garbage".to_string());
        socket
            .callbacks
            .on_message(r#"{"school_id":7,"class_id":1,"new_status":1}"#.to_string());
        socket
            .callbacks
            .on_message(r#"{"school_id":42,"class_id":99,"new_status":1}"#.to_string());

        wait_until(|| {
            h.controller
                .connection_stats()
                .map(|s| s.frames_received == 3)
                .unwrap_or(false)
        })
        .await;
        let stats = h.controller.connection_stats().unwrap();
        assert_eq!(stats.frames_dropped, 2);
        assert_eq!(h.controller.classes(), before);
        assert_eq!(h.controller.connection_state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_reconnect_after_drop() {
        let h = harness();
        h.controller.load_session().await.unwrap();
        let socket = h.factory.last();
        socket
            .callbacks
            .on_close(CloseReason::Dropped("network lost".to_string()));

        wait_until(|| {
            h.controller.connection_state() == ConnectionState::Reconnecting { attempt: 1 }
        })
        .await;
        assert_eq!(h.timer.last().delay, Duration::from_secs(2));

        h.timer.last().fire();
        wait_until(|| h.factory.open_count() == 2).await;
        assert_eq!(h.controller.connection_state(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn test_lifecycle_hooks_drive_connection() {
        let h = harness();
        let mut lifecycle = LifecycleManager::new();
        lifecycle.register_hook(h.controller.clone());

        h.controller.load_session().await.unwrap();
        h.factory
            .last()
            .callbacks
            .on_error("reset".to_string());
        wait_until(|| h.timer.pending_count() == 1).await;

        lifecycle.notify_background().await.unwrap();
        assert!(h.timer.last().is_cancelled());

        lifecycle.notify_foreground().await.unwrap();
        assert_eq!(h.factory.open_count(), 2);
        assert_eq!(h.controller.connection_state(), ConnectionState::Connecting);

        lifecycle.notify_unload().await.unwrap();
        assert_eq!(h.controller.connection_state(), ConnectionState::Closed);
        assert_eq!(h.factory.live_count(), 0);
    }

    #[tokio::test]
    async fn test_update_status_rolls_back_on_failure() {
        let h = harness();
        h.controller.load_session().await.unwrap();
        let mut events = h.controller.subscribe_events();
        h.api.push_result(Err(SyncError::Http {
            status: Some(500),
            message: "boom".to_string(),
        }));

        let outcome = h
            .controller
            .update_status(1, ClassStatus::InClass)
            .await
            .unwrap();
        assert!(matches!(outcome, WriteOutcome::RolledBack(_)));
        assert_eq!(h.controller.class(1).unwrap().status, ClassStatus::Dismissed);

        let mut failures = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, SyncEvent::StatusWriteFailed { .. }) {
                failures += 1;
            }
        }
        assert_eq!(failures, 1);
    }

    #[tokio::test]
    async fn test_non_teacher_cannot_update() {
        let mut user = teacher();
        user.role_infos.clear();
        let h = harness_with(SyncConfig::default(), user);
        h.controller.load_session().await.unwrap();

        let err = h
            .controller
            .update_status(1, ClassStatus::InClass)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::PermissionDenied(_)));
        assert_eq!(h.api.write_count(), 0);
    }

    #[tokio::test]
    async fn test_without_base_url_degrades_gracefully() {
        let h = harness_with(
            SyncConfig::builder().without_api_base_url().build(),
            teacher(),
        );
        h.controller.load_session().await.unwrap();

        assert!(!h.controller.is_realtime_enabled());
        assert_eq!(h.factory.open_count(), 0);
        assert_eq!(h.controller.classes().len(), 2);
        assert_eq!(h.controller.connection_state(), ConnectionState::Idle);

        let outcome = h
            .controller
            .update_status(2, ClassStatus::Dismissing)
            .await
            .unwrap();
        assert!(outcome.is_committed());
        h.controller.pause();
        h.controller.resume();
        h.controller.unload();
    }

    #[tokio::test]
    async fn test_user_without_school_does_not_subscribe() {
        let mut user = teacher();
        for class in &mut user.class_infos {
            class.school_id = None;
        }
        let h = harness_with(SyncConfig::default(), user);
        h.controller.load_session().await.unwrap();

        assert_eq!(h.factory.open_count(), 0);
        assert_eq!(h.controller.topic(), None);
        assert_eq!(h.controller.classes().len(), 2);
    }

    #[tokio::test]
    async fn test_repeated_session_keeps_single_connection() {
        let h = harness();
        h.controller.load_session().await.unwrap();
        h.controller.refresh().await.unwrap();
        assert_eq!(h.factory.open_count(), 1);
    }

    #[tokio::test]
    async fn test_class_topic_follows_focus() {
        let h = harness_with(
            SyncConfig::builder().topic_kind(TopicKind::Class).build(),
            teacher(),
        );
        h.controller.load_session().await.unwrap();
        assert_eq!(h.factory.last().request.url, "wss://school.bytefuse.cn/ws/class/1");

        h.controller.focus_class(Some(2));
        assert_eq!(h.factory.open_count(), 2);
        assert_eq!(h.factory.last().request.url, "wss://school.bytefuse.cn/ws/class/2");
        assert_eq!(h.factory.live_count(), 1);
    }

    #[tokio::test]
    async fn test_session_load_failure_propagates() {
        let api = Arc::new(MockClassApi::default());
        let controller = SyncController::with_transport(
            SyncConfig::default(),
            api,
            RecordingSocketFactory::new(),
            ManualTimer::new(),
        )
        .unwrap();
        let err = controller.load_session().await.unwrap_err();
        assert!(err.is_auth_failure());
        assert!(controller.classes().is_empty());
    }

    #[tokio::test]
    async fn test_reload_class_overwrites_status() {
        let h = harness();
        h.controller.load_session().await.unwrap();
        h.api.user.lock().as_mut().unwrap().class_infos[0].status = ClassStatus::InClass;

        let class = h.controller.reload_class(1).await.unwrap();
        assert_eq!(class.status, ClassStatus::InClass);
        assert_eq!(h.controller.class(1).unwrap().status, ClassStatus::InClass);
    }

    #[tokio::test]
    async fn test_refresh_during_write_keeps_optimistic_value() {
        let h = harness();
        h.controller.load_session().await.unwrap();
        h.api.user.lock().as_mut().unwrap().class_infos[1].status = ClassStatus::Dismissing;

        let gate = h.api.gate_next_write();
        let controller = h.controller.clone();
        let write =
            tokio::spawn(async move { controller.update_status(1, ClassStatus::InClass).await });
        wait_until(|| h.api.write_count() == 1).await;

        // 服务端数据尚未包含本次写入
        h.controller.refresh().await.unwrap();
        assert_eq!(h.controller.class(1).unwrap().status, ClassStatus::InClass);
        assert_eq!(h.controller.class(2).unwrap().status, ClassStatus::Dismissing);

        gate.send(Ok(())).unwrap();
        assert!(write.await.unwrap().unwrap().is_committed());
        assert_eq!(h.controller.class(1).unwrap().status, ClassStatus::InClass);
    }

    #[tokio::test]
    async fn test_refresh_during_failed_write_rolls_back_to_server_value() {
        let h = harness();
        h.controller.load_session().await.unwrap();

        let gate = h.api.gate_next_write();
        let controller = h.controller.clone();
        let write =
            tokio::spawn(async move { controller.update_status(1, ClassStatus::InClass).await });
        wait_until(|| h.api.write_count() == 1).await;

        h.api.user.lock().as_mut().unwrap().class_infos[0].status = ClassStatus::Dismissing;
        h.controller.refresh().await.unwrap();

        gate.send(Err(SyncError::Http {
            status: Some(500),
            message: "boom".to_string(),
        }))
        .unwrap();
        let outcome = write.await.unwrap().unwrap();
        assert!(matches!(outcome, WriteOutcome::RolledBack(_)));
        assert_eq!(h.controller.class(1).unwrap().status, ClassStatus::Dismissing);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_later_requests() {
        let h = harness();
        h.controller.load_session().await.unwrap();
        h.controller.event_manager().add_listener("*", |_| {});

        h.controller.shutdown().await;
        assert_eq!(h.controller.connection_state(), ConnectionState::Closed);
        assert_eq!(h.controller.event_manager().get_stats().listener_count, 0);

        let err = h
            .controller
            .update_status(1, ClassStatus::InClass)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ShuttingDown(_)));
        assert!(matches!(
            h.controller.load_session().await,
            Err(SyncError::ShuttingDown(_))
        ));
        assert_eq!(h.api.write_count(), 0);
    }
}
