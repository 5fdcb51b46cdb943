//! 推送连接状态机
//!
//! `ConnectionManager` 独占一条逻辑订阅的生命周期：
//!
//! ```text
//!  Idle ──start──▶ Connecting ──open──▶ Open
//!                     │  ▲                │
//!               error/close│ timer        error/close
//!                     ▼  │                ▼
//!                 Reconnecting{n} ◀───────┘
//!
//!  任意状态 ──stop──▶ Closed
//! ```
//!
//! 所有方法都是同步的；连接回调与定时器到期通过 [`DriverEvent`] 串行送入 [`ConnectionManager::handle_event`]。
//! 过期连接（conn_id 不匹配）与过期定时器（token 不匹配）的事件一律丢弃。
//! 状态变更事件暂存在发件箱中，由调用方在释放锁后统一发布。

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backoff::BackoffScheduler;
use crate::connection_state::{ConnectionState, ConnectionStats};
use crate::events::{event_builders, SyncEvent};
use crate::network::{
    ConnectionId, DriverEvent, DriverSender, PushEndpoint, SocketCallbacks, SocketEvent,
    SocketFactory, SocketHandle, Timer, TimerFire, TimerHandle, TimerToken, Topic,
};

struct LiveSocket {
    conn_id: ConnectionId,
    callbacks: SocketCallbacks,
    handle: Box<dyn SocketHandle>,
}

impl LiveSocket {
    fn close(mut self, reason: &str) {
        // 先静音回调，保证关闭后不再有 open / message 投递
        self.callbacks.request_close();
        self.handle.close(reason);
    }
}

struct PendingTimer {
    token: TimerToken,
    handle: Box<dyn TimerHandle>,
}

/// 推送连接管理器
pub struct ConnectionManager {
    factory: Arc<dyn SocketFactory>,
    timer: Arc<dyn Timer>,
    backoff: BackoffScheduler,
    endpoint: PushEndpoint,
    driver_tx: DriverSender,

    state: ConnectionState,
    topic: Option<Topic>,
    /// 连续失败次数（成功建连后清零）
    attempt: u32,
    /// 应用处于后台
    paused: bool,
    live: Option<LiveSocket>,
    pending_timer: Option<PendingTimer>,
    next_conn_id: ConnectionId,
    next_timer_token: TimerToken,
    stats: ConnectionStats,
    outbox: Vec<SyncEvent>,
}

impl ConnectionManager {
    pub fn new(
        endpoint: PushEndpoint,
        factory: Arc<dyn SocketFactory>,
        timer: Arc<dyn Timer>,
        backoff: BackoffScheduler,
        driver_tx: DriverSender,
    ) -> Self {
        Self {
            factory,
            timer,
            backoff,
            endpoint,
            driver_tx,
            state: ConnectionState::Idle,
            topic: None,
            attempt: 0,
            paused: false,
            live: None,
            pending_timer: None,
            next_conn_id: 0,
            next_timer_token: 0,
            stats: ConnectionStats::default(),
            outbox: Vec::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn topic(&self) -> Option<Topic> {
        self.topic
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn has_pending_timer(&self) -> bool {
        self.pending_timer.is_some()
    }

    /// 当前物理连接编号
    pub fn live_connection(&self) -> Option<ConnectionId> {
        self.live.as_ref().map(|l| l.conn_id)
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut ConnectionStats {
        &mut self.stats
    }

    /// 更新鉴权 token（下一次建连生效）
    pub fn set_token(&mut self, token: Option<String>) {
        self.endpoint.set_token(token);
    }

    /// 取出待发布的事件
    pub fn take_events(&mut self) -> Vec<SyncEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// 订阅主题
    ///
    /// 同一主题已在连接/已连接/等待重连时为空操作；切换主题会先关闭旧连接。
    /// 后台期间只记录主题，回到前台再连接。
    pub fn start(&mut self, topic: Topic) {
        if self.topic == Some(topic) {
            let active = self.state.is_live()
                || matches!(self.state, ConnectionState::Reconnecting { .. });
            if active || (self.paused && self.state == ConnectionState::Idle) {
                debug!("订阅主题未变化，忽略 start: topic={}, state={}", topic, self.state);
                return;
            }
        }

        self.teardown("topic changed");
        info!("📡 订阅推送主题: {}", topic);
        self.topic = Some(topic);
        self.attempt = 0;

        if self.paused {
            info!("应用处于后台，推迟建连: topic={}", topic);
            self.set_state(ConnectionState::Idle);
            return;
        }
        self.connect();
    }

    /// 停止订阅：取消定时器、关闭连接，进入 Closed
    pub fn stop(&mut self) {
        if self.state == ConnectionState::Closed
            && self.live.is_none()
            && self.pending_timer.is_none()
        {
            return;
        }
        self.teardown("stopped");
        self.attempt = 0;
        info!("⏹️ 推送订阅已停止");
        self.set_state(ConnectionState::Closed);
    }

    /// 应用进入后台：取消待重连定时器并禁止新建连接，已打开的连接保持
    pub fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        if self.cancel_timer() {
            debug!("后台暂停，已取消重连定时器");
        }
        info!("⏸️ 推送通道进入后台: state={}", self.state);
    }

    /// 应用回到前台：若仍需订阅且没有活动连接，立即建连（不等待退避）
    ///
    /// 返回是否发起了新连接。
    pub fn resume(&mut self) -> bool {
        if !self.paused {
            return false;
        }
        self.paused = false;
        info!("▶️ 推送通道回到前台: state={}", self.state);

        let wants_connection = self.topic.is_some()
            && matches!(
                self.state,
                ConnectionState::Idle | ConnectionState::Reconnecting { .. }
            );
        if wants_connection && self.live.is_none() {
            self.cancel_timer();
            self.connect();
            return true;
        }
        false
    }

    /// 处理一个驱动事件；收到有效推送帧时返回帧内容
    pub fn handle_event(&mut self, event: DriverEvent) -> Option<String> {
        match event {
            DriverEvent::Socket { conn_id, event } => self.handle_socket_event(conn_id, event),
            DriverEvent::TimerFired { token } => {
                self.handle_timer(token);
                None
            }
        }
    }

    fn handle_socket_event(&mut self, conn_id: ConnectionId, event: SocketEvent) -> Option<String> {
        if self.live_connection() != Some(conn_id) {
            debug!("忽略过期连接事件: conn_id={}, event={:?}", conn_id, event);
            return None;
        }

        match event {
            SocketEvent::Opened => {
                if self.state == ConnectionState::Connecting {
                    self.attempt = 0;
                    self.stats.mark_open();
                    self.set_state(ConnectionState::Open);
                }
                None
            }
            SocketEvent::Message(frame) => {
                if self.state != ConnectionState::Open {
                    debug!("连接未就绪，丢弃帧: conn_id={}", conn_id);
                    return None;
                }
                self.stats.mark_frame();
                Some(frame)
            }
            SocketEvent::Error(cause) => {
                warn!("⚠️ 推送连接错误: conn_id={}, {}", conn_id, cause);
                self.on_transport_failure();
                None
            }
            SocketEvent::Closed(reason) => {
                if reason.is_expected() {
                    // 由本端关闭但尚未从 live 移除的连接（理论上不会出现）
                    self.live = None;
                    self.stats.mark_disconnected();
                } else {
                    warn!("🔌 推送连接断开: conn_id={}, reason={:?}", conn_id, reason);
                    self.on_transport_failure();
                }
                None
            }
        }
    }

    fn handle_timer(&mut self, token: TimerToken) {
        match &self.pending_timer {
            Some(pending) if pending.token == token => {
                self.pending_timer = None;
            }
            _ => {
                debug!("忽略过期定时器: token={}", token);
                return;
            }
        }

        if self.paused || self.topic.is_none() {
            return;
        }
        if let ConnectionState::Reconnecting { attempt } = self.state {
            info!("🔄 开始第 {} 次重连", attempt);
            self.connect();
        }
    }

    /// 连接失败或断开：退役当前连接，进入 Reconnecting 并安排唯一的重连定时器
    fn on_transport_failure(&mut self) {
        if let Some(live) = self.live.take() {
            live.close("retired");
        }
        self.stats.mark_disconnected();

        self.attempt = self.attempt.saturating_add(1);
        self.set_state(ConnectionState::Reconnecting {
            attempt: self.attempt,
        });
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if self.paused {
            debug!("后台期间不安排重连: attempt={}", self.attempt);
            return;
        }
        if self.pending_timer.is_some() {
            debug!("已存在重连定时器，跳过");
            return;
        }

        let delay = self.backoff.delay(self.attempt);
        self.next_timer_token += 1;
        let token = self.next_timer_token;
        let handle = self
            .timer
            .schedule(delay, TimerFire::new(token, self.driver_tx.clone()));
        self.pending_timer = Some(PendingTimer { token, handle });
        self.stats.reconnects_scheduled += 1;
        info!("⏳ {:?} 后重连 (第 {} 次)", delay, self.attempt);
    }

    fn connect(&mut self) {
        let Some(topic) = self.topic else {
            return;
        };

        self.next_conn_id += 1;
        let conn_id = self.next_conn_id;
        let request = self.endpoint.request(&topic);
        debug!("🔌 建立推送连接: conn_id={}, url={}", conn_id, request.url);

        let callbacks = SocketCallbacks::new(conn_id, self.driver_tx.clone());
        let handle = self.factory.open(request, callbacks.clone());
        self.live = Some(LiveSocket {
            conn_id,
            callbacks,
            handle,
        });
        self.set_state(ConnectionState::Connecting);
    }

    fn cancel_timer(&mut self) -> bool {
        match self.pending_timer.take() {
            Some(mut pending) => {
                pending.handle.cancel();
                true
            }
            None => false,
        }
    }

    fn teardown(&mut self, reason: &str) {
        self.cancel_timer();
        if let Some(live) = self.live.take() {
            debug!("关闭推送连接: conn_id={}, reason={}", live.conn_id, reason);
            live.close(reason);
            self.stats.mark_disconnected();
        }
    }

    fn set_state(&mut self, new_state: ConnectionState) {
        if self.state == new_state {
            return;
        }
        let old_state = self.state;
        self.state = new_state;
        debug!("连接状态: {} -> {}", old_state, new_state);
        self.outbox
            .push(event_builders::connection_state_changed(old_state, new_state));
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.teardown("manager dropped");
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state)
            .field("topic", &self.topic)
            .field("attempt", &self.attempt)
            .field("paused", &self.paused)
            .field("live", &self.live_connection())
            .field("pending_timer", &self.pending_timer.as_ref().map(|t| t.token))
            .finish()
    }
}
