//! 推送通道传输层
//!
//! - [`SocketFactory`] / [`SocketHandle`]：一条物理连接的打开与关闭
//! - [`SocketCallbacks`]：连接生命周期回调（onOpen / onMessage / onError / onClose）
//! - [`Timer`]：重连退避定时器
//!
//! 所有回调与定时器触发都汇入同一个 [`DriverEvent`] 通道，由同步驱动任务串行消费。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

pub mod endpoint;
pub mod timer;
pub mod websocket;

pub use endpoint::{PushEndpoint, Topic};
pub use timer::TokioTimer;
pub use websocket::WebSocketFactory;

/// 物理连接编号（每次打开递增）
pub type ConnectionId = u64;
/// 定时器编号（每次安排递增）
pub type TimerToken = u64;

/// 连接关闭原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// 本端主动关闭（stop / 切换订阅 / 页面卸载）
    Manual(String),
    /// 服务端发送了关闭帧
    Remote { code: Option<u16>, reason: String },
    /// 连接异常中断
    Dropped(String),
}

impl CloseReason {
    /// 是否为本端预期内的关闭
    pub fn is_expected(&self) -> bool {
        matches!(self, CloseReason::Manual(_))
    }
}

/// 单条连接上的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Opened,
    Message(String),
    Error(String),
    Closed(CloseReason),
}

/// 驱动任务消费的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    Socket {
        conn_id: ConnectionId,
        event: SocketEvent,
    },
    TimerFired {
        token: TimerToken,
    },
}

pub type DriverSender = mpsc::UnboundedSender<DriverEvent>;
pub type DriverReceiver = mpsc::UnboundedReceiver<DriverEvent>;

/// 建连请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub connect_timeout: Duration,
}

/// 连接回调
///
/// 保证：
/// - `on_open` 至多一次
/// - `request_close` 之后不再投递 `on_open` / `on_message` / `on_error`
/// - `on_close` 恰好一次（即使连接仍在建立中就被关闭）
#[derive(Debug, Clone)]
pub struct SocketCallbacks {
    conn_id: ConnectionId,
    tx: DriverSender,
    closing: Arc<AtomicBool>,
    opened: Arc<AtomicBool>,
    errored: Arc<AtomicBool>,
    close_reported: Arc<AtomicBool>,
}

impl SocketCallbacks {
    pub fn new(conn_id: ConnectionId, tx: DriverSender) -> Self {
        Self {
            conn_id,
            tx,
            closing: Arc::new(AtomicBool::new(false)),
            opened: Arc::new(AtomicBool::new(false)),
            errored: Arc::new(AtomicBool::new(false)),
            close_reported: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    fn deliver(&self, event: SocketEvent) {
        // 驱动任务已退出时丢弃即可
        if self
            .tx
            .send(DriverEvent::Socket {
                conn_id: self.conn_id,
                event,
            })
            .is_err()
        {
            debug!("驱动任务已退出，丢弃连接事件: conn_id={}", self.conn_id);
        }
    }

    fn is_silenced(&self) -> bool {
        self.closing.load(Ordering::SeqCst) || self.close_reported.load(Ordering::SeqCst)
    }

    pub fn on_open(&self) {
        if self.is_silenced() || self.opened.swap(true, Ordering::SeqCst) {
            return;
        }
        self.deliver(SocketEvent::Opened);
    }

    pub fn on_message(&self, frame: String) {
        if self.is_silenced() {
            return;
        }
        self.deliver(SocketEvent::Message(frame));
    }

    pub fn on_error(&self, cause: String) {
        if self.is_silenced() || self.errored.swap(true, Ordering::SeqCst) {
            return;
        }
        self.deliver(SocketEvent::Error(cause));
    }

    pub fn on_close(&self, reason: CloseReason) {
        if self.close_reported.swap(true, Ordering::SeqCst) {
            return;
        }
        self.deliver(SocketEvent::Closed(reason));
    }

    /// 标记为主动关闭；返回之前是否已标记
    pub fn request_close(&self) -> bool {
        self.closing.swap(true, Ordering::SeqCst)
    }
}

/// 已打开的连接句柄
pub trait SocketHandle: Send {
    /// 请求优雅关闭；连接最终会以 `on_close(Manual)` 确认
    fn close(&mut self, reason: &str);
}

/// 连接工厂（可注入，便于测试）
pub trait SocketFactory: Send + Sync {
    /// 发起连接，不阻塞；就绪与否通过回调异步通知
    fn open(&self, request: ConnectRequest, callbacks: SocketCallbacks) -> Box<dyn SocketHandle>;
}

/// 定时器到期时的投递器
#[derive(Debug)]
pub struct TimerFire {
    token: TimerToken,
    tx: DriverSender,
}

impl TimerFire {
    pub fn new(token: TimerToken, tx: DriverSender) -> Self {
        Self { token, tx }
    }

    pub fn token(&self) -> TimerToken {
        self.token
    }

    pub fn fire(self) {
        let _ = self.tx.send(DriverEvent::TimerFired { token: self.token });
    }
}

/// 已安排的定时器
pub trait TimerHandle: Send {
    fn cancel(&mut self);
}

/// 定时器（可注入，便于测试）
pub trait Timer: Send + Sync {
    fn schedule(&self, delay: Duration, fire: TimerFire) -> Box<dyn TimerHandle>;
}
