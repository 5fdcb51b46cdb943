//! WebSocket 推送连接（tokio-tungstenite）
//!
//! 每条连接一个后台任务：建连 → 读循环 → 关闭。所有结果通过 [`SocketCallbacks`] 汇报。

use futures_util::{SinkExt, StreamExt};
use tokio::sync::oneshot;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{CloseReason, ConnectRequest, SocketCallbacks, SocketFactory, SocketHandle};
use crate::error::{Result, SyncError};

/// 基于 tokio-tungstenite 的连接工厂
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketFactory;

impl WebSocketFactory {
    pub fn new() -> Self {
        Self
    }
}

struct WebSocketHandle {
    close_tx: Option<oneshot::Sender<String>>,
}

impl SocketHandle for WebSocketHandle {
    fn close(&mut self, reason: &str) {
        if let Some(tx) = self.close_tx.take() {
            // 任务已结束时发送失败，无需处理
            let _ = tx.send(reason.to_string());
        }
    }
}

impl SocketFactory for WebSocketFactory {
    fn open(&self, request: ConnectRequest, callbacks: SocketCallbacks) -> Box<dyn SocketHandle> {
        let (close_tx, close_rx) = oneshot::channel();
        tokio::spawn(run_connection(request, callbacks, close_rx));
        Box::new(WebSocketHandle {
            close_tx: Some(close_tx),
        })
    }
}

fn build_request(request: &ConnectRequest) -> Result<Request> {
    let mut ws_request = request
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| SyncError::WebSocket(format!("构建握手请求失败: {}", e)))?;

    for (name, value) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| SyncError::WebSocket(format!("非法请求头 {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| SyncError::WebSocket(format!("非法请求头取值: {}", e)))?;
        ws_request.headers_mut().insert(name, value);
    }

    Ok(ws_request)
}

fn manual_reason(received: std::result::Result<String, oneshot::error::RecvError>) -> String {
    // 句柄被丢弃等同于主动关闭
    received.unwrap_or_else(|_| "handle dropped".to_string())
}

async fn run_connection(
    request: ConnectRequest,
    callbacks: SocketCallbacks,
    mut close_rx: oneshot::Receiver<String>,
) {
    let conn_id = callbacks.conn_id();
    let ws_request = match build_request(&request) {
        Ok(r) => r,
        Err(e) => {
            warn!("❌ 推送连接请求无效: conn_id={}, {}", conn_id, e);
            callbacks.on_error(e.to_string());
            callbacks.on_close(CloseReason::Dropped(e.to_string()));
            return;
        }
    };

    debug!("🔌 开始建立推送连接: conn_id={}, url={}", conn_id, request.url);

    let connect = tokio::time::timeout(request.connect_timeout, connect_async(ws_request));
    let ws_stream = tokio::select! {
        received = &mut close_rx => {
            debug!("建连过程中收到关闭请求: conn_id={}", conn_id);
            callbacks.on_close(CloseReason::Manual(manual_reason(received)));
            return;
        }
        result = connect => match result {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                let cause = SyncError::from(e).to_string();
                warn!("❌ 推送连接失败: conn_id={}, {}", conn_id, cause);
                callbacks.on_error(cause.clone());
                callbacks.on_close(CloseReason::Dropped(cause));
                return;
            }
            Err(_) => {
                let cause = format!("建连超时({:?})", request.connect_timeout);
                warn!("⏱️ 推送连接超时: conn_id={}", conn_id);
                callbacks.on_error(cause.clone());
                callbacks.on_close(CloseReason::Dropped(cause));
                return;
            }
        }
    };

    info!("✅ 推送连接已建立: conn_id={}", conn_id);
    callbacks.on_open();

    let (mut sink, mut stream) = ws_stream.split();
    loop {
        tokio::select! {
            received = &mut close_rx => {
                let reason = manual_reason(received);
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: reason.clone().into(),
                };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    debug!("发送关闭帧失败: conn_id={}, {}", conn_id, e);
                }
                let _ = sink.close().await;
                callbacks.on_close(CloseReason::Manual(reason));
                return;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => callbacks.on_message(text.to_string()),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => callbacks.on_message(text),
                    Err(_) => debug!("忽略非 UTF-8 二进制帧: conn_id={}", conn_id),
                },
                Some(Ok(Message::Ping(payload))) => {
                    let _ = sink.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(f) => (Some(u16::from(f.code)), f.reason.to_string()),
                        None => (None, String::new()),
                    };
                    info!("🔌 服务端关闭推送连接: conn_id={}, code={:?}", conn_id, code);
                    callbacks.on_close(CloseReason::Remote { code, reason });
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let cause = e.to_string();
                    warn!("⚠️ 推送连接异常: conn_id={}, {}", conn_id, cause);
                    callbacks.on_error(cause.clone());
                    callbacks.on_close(CloseReason::Dropped(cause));
                    return;
                }
                None => {
                    callbacks.on_close(CloseReason::Dropped("stream ended".to_string()));
                    return;
                }
            }
        }
    }
}
