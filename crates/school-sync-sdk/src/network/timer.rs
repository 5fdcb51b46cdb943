//! 基于 tokio 的重连定时器

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

use super::{Timer, TimerFire, TimerHandle};

/// tokio 定时器：到期后向驱动通道投递 `TimerFired`
///
/// 必须在 tokio 运行时内调用 `schedule`。
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioTimer;

impl TokioTimer {
    pub fn new() -> Self {
        Self
    }
}

struct TokioTimerHandle {
    task: Option<JoinHandle<()>>,
}

impl TimerHandle for TokioTimerHandle {
    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TokioTimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl Timer for TokioTimer {
    fn schedule(&self, delay: Duration, fire: TimerFire) -> Box<dyn TimerHandle> {
        trace!("⏱️ 安排定时器: token={}, delay={:?}", fire.token(), delay);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire.fire();
        });
        Box::new(TokioTimerHandle { task: Some(task) })
    }
}
