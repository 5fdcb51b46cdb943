//! 重连退避调度
//!
//! 纯函数：根据已失败次数计算下一次重连前的等待时间。
//!
//! | attempt | 延迟 |
//! |---------|------|
//! | 0 | 1s |
//! | 1 | 2s |
//! | 2 | 4s |
//! | 3 | 8s |
//! | ≥4 | 15s 封顶 |

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 重连退避配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// 初始重连间隔（毫秒）
    pub base_delay_ms: u64,
    /// 最大重连间隔（毫秒）
    pub max_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000, // 初始 1 秒
            max_delay_ms: 15_000, // 最大 15 秒，移动网络恢复时能更快连上
        }
    }
}

/// 指数退避调度器
///
/// `delay(n) = min(base * 2^n, cap)`，无抖动，对 n 单调不减。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffScheduler {
    base: Duration,
    cap: Duration,
}

impl BackoffScheduler {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_delay_ms),
            cap: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// 计算第 `attempt` 次重连前的等待时间
    pub fn delay(&self, attempt: u32) -> Duration {
        // 2^attempt 超过 u32 位宽后必然超过 cap，直接封顶
        let factor = match 1u32.checked_shl(attempt) {
            Some(f) => f,
            None => return self.cap,
        };
        self.base
            .checked_mul(factor)
            .map(|d| d.min(self.cap))
            .unwrap_or(self.cap)
    }

    pub fn cap(&self) -> Duration {
        self.cap
    }
}

impl Default for BackoffScheduler {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}
