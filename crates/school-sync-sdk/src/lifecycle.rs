//! 生命周期管理
//!
//! 管理页面/App 前后台切换与卸载等一级生命周期事件，统一触发各模块的状态切换。

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// 生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Background,
    Foreground,
    Unload,
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecyclePhase::Background => write!(f, "后台"),
            LifecyclePhase::Foreground => write!(f, "前台"),
            LifecyclePhase::Unload => write!(f, "卸载"),
        }
    }
}

/// 生命周期回调 Hook
///
/// 各模块通过实现此 trait 来响应生命周期变化
#[async_trait]
pub trait LifecycleHook: Send + Sync {
    /// 切换到后台时调用
    async fn on_background(&self) -> Result<()>;

    /// 切换到前台时调用
    async fn on_foreground(&self) -> Result<()>;

    /// 页面卸载时调用
    async fn on_unload(&self) -> Result<()> {
        Ok(())
    }
}

/// 生命周期管理器
pub struct LifecycleManager {
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// 注册生命周期回调 Hook
    pub fn register_hook(&mut self, hook: Arc<dyn LifecycleHook>) {
        self.hooks.push(hook);
        info!("✅ 生命周期 Hook 已注册: 当前共 {} 个", self.hooks.len());
    }

    pub async fn notify_background(&self) -> Result<()> {
        self.notify(LifecyclePhase::Background).await
    }

    pub async fn notify_foreground(&self) -> Result<()> {
        self.notify(LifecyclePhase::Foreground).await
    }

    pub async fn notify_unload(&self) -> Result<()> {
        self.notify(LifecyclePhase::Unload).await
    }

    /// 按注册顺序通知所有 Hook
    ///
    /// 某个 Hook 失败时记录错误并继续执行其余 Hook，最后返回第一个错误。
    pub async fn notify(&self, phase: LifecyclePhase) -> Result<()> {
        info!("🔄 通知所有模块：切换到{}", phase);

        let mut first_error = None;
        let mut failed = 0usize;

        for (index, hook) in self.hooks.iter().enumerate() {
            let result = match phase {
                LifecyclePhase::Background => hook.on_background().await,
                LifecyclePhase::Foreground => hook.on_foreground().await,
                LifecyclePhase::Unload => hook.on_unload().await,
            };
            if let Err(e) = result {
                warn!("⚠️ Hook #{} {}切换失败: {}", index, phase, e);
                failed += 1;
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => {
                warn!("⚠️ {} 个模块{}切换失败，但所有模块都已尝试执行", failed, phase);
                Err(e)
            }
            None => {
                info!("✅ 所有模块{}切换完成", phase);
                Ok(())
            }
        }
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use parking_lot::Mutex;

    struct RecordingHook {
        name: &'static str,
        fail_background: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl LifecycleHook for RecordingHook {
        async fn on_background(&self) -> Result<()> {
            self.log.lock().push(format!("{}:bg", self.name));
            if self.fail_background {
                return Err(SyncError::ShuttingDown("hook failed".to_string()));
            }
            Ok(())
        }

        async fn on_foreground(&self) -> Result<()> {
            self.log.lock().push(format!("{}:fg", self.name));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_all_hooks_run_even_if_one_fails() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = LifecycleManager::new();
        manager.register_hook(Arc::new(RecordingHook {
            name: "a",
            fail_background: true,
            log: log.clone(),
        }));
        manager.register_hook(Arc::new(RecordingHook {
            name: "b",
            fail_background: false,
            log: log.clone(),
        }));

        assert!(matches!(
            manager.notify_background().await,
            Err(SyncError::ShuttingDown(_))
        ));
        manager.notify_foreground().await.unwrap();
        manager.notify_unload().await.unwrap();

        assert_eq!(*log.lock(), vec!["a:bg", "b:bg", "a:fg", "b:fg"]);
        assert_eq!(manager.hook_count(), 2);
    }
}
