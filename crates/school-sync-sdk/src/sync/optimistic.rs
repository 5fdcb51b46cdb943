//! 乐观更新协调器
//!
//! 修改班级状态时先改本地列表（界面立即生效），再发起远端写入：
//! - 成功：不再改动本地（推送随后会带来同样的值）
//! - 失败：回滚到最近一次确认的值，并通知一次失败
//!
//! 同一班级可以同时有多次写入在途，按发起顺序串成一条写入链：
//! - 链上最新的写入决定界面显示；较旧的写入失败时不动本地
//! - 最新的写入失败时，若还有较旧的写入在途，先显示它的值，否则回到确认值
//! - 写入期间到达的推送比所有在途写入都「更新」，回滚不会覆盖它

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::events::{event_builders, EventManager, SyncEvent, UpdateSource};
use crate::http_client::ClassApi;
use crate::models::{ClassId, ClassStatus};
use crate::store::StatusStore;

/// 进行中的乐观写入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingWrite {
    pub class_id: ClassId,
    /// 发起时最近一次确认的值
    pub previous: ClassStatus,
    pub new: ClassStatus,
    /// 乐观修改后该班级的版本号
    pub version: u64,
}

/// 写入结算结果
#[derive(Debug)]
pub enum WriteOutcome {
    /// 远端确认成功
    Committed,
    /// 远端失败，本地已回滚
    RolledBack(SyncError),
    /// 远端失败，但本地已有更新的值，保留不动
    Superseded(SyncError),
}

impl WriteOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, WriteOutcome::Committed)
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            WriteOutcome::Committed => None,
            WriteOutcome::RolledBack(e) | WriteOutcome::Superseded(e) => Some(e),
        }
    }
}

/// 单个班级的在途写入链
#[derive(Debug)]
struct WriteChain {
    /// 最近一次确认的值（成功的写入、推送或刷新）
    confirmed: ClassStatus,
    /// `confirmed` 来自哪次写入（按版本比较，避免乱序成功倒退）
    confirmed_version: u64,
    /// 本协调器最后一次写入本地列表后的版本；不一致说明期间有推送
    local_version: u64,
    /// 按发起顺序排列的在途写入
    writes: Vec<PendingWrite>,
}

/// 乐观更新协调器
pub struct OptimisticUpdateCoordinator {
    store: Arc<dyn StatusStore>,
    api: Arc<dyn ClassApi>,
    event_manager: Arc<EventManager>,
    chains: Mutex<HashMap<ClassId, WriteChain>>,
}

impl OptimisticUpdateCoordinator {
    pub fn new(
        store: Arc<dyn StatusStore>,
        api: Arc<dyn ClassApi>,
        event_manager: Arc<EventManager>,
    ) -> Self {
        Self {
            store,
            api,
            event_manager,
            chains: Mutex::new(HashMap::new()),
        }
    }

    /// 该班级最新一次进行中的写入
    pub fn pending(&self, class_id: ClassId) -> Option<PendingWrite> {
        self.chains
            .lock()
            .get(&class_id)
            .and_then(|chain| chain.writes.last().copied())
    }

    /// 有在途写入的班级
    pub fn pending_classes(&self) -> HashSet<ClassId> {
        self.chains.lock().keys().copied().collect()
    }

    /// 进行中的写入总数
    pub fn pending_count(&self) -> usize {
        self.chains.lock().values().map(|c| c.writes.len()).sum()
    }

    /// 服务端数据刷新后更新确认值；没有在途写入时无需处理
    pub fn rebase(&self, class_id: ClassId, confirmed: ClassStatus) {
        if let Some(chain) = self.chains.lock().get_mut(&class_id) {
            debug!("更新确认值: class_id={}, {} -> {}", class_id, chain.confirmed, confirmed);
            chain.confirmed = confirmed;
        }
    }

    /// 乐观修改班级状态
    ///
    /// 班级不在本地列表中时返回 `Err(NotFound)`，不会发起远端写入；
    /// 其余情况总是返回结算结果，失败也在 [`WriteOutcome`] 中体现。
    pub async fn apply(&self, class_id: ClassId, new_status: ClassStatus) -> Result<WriteOutcome> {
        let pending = self.begin(class_id, new_status)?;
        let result = self.api.update_class_status(class_id, new_status).await;
        Ok(self.settle(pending, result))
    }

    fn begin(&self, class_id: ClassId, new_status: ClassStatus) -> Result<PendingWrite> {
        let not_found = || SyncError::NotFound(format!("班级 {}", class_id));
        let mut chains = self.chains.lock();

        // 读取版本与写入之间可能插入推送，版本不符时重读
        let (prior_version, change) = loop {
            let version = self.store.version(class_id).ok_or_else(not_found)?;
            if let Some(change) = self.store.set_status_if_version(class_id, new_status, version) {
                break (version, change);
            }
        };

        let chain = chains.entry(class_id).or_insert_with(|| WriteChain {
            confirmed: change.old_status,
            confirmed_version: 0,
            local_version: prior_version,
            writes: Vec::new(),
        });
        if chain.writes.is_empty() || chain.local_version != prior_version {
            // 本地值不再是未确认的乐观值
            chain.confirmed = change.old_status;
        }
        chain.local_version = change.version;

        let pending = PendingWrite {
            class_id,
            previous: chain.confirmed,
            new: new_status,
            version: change.version,
        };
        chain.writes.push(pending);
        drop(chains);

        debug!(
            "乐观更新: class_id={}, {} -> {}, version={}",
            class_id, change.old_status, new_status, change.version
        );
        if change.old_status != new_status {
            self.event_manager.emit(event_builders::class_status_changed(
                class_id,
                change.old_status,
                new_status,
                UpdateSource::Optimistic,
            ));
        }
        Ok(pending)
    }

    fn settle(&self, pending: PendingWrite, result: Result<()>) -> WriteOutcome {
        let class_id = pending.class_id;
        let (outcome, rollback) = {
            let mut chains = self.chains.lock();
            let settled = match chains.get_mut(&class_id) {
                Some(chain) => Self::settle_in_chain(self.store.as_ref(), chain, &pending, result),
                None => (Self::orphaned(result), None),
            };
            if chains.get(&class_id).is_some_and(|c| c.writes.is_empty()) {
                chains.remove(&class_id);
            }
            settled
        };

        match &outcome {
            WriteOutcome::Committed => {
                info!("✅ 班级状态已提交: class_id={}, status={}", class_id, pending.new);
            }
            WriteOutcome::RolledBack(error) | WriteOutcome::Superseded(error) => {
                warn!(
                    "❌ 修改班级状态失败: class_id={}, status={}, error={}",
                    class_id, pending.new, error
                );
            }
        }
        if let Some(event) = rollback {
            self.event_manager.emit(event);
        }
        if let Some(error) = outcome.error() {
            self.event_manager.emit(event_builders::status_write_failed(
                class_id,
                pending.new,
                error.to_string(),
            ));
        }
        outcome
    }

    fn settle_in_chain(
        store: &dyn StatusStore,
        chain: &mut WriteChain,
        pending: &PendingWrite,
        result: Result<()>,
    ) -> (WriteOutcome, Option<SyncEvent>) {
        let Some(index) = chain.writes.iter().position(|w| w.version == pending.version) else {
            return (Self::orphaned(result), None);
        };
        chain.writes.remove(index);
        let is_latest = index == chain.writes.len();

        let error = match result {
            Ok(()) => {
                if pending.version > chain.confirmed_version {
                    chain.confirmed = pending.new;
                    chain.confirmed_version = pending.version;
                }
                return (WriteOutcome::Committed, None);
            }
            Err(e) => e,
        };

        if !is_latest {
            debug!(
                "较新的写入仍在途，保留本地值: class_id={}, version={}",
                pending.class_id, pending.version
            );
            return (WriteOutcome::Superseded(error), None);
        }

        // 还有较旧的写入在途时显示它的值，否则回到确认值
        let target = chain
            .writes
            .last()
            .map(|w| w.new)
            .unwrap_or(chain.confirmed);
        match store.set_status_if_version(pending.class_id, target, chain.local_version) {
            Some(change) => {
                chain.local_version = change.version;
                info!(
                    "↩️ 已回滚班级状态: class_id={}, {} -> {}",
                    pending.class_id, change.old_status, change.new_status
                );
                let event = (change.old_status != change.new_status).then(|| {
                    event_builders::class_status_changed(
                        pending.class_id,
                        change.old_status,
                        change.new_status,
                        UpdateSource::Rollback,
                    )
                });
                (WriteOutcome::RolledBack(error), event)
            }
            None => {
                debug!(
                    "班级状态已被推送覆盖，跳过回滚: class_id={}, version={}",
                    pending.class_id, pending.version
                );
                (WriteOutcome::Superseded(error), None)
            }
        }
    }

    /// 写入链已不存在（不会发生在正常流程中），失败时不改动本地
    fn orphaned(result: Result<()>) -> WriteOutcome {
        match result {
            Ok(()) => WriteOutcome::Committed,
            Err(e) => WriteOutcome::Superseded(e),
        }
    }
}

impl std::fmt::Debug for OptimisticUpdateCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimisticUpdateCoordinator")
            .field("pending", &self.pending_count())
            .finish()
    }
}
