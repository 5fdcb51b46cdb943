//! 班级列表视图模型
//!
//! 本地班级列表是同步子系统唯一的共享可变资源：
//! - 推送对账（MessageReconciler）与乐观更新（OptimisticUpdateCoordinator）写入
//! - 界面层只读
//!
//! 所有写入都是「单个班级的单个字段」的定点修改。会话刷新重建列表时，有在途写入的班级保留本地状态。
//! 每次修改都会为该班级分配一个新的版本号（全局单调递增），用于乐观写入结算时的 check-and-set。

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::models::{ClassId, ClassInfo, ClassStatus};

/// 一次状态修改的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub class_id: ClassId,
    pub old_status: ClassStatus,
    pub new_status: ClassStatus,
    /// 修改后该班级的版本号
    pub version: u64,
}

/// 视图模型存储（由界面层实现或使用 [`ClassListStore`]）
pub trait StatusStore: Send + Sync {
    /// 按 ID 查找班级
    fn get(&self, class_id: ClassId) -> Option<ClassInfo>;

    /// 无条件修改状态；班级不存在时返回 None
    fn set_status(&self, class_id: ClassId, status: ClassStatus) -> Option<StatusChange>;

    /// 仅当班级当前版本等于 `expected_version` 时修改状态
    fn set_status_if_version(
        &self,
        class_id: ClassId,
        status: ClassStatus,
        expected_version: u64,
    ) -> Option<StatusChange>;

    /// 班级当前版本号
    fn version(&self, class_id: ClassId) -> Option<u64>;

    /// 当前列表快照
    fn snapshot(&self) -> Vec<ClassInfo>;
}

#[derive(Debug)]
struct Entry {
    class: ClassInfo,
    version: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<Entry>,
    /// 全局版本计数器
    next_version: u64,
}

impl Inner {
    fn bump(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    fn position(&self, class_id: ClassId) -> Option<usize> {
        self.entries.iter().position(|e| e.class.id == class_id)
    }
}

/// 默认的内存班级列表
#[derive(Debug, Default)]
pub struct ClassListStore {
    inner: RwLock<Inner>,
}

impl ClassListStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classes(classes: Vec<ClassInfo>) -> Self {
        let store = Self::new();
        store.replace_all(classes);
        store
    }

    /// 用会话数据初始化列表（重复 ID 只保留第一条）
    pub fn replace_all(&self, classes: Vec<ClassInfo>) {
        let mut inner = self.inner.write();
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(classes.len());
        for class in classes {
            if !seen.insert(class.id) {
                warn!("⚠️ 班级列表中存在重复 ID，已忽略: class_id={}", class.id);
                continue;
            }
            let version = inner.bump();
            entries.push(Entry { class, version });
        }
        debug!("班级列表已初始化: {} 个班级", entries.len());
        inner.entries = entries;
    }

    /// 用刷新后的会话数据重建列表
    ///
    /// `keep` 中的班级（有在途写入）保留本地状态与版本，只更新其余字段；
    /// 其它班级按服务端数据重建。
    pub fn reseed(&self, classes: Vec<ClassInfo>, keep: &HashSet<ClassId>) {
        let mut inner = self.inner.write();
        let mut previous: HashMap<ClassId, (ClassStatus, u64)> = inner
            .entries
            .iter()
            .filter(|e| keep.contains(&e.class.id))
            .map(|e| (e.class.id, (e.class.status, e.version)))
            .collect();

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(classes.len());
        for mut class in classes {
            if !seen.insert(class.id) {
                warn!("⚠️ 班级列表中存在重复 ID，已忽略: class_id={}", class.id);
                continue;
            }
            let version = match previous.remove(&class.id) {
                Some((status, version)) => {
                    if status != class.status {
                        debug!(
                            "保留在途写入的本地状态: class_id={}, local={}, server={}",
                            class.id, status, class.status
                        );
                    }
                    class.status = status;
                    version
                }
                None => inner.bump(),
            };
            entries.push(Entry { class, version });
        }
        debug!("班级列表已刷新: {} 个班级", entries.len());
        inner.entries = entries;
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write_status(inner: &mut Inner, index: usize, status: ClassStatus) -> StatusChange {
        let version = inner.bump();
        let entry = &mut inner.entries[index];
        let old_status = entry.class.status;
        entry.class.status = status;
        entry.version = version;
        StatusChange {
            class_id: entry.class.id,
            old_status,
            new_status: status,
            version,
        }
    }
}

impl StatusStore for ClassListStore {
    fn get(&self, class_id: ClassId) -> Option<ClassInfo> {
        let inner = self.inner.read();
        inner.position(class_id).map(|i| inner.entries[i].class.clone())
    }

    fn set_status(&self, class_id: ClassId, status: ClassStatus) -> Option<StatusChange> {
        let mut inner = self.inner.write();
        let index = inner.position(class_id)?;
        Some(Self::write_status(&mut inner, index, status))
    }

    fn set_status_if_version(
        &self,
        class_id: ClassId,
        status: ClassStatus,
        expected_version: u64,
    ) -> Option<StatusChange> {
        let mut inner = self.inner.write();
        let index = inner.position(class_id)?;
        if inner.entries[index].version != expected_version {
            debug!(
                "版本不匹配，跳过写入: class_id={}, expected={}, current={}",
                class_id, expected_version, inner.entries[index].version
            );
            return None;
        }
        Some(Self::write_status(&mut inner, index, status))
    }

    fn version(&self, class_id: ClassId) -> Option<u64> {
        let inner = self.inner.read();
        inner.position(class_id).map(|i| inner.entries[i].version)
    }

    fn snapshot(&self) -> Vec<ClassInfo> {
        self.inner
            .read()
            .entries
            .iter()
            .map(|e| e.class.clone())
            .collect()
    }
}
