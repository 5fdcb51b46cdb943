//! 推送帧对账
//!
//! 把一条原始推送帧归一化为 [`InboundEvent`]，并以「按 ID 定点修改」的方式合入本地班级列表。
//!
//! 支持的帧格式：
//!
//! ```json
//! {"event_type": "CLASS_STATUS_UPDATE", "data": {"id": 2, "status": 2}}
//! {"school_id": 42, "grade": 1, "class": 2, "class_id": 2, "new_status": 2}
//! {"event_type": "CLASS_STATUS_UPDATE", "class_id": 2, "new_status": 2}
//! ```
//!
//! 任何无法识别的帧都被丢弃，不会影响连接。

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::events::{event_builders, EventManager, UpdateSource};
use crate::models::{ClassId, ClassInfo, ClassStatus, SchoolId};
use crate::store::{StatusChange, StatusStore};

/// 唯一会被应用的事件类型
pub const CLASS_STATUS_UPDATE: &str = "CLASS_STATUS_UPDATE";

/// 归一化后的推送事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub event_type: String,
    pub class_id: ClassId,
    pub new_status: ClassStatus,
    /// 帧中携带的学校（扁平格式才有）
    pub school_id: Option<SchoolId>,
}

/// 帧被丢弃的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    NotJson,
    NotObject,
    MissingField(&'static str),
    InvalidField(&'static str),
    InvalidStatus(i64),
    UnsupportedEvent(String),
    OtherSchool { expected: SchoolId, actual: SchoolId },
    UnknownClass(ClassId),
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::NotJson => write!(f, "帧不是合法 JSON"),
            DropReason::NotObject => write!(f, "帧不是 JSON 对象"),
            DropReason::MissingField(field) => write!(f, "缺少字段 {}", field),
            DropReason::InvalidField(field) => write!(f, "字段 {} 类型错误", field),
            DropReason::InvalidStatus(status) => write!(f, "未知的班级状态 {}", status),
            DropReason::UnsupportedEvent(kind) => write!(f, "不处理的事件类型 {}", kind),
            DropReason::OtherSchool { expected, actual } => {
                write!(f, "其他学校的推送 (期望 {}, 实际 {})", expected, actual)
            }
            DropReason::UnknownClass(id) => write!(f, "本地不存在班级 {}", id),
        }
    }
}

fn first_of<'a>(body: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| body.get(*key).filter(|v| !v.is_null()))
}

fn int_field(
    body: &Map<String, Value>,
    keys: &[&str],
    name: &'static str,
) -> Result<i64, DropReason> {
    match first_of(body, keys) {
        Some(value) => value.as_i64().ok_or(DropReason::InvalidField(name)),
        None => Err(DropReason::MissingField(name)),
    }
}

/// 解析并归一化一条推送帧（不涉及本地状态）
pub fn parse_frame(raw: &str) -> Result<InboundEvent, DropReason> {
    let value: Value = serde_json::from_str(raw).map_err(|_| DropReason::NotJson)?;
    let envelope = value.as_object().ok_or(DropReason::NotObject)?;

    let event_type = match envelope.get("event_type") {
        Some(Value::String(kind)) => Some(kind.clone()),
        Some(Value::Null) | None => None,
        Some(_) => return Err(DropReason::InvalidField("event_type")),
    };

    let (body, event_type) = match envelope.get("data") {
        Some(Value::Object(data)) => {
            let event_type = event_type.ok_or(DropReason::MissingField("event_type"))?;
            (data, event_type)
        }
        Some(Value::Null) | None => {
            // 扁平格式：服务端的班级状态通知不带 event_type
            (envelope, event_type.unwrap_or_else(|| CLASS_STATUS_UPDATE.to_string()))
        }
        Some(_) => return Err(DropReason::InvalidField("data")),
    };

    if event_type != CLASS_STATUS_UPDATE {
        return Err(DropReason::UnsupportedEvent(event_type));
    }

    let class_id = int_field(body, &["id", "class_id"], "id")?;
    let raw_status = int_field(body, &["status", "new_status"], "status")?;
    let new_status =
        ClassStatus::try_from(raw_status).map_err(|_| DropReason::InvalidStatus(raw_status))?;
    let school_id = match first_of(body, &["school_id"])
        .or_else(|| first_of(envelope, &["school_id"]))
    {
        Some(value) => Some(value.as_i64().ok_or(DropReason::InvalidField("school_id"))?),
        None => None,
    };

    Ok(InboundEvent {
        event_type,
        class_id,
        new_status,
        school_id,
    })
}

fn check_school(event: &InboundEvent, expected: Option<SchoolId>) -> Result<(), DropReason> {
    match (expected, event.school_id) {
        (Some(expected), Some(actual)) if expected != actual => {
            Err(DropReason::OtherSchool { expected, actual })
        }
        _ => Ok(()),
    }
}

/// 纯函数对账：返回修改后的新列表；帧无效或班级不存在时返回 None
///
/// 只有目标班级的 `status` 被改写，其余元素与顺序保持不变。
pub fn reconcile(raw: &str, current: &[ClassInfo]) -> Option<Vec<ClassInfo>> {
    let event = parse_frame(raw).ok()?;
    let index = current.iter().position(|c| c.id == event.class_id)?;
    let mut next = current.to_vec();
    next[index].status = event.new_status;
    Some(next)
}

/// 推送对账器：把推送合入 [`StatusStore`]
#[derive(Debug, Clone, Default)]
pub struct MessageReconciler {
    event_manager: Option<Arc<EventManager>>,
}

impl MessageReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(event_manager: Arc<EventManager>) -> Self {
        Self {
            event_manager: Some(event_manager),
        }
    }

    /// 合入一条推送帧
    ///
    /// `school_id` 为当前订阅的学校；帧携带其他学校时丢弃。
    pub fn apply(
        &self,
        raw: &str,
        school_id: Option<SchoolId>,
        store: &dyn StatusStore,
    ) -> Result<StatusChange, DropReason> {
        let result = parse_frame(raw)
            .and_then(|event| check_school(&event, school_id).map(|_| event))
            .and_then(|event| {
                store
                    .set_status(event.class_id, event.new_status)
                    .ok_or(DropReason::UnknownClass(event.class_id))
            });

        match &result {
            Ok(change) => {
                debug!(
                    "📥 推送更新班级状态: class_id={}, {} -> {}",
                    change.class_id, change.old_status, change.new_status
                );
                if change.old_status != change.new_status {
                    if let Some(events) = &self.event_manager {
                        events.emit(event_builders::class_status_changed(
                            change.class_id,
                            change.old_status,
                            change.new_status,
                            UpdateSource::Push,
                        ));
                    }
                }
            }
            Err(DropReason::UnknownClass(id)) => {
                // 学校频道会推送本用户不负责的班级，属正常情况
                debug!("忽略与本地列表无关的推送: class_id={}", id);
            }
            Err(reason) => {
                warn!("⚠️ 丢弃推送帧: {}", reason);
                if let Some(events) = &self.event_manager {
                    events.emit(event_builders::frame_dropped(reason.to_string()));
                }
            }
        }
        result
    }
}
