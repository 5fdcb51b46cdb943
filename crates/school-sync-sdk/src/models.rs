//! 数据模型
//!
//! 与服务端 `/api/admin/*` 接口对齐的数据结构。

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError, APP_OK};

/// 班级 ID
pub type ClassId = i64;
/// 学校 ID
pub type SchoolId = i64;

/// 班级状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ClassStatus {
    /// 已放学
    Dismissed,
    /// 上课中
    InClass,
    /// 放学中
    Dismissing,
}

impl ClassStatus {
    pub fn as_i64(self) -> i64 {
        match self {
            ClassStatus::Dismissed => 0,
            ClassStatus::InClass => 1,
            ClassStatus::Dismissing => 2,
        }
    }

    /// 界面展示文案
    pub fn label(self) -> &'static str {
        match self {
            ClassStatus::Dismissed => "已放学",
            ClassStatus::InClass => "上课中",
            ClassStatus::Dismissing => "放学中",
        }
    }
}

impl TryFrom<i64> for ClassStatus {
    type Error = SyncError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            0 => Ok(ClassStatus::Dismissed),
            1 => Ok(ClassStatus::InClass),
            2 => Ok(ClassStatus::Dismissing),
            other => Err(SyncError::InvalidData(format!("未知的班级状态: {}", other))),
        }
    }
}

impl From<ClassStatus> for i64 {
    fn from(status: ClassStatus) -> Self {
        status.as_i64()
    }
}

impl std::fmt::Display for ClassStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// 班级信息（本地列表中的实体）
///
/// 身份为 `id`；同步子系统只会修改 `status`，其他字段只读。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    /// `/api/admin/me` 中字段名为 `class_id`
    #[serde(alias = "class_id")]
    pub id: ClassId,
    #[serde(alias = "class_name", default)]
    pub name: String,
    #[serde(default)]
    pub school_id: Option<SchoolId>,
    #[serde(default)]
    pub school_name: Option<String>,
    #[serde(default)]
    pub grade: Option<i64>,
    #[serde(default)]
    pub class: Option<i64>,
    pub status: ClassStatus,
}

/// 用户角色
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleInfo {
    pub role_id: i64,
    pub role_name: String,
}

/// 当前用户（`GET /api/admin/me`）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    /// 部分部署直接在用户上返回所属学校
    #[serde(default)]
    pub school_id: Option<SchoolId>,
    #[serde(default)]
    pub class_infos: Vec<ClassInfo>,
    #[serde(default)]
    pub role_infos: Vec<RoleInfo>,
}

impl UserInfo {
    /// 是否有权修改班级状态（teacher / admin）
    pub fn is_teacher(&self) -> bool {
        self.role_infos.iter().any(|role| {
            let name = role.role_name.to_lowercase();
            name == "teacher" || name == "admin"
        })
    }

    /// 解析订阅的学校：优先用户资料，其次任一带学校信息的班级
    pub fn resolve_school_id(&self) -> Option<SchoolId> {
        self.school_id
            .filter(|id| *id > 0)
            .or_else(|| {
                self.class_infos
                    .iter()
                    .filter_map(|c| c.school_id)
                    .find(|id| *id > 0)
            })
    }
}

/// 服务端统一响应包装
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
    #[serde(default)]
    pub success: bool,
}

impl<T> ApiResponse<T> {
    /// 取出业务数据；业务码非 0 时转为错误
    pub fn into_result(self) -> Result<Option<T>> {
        if self.code == APP_OK {
            Ok(self.data)
        } else {
            let message = if self.message.is_empty() {
                "操作失败".to_string()
            } else {
                self.message
            };
            Err(SyncError::from_api_response(self.code, message))
        }
    }
}

/// 修改班级状态请求体
#[derive(Debug, Clone, Copy, Serialize)]
pub struct UpdateStatusRequest {
    pub status: ClassStatus,
}
