use thiserror::Error;

/// 业务成功码（ApiResponse.code）
pub const APP_OK: u16 = 0;
/// 其他错误
pub const APP_OTHER: u16 = 5000;
/// 认证失败
pub const APP_AUTH_FAILED: u16 = 5005;
/// 权限不足
pub const APP_FORBIDDEN: u16 = 5006;
/// 用户不存在（token 对应的用户已失效，需要重新登录）
pub const APP_USER_NOT_FOUND: u16 = 5010;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Config error: {0}")]
    Config(String),
    /// HTTP 请求层错误（连接失败、超时、非 2xx）
    #[error("HTTP error (status {status:?}): {message}")]
    Http {
        status: Option<u16>,
        message: String,
    },
    /// 服务端返回的业务错误（ApiResponse.code != 0）
    #[error("API error [{code}]: {message}")]
    Api { code: u16, message: String },
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("WebSocket error: {0}")]
    WebSocket(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    /// 当前用户无权执行该操作（非教师/管理员）
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// 控制器已关闭
    #[error("Shutting down: {0}")]
    ShuttingDown(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(error: serde_json::Error) -> Self {
        SyncError::Serialization(error.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(error: reqwest::Error) -> Self {
        SyncError::Http {
            status: error.status().map(|s| s.as_u16()),
            message: error.to_string(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        SyncError::WebSocket(error.to_string())
    }
}

impl SyncError {
    /// 从业务响应创建错误
    pub fn from_api_response(code: u16, message: impl Into<String>) -> Self {
        SyncError::Api {
            code,
            message: message.into(),
        }
    }

    /// 获取业务错误码（如果这是一个业务错误）
    pub fn api_code(&self) -> Option<u16> {
        match self {
            SyncError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// 是否需要重新登录（HTTP 401 或用户已失效）
    pub fn is_auth_failure(&self) -> bool {
        match self {
            SyncError::Http { status, .. } => *status == Some(401),
            SyncError::Api { code, .. } => *code == APP_USER_NOT_FOUND || *code == APP_AUTH_FAILED,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failure_detection() {
        let http_401 = SyncError::Http {
            status: Some(401),
            message: "unauthorized".to_string(),
        };
        assert!(http_401.is_auth_failure());
        assert!(SyncError::from_api_response(APP_USER_NOT_FOUND, "user gone").is_auth_failure());
        assert!(!SyncError::from_api_response(APP_FORBIDDEN, "forbidden").is_auth_failure());
        assert!(!SyncError::ShuttingDown("closed".to_string()).is_auth_failure());
    }

    #[test]
    fn test_api_code() {
        assert_eq!(SyncError::from_api_response(APP_OTHER, "nope").api_code(), Some(APP_OTHER));
        assert_eq!(SyncError::NotFound("班级 1".to_string()).api_code(), None);
    }
}
