//! HTTP 客户端模块 - 班级管理接口
//!
//! 本模块封装 `/api/admin/*` 接口，使用 reqwest 作为底层 HTTP 客户端。
//! 所有响应都是 `ApiResponse` 包装，业务码非 0 时转为 [`SyncError::Api`]。

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::models::{ApiResponse, ClassId, ClassInfo, ClassStatus, UpdateStatusRequest, UserInfo};
use crate::version;

/// 班级管理接口（可注入，便于测试）
#[async_trait]
pub trait ClassApi: Send + Sync {
    /// 当前用户及其负责的班级（`GET /api/admin/me`）
    async fn fetch_current_user(&self) -> Result<UserInfo>;

    /// 修改班级状态（`PUT /api/admin/classes/{id}/status`）
    async fn update_class_status(&self, class_id: ClassId, status: ClassStatus) -> Result<()>;

    /// 班级详情（`GET /api/admin/classes/{id}`）
    async fn fetch_class(&self, class_id: ClassId) -> Result<ClassInfo>;
}

/// 基于 reqwest 的实现
pub struct HttpClassApi {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpClassApi {
    /// 创建新的 HTTP 客户端
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let base_url = config
            .base_url()
            .ok_or_else(|| SyncError::Config("未配置服务地址".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(version::user_agent())
            .build()
            .map_err(|e| SyncError::Config(format!("创建 HTTP 客户端失败: {}", e)))?;

        info!("✅ HTTP 客户端已创建 (base_url: {})", base_url);

        Ok(Self {
            client,
            base_url,
            token: RwLock::new(config.token.clone()),
        })
    }

    /// 更新会话 token（重新登录后）
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.token.read().as_deref() {
            Some(token) if !token.is_empty() => builder.bearer_auth(token),
            _ => builder,
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<Option<T>> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // 非 2xx 时服务端仍可能返回 ApiResponse 包装的错误信息
            let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&body)
                .ok()
                .map(|r| r.message)
                .filter(|m| !m.is_empty())
                .unwrap_or(body);
            error!("❌ {}失败，HTTP 状态码: {}, 错误: {}", what, status, message);
            return Err(SyncError::Http {
                status: Some(status.as_u16()),
                message,
            });
        }

        let parsed: ApiResponse<T> = serde_json::from_str(&body)
            .map_err(|e| SyncError::Serialization(format!("解析{}响应失败: {}", what, e)))?;
        parsed.into_result()
    }
}

#[async_trait]
impl ClassApi for HttpClassApi {
    async fn fetch_current_user(&self) -> Result<UserInfo> {
        debug!("👤 获取当前用户信息");
        let response = self
            .authorize(self.client.get(self.url("/api/admin/me")))
            .send()
            .await?;
        Self::decode::<UserInfo>(response, "获取用户信息")
            .await?
            .ok_or_else(|| SyncError::InvalidData("用户信息为空".to_string()))
    }

    async fn update_class_status(&self, class_id: ClassId, status: ClassStatus) -> Result<()> {
        info!("✏️ 修改班级状态: class_id={}, status={}", class_id, status);
        let response = self
            .authorize(
                self.client
                    .put(self.url(&format!("/api/admin/classes/{}/status", class_id)))
                    .json(&UpdateStatusRequest { status }),
            )
            .send()
            .await?;
        Self::decode::<serde_json::Value>(response, "修改班级状态").await?;
        Ok(())
    }

    async fn fetch_class(&self, class_id: ClassId) -> Result<ClassInfo> {
        let response = self
            .authorize(
                self.client
                    .get(self.url(&format!("/api/admin/classes/{}", class_id))),
            )
            .send()
            .await?;
        Self::decode::<ClassInfo>(response, "获取班级详情")
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("班级 {}", class_id)))
    }
}

impl std::fmt::Debug for HttpClassApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClassApi")
            .field("base_url", &self.base_url)
            .field("has_token", &self.token.read().is_some())
            .finish()
    }
}

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::sync::oneshot;

    /// 可编排的接口桩
    ///
    /// 状态写入按调用顺序依次消费 `gates`（由测试决定何时结算）或 `results`，都没有时直接成功。
    #[derive(Default)]
    pub struct MockClassApi {
        pub user: Mutex<Option<UserInfo>>,
        pub writes: Mutex<Vec<(ClassId, ClassStatus)>>,
        results: Mutex<VecDeque<Result<()>>>,
        gates: Mutex<VecDeque<oneshot::Receiver<Result<()>>>>,
    }

    impl MockClassApi {
        pub fn with_user(user: UserInfo) -> Self {
            let api = Self::default();
            *api.user.lock() = Some(user);
            api
        }

        pub fn push_result(&self, result: Result<()>) {
            self.results.lock().push_back(result);
        }

        /// 下一次写入挂起，直到返回的 Sender 发送结果
        pub fn gate_next_write(&self) -> oneshot::Sender<Result<()>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().push_back(rx);
            tx
        }

        pub fn write_count(&self) -> usize {
            self.writes.lock().len()
        }
    }

    #[async_trait]
    impl ClassApi for MockClassApi {
        async fn fetch_current_user(&self) -> Result<UserInfo> {
            self.user
                .lock()
                .clone()
                .ok_or_else(|| SyncError::Http {
                    status: Some(401),
                    message: "unauthorized".to_string(),
                })
        }

        async fn update_class_status(&self, class_id: ClassId, status: ClassStatus) -> Result<()> {
            self.writes.lock().push((class_id, status));
            let gate = self.gates.lock().pop_front();
            if let Some(gate) = gate {
                return gate
                    .await
                    .unwrap_or_else(|_| Err(SyncError::ShuttingDown("gate dropped".to_string())));
            }
            let scripted = self.results.lock().pop_front();
            scripted.unwrap_or(Ok(()))
        }

        async fn fetch_class(&self, class_id: ClassId) -> Result<ClassInfo> {
            self.user
                .lock()
                .as_ref()
                .and_then(|u| u.class_infos.iter().find(|c| c.id == class_id).cloned())
                .ok_or_else(|| SyncError::NotFound(format!("班级 {}", class_id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::APP_USER_NOT_FOUND;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_for(server: &MockServer) -> HttpClassApi {
        let config = SyncConfig::builder()
            .api_base_url(format!("{}/", server.uri()))
            .token("t0k")
            .build();
        HttpClassApi::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_current_user_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/admin/me"))
            .and(header("Authorization", "Bearer t0k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "message": "success",
                "success": true,
                "data": {
                    "id": 1,
                    "username": "wang",
                    "class_infos": [
                        {"class_id": 1, "class_name": "一年级1班", "school_id": 42, "status": 0}
                    ],
                    "role_infos": [{"role_id": 2, "role_name": "teacher"}]
                }
            })))
            .mount(&server)
            .await;

        let user = tokio_test::assert_ok!(api_for(&server).fetch_current_user().await);
        assert_eq!(user.username, "wang");
        assert_eq!(user.class_infos[0].name, "一年级1班");
        assert_eq!(user.resolve_school_id(), Some(42));
    }

    #[tokio::test]
    async fn test_update_status_body_and_business_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/admin/classes/7/status"))
            .and(body_json(json!({"status": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0, "message": "success", "data": null, "success": true
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/admin/classes/8/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": APP_USER_NOT_FOUND, "message": "用户不存在", "data": null, "success": false
            })))
            .mount(&server)
            .await;

        let api = api_for(&server);
        tokio_test::assert_ok!(api.update_class_status(7, ClassStatus::Dismissing).await);

        let err = api
            .update_class_status(8, ClassStatus::InClass)
            .await
            .unwrap_err();
        assert!(err.is_auth_failure());
        assert_eq!(err.api_code(), Some(APP_USER_NOT_FOUND));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/admin/classes/3"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = api_for(&server).fetch_class(3).await.unwrap_err();
        match err {
            SyncError::Http { status, message } => {
                assert_eq!(status, Some(500));
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_requires_base_url() {
        let config = SyncConfig::builder().without_api_base_url().build();
        assert!(matches!(HttpClassApi::new(&config), Err(SyncError::Config(_))));
    }
}
