use ga_auth::token::bearer_header;
use ga_core::{ApiEnvelope, AppConfig, KeyValueStore, StoreKey};
use ga_error::{GaError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Request};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::notify::{Notifier, Toast};

/// 强制跳转的接收端
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// 记录跳转目标，供测试和命令行使用
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        debug!(path, "强制跳转");
        self.visits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(path.to_string());
    }
}

/// 单次请求参数
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub url: String,
    /// GET 请求作为查询参数，其它方法作为 JSON 请求体
    pub data: Option<Value>,
    /// 不附带 token（登录、验证码等接口）
    pub skip_token: bool,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new(method: Method, url: &str) -> Self {
        Self {
            method,
            url: url.to_string(),
            data: None,
            skip_token: false,
            headers: Vec::new(),
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: &str) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: &str) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: &str) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn data<T: Serialize>(mut self, data: &T) -> Result<Self> {
        self.data = Some(serde_json::to_value(data)?);
        Ok(self)
    }

    pub fn skip_token(mut self) -> Self {
        self.skip_token = true;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    fn has_authorization(&self) -> bool {
        self.headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(AUTHORIZATION.as_str()))
    }
}

/// 后端接口客户端
///
/// 请求时自动附带存储中的 token；响应码为 403/406 时提示错误，
/// 并在延迟后清空存储、跳转登录页。
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    config: AppConfig,
    store: Arc<KeyValueStore>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    /// 尚未完成的延迟登出任务
    pending_logouts: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ApiClient {
    pub fn new(
        config: AppConfig,
        store: Arc<KeyValueStore>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json;charset=utf-8"),
        );
        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            config,
            store,
            notifier,
            navigator,
            pending_logouts: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn endpoint(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        format!(
            "{}/{}",
            self.config.base_api.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }

    /// 请求拦截：计算需要附带的 Authorization 头
    fn authorization(&self, options: &RequestOptions) -> Option<String> {
        if options.skip_token || options.has_authorization() {
            return None;
        }
        self.store
            .get::<String>(StoreKey::TOKEN)
            .filter(|token| !token.is_empty())
            .map(|token| bearer_header(&token))
    }

    /// 构造请求但不发送
    pub fn prepare(&self, options: &RequestOptions) -> Result<Request> {
        let mut builder = self
            .http
            .request(options.method.clone(), self.endpoint(&options.url));

        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                GaError::InvalidRequest {
                    reason: format!("header {}: {}", name, e),
                }
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| GaError::InvalidRequest {
                reason: format!("header value: {}", e),
            })?;
            builder = builder.header(name, value);
        }

        if let Some(authorization) = self.authorization(options) {
            builder = builder.header(AUTHORIZATION, authorization);
        }

        if let Some(data) = &options.data {
            builder = if options.method == Method::GET {
                builder.query(data)
            } else {
                builder.json(data)
            };
        }

        builder.build().map_err(|e| GaError::InvalidRequest {
            reason: e.to_string(),
        })
    }

    /// 发送请求并解析统一响应
    #[instrument(skip(self, options), fields(method = %options.method, url = %options.url))]
    pub async fn request<T: DeserializeOwned>(
        &self,
        options: RequestOptions,
    ) -> Result<ApiEnvelope<T>> {
        let request = self.prepare(&options)?;
        let response = self.http.execute(request).await.map_err(|e| {
            if e.is_timeout() {
                GaError::Timeout {
                    operation: options.url.clone(),
                    timeout_ms: self.config.request_timeout_ms,
                }
            } else {
                GaError::from(e)
            }
        })?;

        let status = response.status();
        let envelope: ApiEnvelope<Option<Value>> = response.json().await.map_err(|e| {
            GaError::Network {
                operation: "decode_response".to_string(),
                message: format!("status={} error={}", status, e),
            }
        })?;

        let envelope = self.intercept(envelope)?;
        Ok(ApiEnvelope {
            code: envelope.code,
            data: serde_json::from_value(envelope.data.unwrap_or(Value::Null))?,
            message: envelope.message,
        })
    }

    pub async fn get<T: DeserializeOwned, Q: Serialize>(
        &self,
        url: &str,
        query: &Q,
    ) -> Result<ApiEnvelope<T>> {
        self.request(RequestOptions::get(url).data(query)?).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<ApiEnvelope<T>> {
        self.request(RequestOptions::post(url).data(body)?).await
    }

    /// 响应拦截：会话失效码触发提示和延迟登出，其它响应原样返回
    pub fn intercept<T>(&self, envelope: ApiEnvelope<T>) -> Result<ApiEnvelope<T>> {
        if !envelope.is_session_invalid() {
            return Ok(envelope);
        }

        warn!(code = envelope.code, message = %envelope.message, "会话失效");
        self.notifier.notify(Toast::error(&envelope.message));
        let handle = self.schedule_forced_logout();
        self.lock_pending().push(handle);

        Err(GaError::AuthDenied {
            code: envelope.code,
            message: envelope.message,
        })
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.pending_logouts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 是否有尚未完成的延迟登出
    pub fn has_pending_logout(&self) -> bool {
        self.lock_pending().iter().any(|handle| !handle.is_finished())
    }

    /// 等待拦截器安排的延迟登出全部完成
    pub async fn await_pending_logout(&self) {
        let handles = std::mem::take(&mut *self.lock_pending());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "延迟登出任务异常结束");
            }
        }
    }

    /// 延迟清空存储并跳转登录页
    pub fn schedule_forced_logout(&self) -> JoinHandle<()> {
        let store = self.store.clone();
        let navigator = self.navigator.clone();
        let login_path = self.config.login_path.clone();
        let delay = Duration::from_millis(self.config.redirect_delay_ms);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            store.clear();
            info!(login_path = %login_path, "会话失效，已清空存储并跳转登录页");
            navigator.navigate(&login_path);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{RecordingNotifier, ToastVariant};
    use serde_json::json;

    struct Fixture {
        store: Arc<KeyValueStore>,
        notifier: Arc<RecordingNotifier>,
        navigator: Arc<RecordingNavigator>,
        client: ApiClient,
    }

    fn fixture() -> Fixture {
        let config = AppConfig {
            base_api: "http://localhost:8080/api/".to_string(),
            redirect_delay_ms: 10,
            ..AppConfig::default()
        };
        let store = Arc::new(KeyValueStore::in_memory(&config.namespace));
        let notifier = Arc::new(RecordingNotifier::new());
        let navigator = Arc::new(RecordingNavigator::new());
        let client =
            ApiClient::new(config, store.clone(), notifier.clone(), navigator.clone()).unwrap();
        Fixture {
            store,
            notifier,
            navigator,
            client,
        }
    }

    #[test]
    fn test_bearer_token_attached_when_stored() {
        let f = fixture();
        let request = f.client.prepare(&RequestOptions::get("/admin/list")).unwrap();
        assert!(request.headers().get(AUTHORIZATION).is_none());
        assert_eq!(request.url().as_str(), "http://localhost:8080/api/admin/list");

        f.store.set(StoreKey::TOKEN, "abc.def.ghi");
        let request = f.client.prepare(&RequestOptions::get("/admin/list")).unwrap();
        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            "Bearer abc.def.ghi"
        );
    }

    #[test]
    fn test_token_skipped_or_not_overridden() {
        let f = fixture();
        f.store.set(StoreKey::TOKEN, "abc.def.ghi");

        let request = f
            .client
            .prepare(&RequestOptions::get("/captcha").skip_token())
            .unwrap();
        assert!(request.headers().get(AUTHORIZATION).is_none());

        let request = f
            .client
            .prepare(&RequestOptions::get("/x").header("Authorization", "Bearer other"))
            .unwrap();
        let values: Vec<_> = request.headers().get_all(AUTHORIZATION).iter().collect();
        assert_eq!(values, vec!["Bearer other"]);
    }

    #[test]
    fn test_get_sends_data_as_query() {
        let f = fixture();
        let options = RequestOptions::get("/role/list")
            .data(&json!({"pageNum": 1, "roleName": "管理员"}))
            .unwrap();
        let request = f.client.prepare(&options).unwrap();

        assert_eq!(request.method(), Method::GET);
        let query = request.url().query().unwrap();
        assert!(query.contains("pageNum=1"));
        assert!(request.body().is_none());
    }

    #[test]
    fn test_post_sends_json_body() {
        let f = fixture();
        let options = RequestOptions::post("/login")
            .skip_token()
            .data(&json!({"username": "admin"}))
            .unwrap();
        let request = f.client.prepare(&options).unwrap();

        assert!(request.url().query().is_none());
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(serde_json::from_slice::<Value>(body).unwrap(), json!({"username": "admin"}));
    }

    #[test]
    fn test_invalid_header_rejected() {
        let f = fixture();
        let err = f
            .client
            .prepare(&RequestOptions::get("/x").header("bad header", "v"))
            .unwrap_err();
        assert!(matches!(err, GaError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let f = fixture();
        let envelope = ApiEnvelope {
            code: 200,
            data: json!({"id": 1}),
            message: String::new(),
        };
        let passed = f.client.intercept(envelope).unwrap();
        assert_eq!(passed.data, json!({"id": 1}));
        assert!(f.notifier.toasts().is_empty());
    }

    #[tokio::test]
    async fn test_session_invalid_codes_force_logout() {
        for code in [403, 406] {
            let f = fixture();
            f.store.set(StoreKey::TOKEN, "abc.def.ghi");

            let envelope = ApiEnvelope {
                code,
                data: Value::Null,
                message: "登录已过期".to_string(),
            };
            let err = f.client.intercept(envelope).unwrap_err();
            assert!(matches!(err, GaError::AuthDenied { code: c, .. } if c == code));

            let toasts = f.notifier.toasts();
            assert_eq!(toasts.len(), 1);
            assert_eq!(toasts[0].variant, ToastVariant::Error);
            assert_eq!(toasts[0].message.as_deref(), Some("登录已过期"));

            // 跳转前存储保持不变
            assert!(f.store.get_value(StoreKey::TOKEN).is_some());
            assert!(f.navigator.visits().is_empty());

            tokio::time::sleep(Duration::from_millis(100)).await;
            assert!(f.store.snapshot().is_empty());
            assert_eq!(f.navigator.visits(), vec!["/adminLogin".to_string()]);
        }
    }

    #[tokio::test]
    async fn test_intercept_logout_can_be_awaited() {
        let f = fixture();
        f.store.set(StoreKey::TOKEN, "abc.def.ghi");
        assert!(!f.client.has_pending_logout());

        let envelope = ApiEnvelope {
            code: 403,
            data: Value::Null,
            message: "无权限".to_string(),
        };
        f.client.intercept(envelope).unwrap_err();
        assert!(f.client.has_pending_logout());

        // 克隆出的客户端共享同一组登出任务
        f.client.clone().await_pending_logout().await;
        assert!(!f.client.has_pending_logout());
        assert!(f.store.snapshot().is_empty());
        assert_eq!(f.navigator.visits(), vec!["/adminLogin".to_string()]);

        // 没有待完成任务时立即返回
        f.client.await_pending_logout().await;
        assert_eq!(f.navigator.visits().len(), 1);
    }

    #[tokio::test]
    async fn test_request_timeout_reports_configured_limit() {
        // 只监听不应答，请求必然超时
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let config = AppConfig {
            base_api: format!("http://{}", addr),
            request_timeout_ms: 50,
            ..AppConfig::default()
        };
        let store = Arc::new(KeyValueStore::in_memory(&config.namespace));
        let client = ApiClient::new(
            config,
            store,
            Arc::new(RecordingNotifier::new()),
            Arc::new(RecordingNavigator::new()),
        )
        .unwrap();

        let err = client
            .request::<Value>(RequestOptions::get("/slow"))
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                GaError::Timeout { timeout_ms: 50, ref operation } if operation == "/slow"
            ),
            "unexpected error: {:?}",
            err
        );
        drop(listener);
    }

    #[tokio::test]
    async fn test_forced_logout_task_can_be_awaited() {
        let f = fixture();
        f.store.set(StoreKey::TOKEN, "abc.def.ghi");
        f.client.schedule_forced_logout().await.unwrap();
        assert!(f.store.get_value(StoreKey::TOKEN).is_none());
        assert_eq!(f.navigator.visits().len(), 1);
    }
}
