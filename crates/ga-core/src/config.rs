use ga_error::{GaError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 应用配置
///
/// 对应前端构建时注入的 `VITE_*` 变量，这里统一从 `GA_*` 环境变量读取。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 本地存储命名空间，所有键都存放在该容器下
    pub namespace: String,
    /// 后端接口基础地址
    pub base_api: String,
    /// 请求超时时间（毫秒）
    pub request_timeout_ms: u64,
    /// 登录页路由
    pub login_path: String,
    /// 已登录用户的落地页
    pub home_path: String,
    /// 会话失效后跳转登录页的延迟（毫秒）
    pub redirect_delay_ms: u64,
    /// 文件存储位置（控制台工具使用）
    pub store_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            namespace: "go-vue-general-admin".to_string(),
            base_api: "http://localhost:8080/api".to_string(),
            request_timeout_ms: 8000,
            login_path: "/adminLogin".to_string(),
            home_path: "/auth/dashboard".to_string(),
            redirect_delay_ms: 1500,
            store_path: None,
        }
    }
}

impl AppConfig {
    /// 从环境变量加载配置，未设置的项使用默认值
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源加载配置
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(namespace) = lookup("GA_NAME_SPACE") {
            config.namespace = non_empty("GA_NAME_SPACE", namespace)?;
        }
        if let Some(base_api) = lookup("GA_BASE_API") {
            config.base_api = non_empty("GA_BASE_API", base_api)?
                .trim_end_matches('/')
                .to_string();
        }
        if let Some(raw) = lookup("GA_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = parse_u64("GA_REQUEST_TIMEOUT_MS", &raw)?;
        }
        if let Some(login_path) = lookup("GA_LOGIN_PATH") {
            config.login_path = route_path("GA_LOGIN_PATH", login_path)?;
        }
        if let Some(home_path) = lookup("GA_HOME_PATH") {
            config.home_path = route_path("GA_HOME_PATH", home_path)?;
        }
        if let Some(raw) = lookup("GA_REDIRECT_DELAY_MS") {
            config.redirect_delay_ms = parse_u64("GA_REDIRECT_DELAY_MS", &raw)?;
        }
        if let Some(path) = lookup("GA_STORE_PATH") {
            config.store_path = Some(PathBuf::from(non_empty("GA_STORE_PATH", path)?));
        }

        Ok(config)
    }
}

fn non_empty(key: &str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GaError::Configuration {
            key: key.to_string(),
            reason: "值不能为空".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn route_path(key: &str, value: String) -> Result<String> {
    let value = non_empty(key, value)?;
    if !value.starts_with('/') {
        return Err(GaError::Configuration {
            key: key.to_string(),
            reason: format!("路由必须以 / 开头: {}", value),
        });
    }
    Ok(value)
}

fn parse_u64(key: &str, raw: &str) -> Result<u64> {
    raw.trim().parse().map_err(|e| GaError::Configuration {
        key: key.to_string(),
        reason: format!("无法解析为整数 '{}': {}", raw, e),
    })
}
