use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

/// 后台管理前端统一错误类型
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum GaError {
    // === 业务错误 ===
    #[error("资源未找到: {resource}")]
    NotFound { resource: String },

    #[error("请求无效: {reason}")]
    InvalidRequest { reason: String },

    #[error("权限不足: {operation}")]
    Unauthorized { operation: String },

    #[error("认证失败: {message}")]
    Authentication { message: String },

    /// 后端返回 403/406，会话已失效
    #[error("会话失效 ({code}): {message}")]
    AuthDenied { code: i64, message: String },

    #[error("验证失败: {message}")]
    Validation { message: String },

    // === 技术错误 ===
    #[error("存储错误: {operation} 失败")]
    Storage { operation: String, message: String },

    #[error("网络错误: {operation}")]
    Network { operation: String, message: String },

    #[error("超时错误: {operation} 超过 {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    // === 系统错误 ===
    #[error("内部系统错误: {message}")]
    Internal {
        message: String,
        details: Option<String>,
    },

    #[error("配置错误: {key} - {reason}")]
    Configuration { key: String, reason: String },

    #[error("序列化错误: {format}")]
    Serialization { format: String, message: String },
}

/// 错误严重级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Low,      // 可预期的业务错误
    Medium,   // 技术错误但不影响核心功能
    High,     // 影响核心功能的错误
    Critical, // 系统级严重错误
}

/// 错误元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetadata {
    pub error_id: String,
    pub severity: ErrorSeverity,
    pub component: String,
    pub operation: Option<String>,
    pub request_path: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub context: std::collections::HashMap<String, String>,
}

impl GaError {
    /// 获取错误的严重级别
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            GaError::NotFound { .. } | GaError::InvalidRequest { .. } => ErrorSeverity::Low,
            GaError::Unauthorized { .. }
            | GaError::Authentication { .. }
            | GaError::AuthDenied { .. }
            | GaError::Validation { .. } => ErrorSeverity::Medium,
            GaError::Network { .. } | GaError::Timeout { .. } => ErrorSeverity::Medium,
            GaError::Storage { .. } | GaError::Serialization { .. } => ErrorSeverity::High,
            GaError::Internal { .. } | GaError::Configuration { .. } => ErrorSeverity::Critical,
        }
    }

    /// 是否为可重试错误
    ///
    /// 本层不做重试，只为调用方提供判断依据。
    pub fn is_retryable(&self) -> bool {
        matches!(self, GaError::Network { .. } | GaError::Timeout { .. })
    }

    /// 是否表示会话已失效（需要强制登出）
    pub fn is_session_invalid(&self) -> bool {
        matches!(self, GaError::AuthDenied { .. })
    }

    /// 按严重级别记录错误日志
    pub fn log(&self, metadata: &ErrorMetadata) {
        let label = match metadata.severity {
            ErrorSeverity::Low => "业务错误",
            ErrorSeverity::Medium => "技术错误",
            ErrorSeverity::High | ErrorSeverity::Critical => "严重错误",
        };
        if metadata.severity >= ErrorSeverity::High {
            error!(
                error_id = %metadata.error_id,
                component = %metadata.component,
                operation = ?metadata.operation,
                path = ?metadata.request_path,
                context = ?metadata.context,
                error = %self,
                "{}", label
            );
        } else {
            warn!(
                error_id = %metadata.error_id,
                component = %metadata.component,
                operation = ?metadata.operation,
                path = ?metadata.request_path,
                error = %self,
                "{}", label
            );
        }
    }

    /// 获取用户友好的错误消息（用于提示框）
    pub fn user_message(&self) -> String {
        match self {
            GaError::NotFound { .. } => "请求的资源不存在".to_string(),
            GaError::InvalidRequest { .. } => "请求参数有误，请检查后重试".to_string(),
            GaError::Unauthorized { .. } => "没有权限执行此操作".to_string(),
            GaError::Authentication { .. } => "认证失败，请重新登录".to_string(),
            GaError::AuthDenied { message, .. } => message.clone(),
            GaError::Validation { .. } => "输入数据验证失败，请检查格式".to_string(),
            GaError::Network { .. } => "网络异常，请检查连接".to_string(),
            GaError::Timeout { .. } => "请求超时，请重试".to_string(),
            _ => "系统内部错误，请联系管理员".to_string(),
        }
    }
}

/// 创建错误元数据的便捷构造器
pub struct ErrorMetadataBuilder {
    metadata: ErrorMetadata,
}

impl ErrorMetadataBuilder {
    pub fn new(component: &str) -> Self {
        Self {
            metadata: ErrorMetadata {
                error_id: uuid::Uuid::new_v4().to_string(),
                severity: ErrorSeverity::Medium,
                component: component.to_string(),
                operation: None,
                request_path: None,
                timestamp: chrono::Utc::now(),
                context: std::collections::HashMap::new(),
            },
        }
    }

    pub fn operation(mut self, operation: &str) -> Self {
        self.metadata.operation = Some(operation.to_string());
        self
    }

    pub fn request_path(mut self, path: &str) -> Self {
        self.metadata.request_path = Some(path.to_string());
        self
    }

    pub fn context(mut self, key: &str, value: &str) -> Self {
        self.metadata
            .context
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(mut self, error: &GaError) -> ErrorMetadata {
        self.metadata.severity = error.severity();
        self.metadata
    }
}

pub type Result<T> = std::result::Result<T, GaError>;

// === 转换实现 ===

impl From<serde_json::Error> for GaError {
    fn from(err: serde_json::Error) -> Self {
        GaError::Serialization {
            format: "json".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for GaError {
    fn from(err: std::io::Error) -> Self {
        GaError::Storage {
            operation: "io".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for GaError {
    fn from(err: reqwest::Error) -> Self {
        // 超时时长只有发起方知道，由客户端自行构造 Timeout
        if err.is_timeout() {
            GaError::Network {
                operation: "timeout".to_string(),
                message: err.to_string(),
            }
        } else if err.is_connect() {
            GaError::Network {
                operation: "connect".to_string(),
                message: err.to_string(),
            }
        } else {
            GaError::Network {
                operation: "http_request".to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_classification() {
        let denied = GaError::AuthDenied {
            code: 403,
            message: "token 已失效".to_string(),
        };
        assert_eq!(denied.severity(), ErrorSeverity::Medium);
        assert!(denied.is_session_invalid());
        assert!(!denied.is_retryable());

        let storage = GaError::Storage {
            operation: "write".to_string(),
            message: "disk full".to_string(),
        };
        assert_eq!(storage.severity(), ErrorSeverity::High);
        assert!(!storage.is_session_invalid());
        assert!(ErrorSeverity::Critical > ErrorSeverity::High);
        assert!(ErrorSeverity::Medium < ErrorSeverity::High);
    }

    #[test]
    fn test_user_message_passes_backend_message_for_auth_denied() {
        let denied = GaError::AuthDenied {
            code: 406,
            message: "账号已在别处登录".to_string(),
        };
        assert_eq!(denied.user_message(), "账号已在别处登录");

        let timeout = GaError::Timeout {
            operation: "http_request".to_string(),
            timeout_ms: 8000,
        };
        assert!(timeout.is_retryable());
        assert_eq!(timeout.user_message(), "请求超时，请重试");
    }

    #[test]
    fn test_metadata_builder_takes_error_severity() {
        let err = GaError::Configuration {
            key: "GA_BASE_API".to_string(),
            reason: "empty".to_string(),
        };
        let metadata = ErrorMetadataBuilder::new("config")
            .operation("from_env")
            .request_path("/adminLogin")
            .context("source", "env")
            .build(&err);

        assert_eq!(metadata.severity, ErrorSeverity::Critical);
        assert_eq!(metadata.component, "config");
        assert_eq!(metadata.operation.as_deref(), Some("from_env"));
        assert_eq!(metadata.request_path.as_deref(), Some("/adminLogin"));
        assert_eq!(metadata.context.get("source").map(String::as_str), Some("env"));
    }

    #[test]
    fn test_reqwest_error_conversion() {
        let err: GaError = reqwest::Client::new()
            .get("不是地址")
            .build()
            .unwrap_err()
            .into();
        // 非超时错误不会被当作超时，也不会带上臆测的超时时长
        assert!(matches!(
            err,
            GaError::Network { ref operation, .. } if operation == "http_request"
        ));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_json_error_conversion() {
        let err: GaError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert!(matches!(err, GaError::Serialization { ref format, .. } if format == "json"));
    }
}
