use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use ga_error::{GaError, Result};
use serde_json::Value;
use tracing::debug;

/// 从 Authorization header 中提取 token
pub fn extract_token_from_header(authorization: &str) -> Result<&str> {
    if let Some(token) = authorization.strip_prefix("Bearer ") {
        Ok(token)
    } else {
        Err(GaError::Authentication {
            message: "Invalid Authorization header format".to_string(),
        })
    }
}

/// 构造 Authorization header 的值
pub fn bearer_header(token: &str) -> String {
    format!("Bearer {}", token)
}

/// 解析 JWT 载荷中的过期时间（不校验签名）
///
/// 非三段式、无法解码或没有 `exp` 字段时返回 `None`。
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        debug!("token 不是标准的 JWT 格式，跳过过期检查");
        return None;
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| debug!(error = %e, "token 载荷解码失败"))
        .ok()?;
    let claims: Value = serde_json::from_slice(&payload)
        .map_err(|e| debug!(error = %e, "token 载荷解析失败"))
        .ok()?;

    let exp = match claims.get("exp")? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        _ => return None,
    };
    DateTime::from_timestamp(exp, 0)
}

/// token 是否已过期
///
/// 空 token 视为过期；格式不标准或无法解析的 token 视为有效，留给后端校验。
pub fn is_token_expired(token: &str, now: DateTime<Utc>) -> bool {
    if token.is_empty() {
        return true;
    }
    match token_expiry(token) {
        Some(expires_at) => expires_at < now,
        None => false,
    }
}
