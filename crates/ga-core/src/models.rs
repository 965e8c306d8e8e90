use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 本地存储键定义
pub struct StoreKey;

impl StoreKey {
    pub const TOKEN: &'static str = "token";
    pub const SYS_ADMIN: &'static str = "sysAdmin";
    pub const LEFT_MENU_LIST: &'static str = "leftMenuList";
    pub const PERMISSION_LIST: &'static str = "permissionList";
    pub const ACTIVE_PATH: &'static str = "activePath";
    pub const KEEP_LOGGED_IN: &'static str = "keepLoggedIn";
    pub const LAST_ACTIVITY: &'static str = "lastActivity";
    pub const USER_ROLES: &'static str = "userRoles";

    /// 登出时需要清除的键
    pub fn session_keys() -> Vec<&'static str> {
        vec![
            Self::TOKEN,
            Self::SYS_ADMIN,
            Self::LEFT_MENU_LIST,
            Self::PERMISSION_LIST,
            Self::ACTIVE_PATH,
            Self::KEEP_LOGGED_IN,
            Self::LAST_ACTIVITY,
        ]
    }
}

/// 后端统一响应结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: i64,
    pub data: T,
    #[serde(default)]
    pub message: String,
}

impl<T> ApiEnvelope<T> {
    pub const SUCCESS: i64 = 200;
    pub const FORBIDDEN: i64 = 403;
    pub const NOT_ACCEPTABLE: i64 = 406;

    pub fn is_success(&self) -> bool {
        self.code == Self::SUCCESS
    }

    /// 403/406 表示会话已失效
    pub fn is_session_invalid(&self) -> bool {
        self.code == Self::FORBIDDEN || self.code == Self::NOT_ACCEPTABLE
    }
}

/// 当前登录的管理员信息（sysAdmin）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dept_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    /// 后端返回的其他字段，原样保留
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Principal {
    pub fn with_id(id: u64) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    /// 展示名：优先昵称，其次用户名
    pub fn display_name(&self) -> Option<&str> {
        self.nickname
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.username.as_deref())
    }
}

/// 左侧菜单项（leftMenuList），二级菜单放在 menuSvoList 中
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuEntry {
    pub id: u64,
    #[serde(default)]
    pub menu_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, rename = "menuSvoList", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuEntry>,
}

/// 登录接口返回的数据
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub token: String,
    pub sys_admin: Principal,
    #[serde(default)]
    pub left_menu_list: Vec<MenuEntry>,
    #[serde(default)]
    pub permission_list: Vec<String>,
}

/// 会话在内存中的投影，每次从存储中重建
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub token: Option<String>,
    pub principal: Option<Principal>,
    pub last_activity_epoch_ms: Option<i64>,
    pub remember_me: bool,
}

impl Session {
    /// token 与用户信息同时存在即视为已认证，不校验签名
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.principal.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_principal_accepts_minimal_record() {
        let principal: Principal = serde_json::from_value(json!({"id": 1})).unwrap();
        assert_eq!(principal.id, Some(1));
        assert!(principal.username.is_none());
    }

    #[test]
    fn test_principal_keeps_unknown_fields() {
        let raw = json!({"id": 7, "username": "admin", "roleName": "超级管理员"});
        let principal: Principal = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(principal.display_name(), Some("admin"));
        assert_eq!(serde_json::to_value(&principal).unwrap(), raw);
    }

    #[test]
    fn test_principal_rejects_non_object() {
        assert!(serde_json::from_value::<Principal>(json!("")).is_err());
    }

    #[test]
    fn test_envelope_session_invalid_codes() {
        let denied: ApiEnvelope<Value> =
            serde_json::from_value(json!({"code": 406, "data": null, "message": "登录已过期"}))
                .unwrap();
        assert!(denied.is_session_invalid());
        assert!(!denied.is_success());

        let ok: ApiEnvelope<Value> =
            serde_json::from_value(json!({"code": 200, "data": {}})).unwrap();
        assert!(ok.is_success());
        assert!(!ok.is_session_invalid());
        assert_eq!(ok.message, "");
    }

    #[test]
    fn test_login_data_from_backend_shape() {
        let data: LoginData = serde_json::from_value(json!({
            "token": "abc.def.ghi",
            "sysAdmin": {"id": 1, "username": "admin"},
            "leftMenuList": [
                {"id": 1, "menuName": "系统管理", "icon": "setting", "url": "",
                 "menuSvoList": [{"id": 2, "menuName": "角色管理", "url": "/auth/role"}]}
            ],
            "permissionList": ["system:role:list"]
        }))
        .unwrap();

        assert_eq!(data.left_menu_list[0].children[0].menu_name, "角色管理");
        assert_eq!(data.permission_list, vec!["system:role:list".to_string()]);
    }

    #[test]
    fn test_session_authenticated_requires_both() {
        let mut session = Session {
            token: Some("t".to_string()),
            ..Default::default()
        };
        assert!(!session.is_authenticated());
        session.principal = Some(Principal::with_id(1));
        assert!(session.is_authenticated());
    }
}
