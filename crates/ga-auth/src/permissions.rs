/// 权限定义模块
/// 定义后台管理系统中使用的权限标识和权限集合
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 权限常量定义
pub struct Permission;

impl Permission {
    // 权限管理模块
    pub const AUTH_VIEW: &'static str = "system:auth:view";

    // 管理员管理
    pub const ADMIN_LIST: &'static str = "system:admin:list";
    pub const ADMIN_ADD: &'static str = "system:admin:add";
    pub const ADMIN_EDIT: &'static str = "system:admin:edit";
    pub const ADMIN_DELETE: &'static str = "system:admin:delete";

    // 角色管理
    pub const ROLE_LIST: &'static str = "system:role:list";
    pub const ROLE_ADD: &'static str = "system:role:add";
    pub const ROLE_EDIT: &'static str = "system:role:edit";
    pub const ROLE_DELETE: &'static str = "system:role:delete";

    // 菜单管理
    pub const MENU_LIST: &'static str = "system:menu:list";

    // 部门、岗位管理
    pub const DEPT_LIST: &'static str = "system:dept:list";
    pub const POST_LIST: &'static str = "system:post:list";

    // 日志
    pub const LOG_LIST: &'static str = "system:log:list";

    // 返回所有权限列表
    pub fn all() -> Vec<&'static str> {
        vec![
            Self::AUTH_VIEW,
            Self::ADMIN_LIST,
            Self::ADMIN_ADD,
            Self::ADMIN_EDIT,
            Self::ADMIN_DELETE,
            Self::ROLE_LIST,
            Self::ROLE_ADD,
            Self::ROLE_EDIT,
            Self::ROLE_DELETE,
            Self::MENU_LIST,
            Self::DEPT_LIST,
            Self::POST_LIST,
            Self::LOG_LIST,
        ]
    }
}

/// 当前用户拥有的权限集合（permissionList）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(HashSet<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.0.contains(permission)
    }

    pub fn insert(&mut self, permission: impl Into<String>) -> bool {
        self.0.insert(permission.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// 要求为空时恒为真；否则拥有任一所需权限即可（或语义）
    pub fn has_permission<I, S>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut any_required = false;
        for permission in required {
            any_required = true;
            if self.contains(permission.as_ref()) {
                return true;
            }
        }
        !any_required
    }

    /// 需要拥有全部所需权限
    pub fn has_all_permissions<I, S>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        required.into_iter().all(|p| self.contains(p.as_ref()))
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
