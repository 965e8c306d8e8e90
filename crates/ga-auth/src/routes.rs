//! 路由/菜单树模型
//!
//! 路由表既用于导航守卫，也作为侧边栏菜单的数据来源。

use ga_core::models::MenuEntry;
use ga_core::tree::{build_tree, TreeConfig};
use ga_error::{GaError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 节点标识，后端菜单为数字，静态路由通常使用名称
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Num(i64),
    Text(String),
}

impl Default for NodeId {
    fn default() -> Self {
        NodeId::Text(String::new())
    }
}

impl NodeId {
    fn is_unset(&self) -> bool {
        matches!(self, NodeId::Text(s) if s.is_empty())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeId::Num(n) => write!(f, "{}", n),
            NodeId::Text(s) => f.write_str(s),
        }
    }
}

/// 路由元信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_auth: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_if_authenticated: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub hide_in_menu: bool,
    #[serde(default)]
    pub hide_when_no_children: bool,
    #[serde(default)]
    pub hide_in_breadcrumb: bool,
}

impl RouteMeta {
    /// 用子路由的元信息覆盖父路由：子路由设置了的字段优先
    pub fn overlaid_with(&self, child: &RouteMeta) -> RouteMeta {
        RouteMeta {
            title: child.title.clone().or_else(|| self.title.clone()),
            icon: child.icon.clone().or_else(|| self.icon.clone()),
            requires_auth: child.requires_auth.or(self.requires_auth),
            redirect_if_authenticated: child
                .redirect_if_authenticated
                .or(self.redirect_if_authenticated),
            permissions: if child.permissions.is_empty() {
                self.permissions.clone()
            } else {
                child.permissions.clone()
            },
            hide_in_menu: child.hide_in_menu || self.hide_in_menu,
            hide_when_no_children: child.hide_when_no_children || self.hide_when_no_children,
            hide_in_breadcrumb: child.hide_in_breadcrumb || self.hide_in_breadcrumb,
        }
    }
}

/// 路由独享守卫
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GuardKind {
    RequireAuth,
    RedirectIfAuthenticated,
}

/// 路由/菜单树节点
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationNode {
    #[serde(default, skip_serializing_if = "NodeId::is_unset")]
    pub id: NodeId,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(default)]
    pub meta: RouteMeta,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NavigationNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_enter: Option<GuardKind>,
}

impl NavigationNode {
    pub fn new(id: NodeId, path: &str) -> Self {
        Self {
            id,
            path: path.to_string(),
            ..Default::default()
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.meta.title = Some(title.to_string());
        self
    }

    pub fn permissions(mut self, permissions: &[&str]) -> Self {
        self.meta.permissions = permissions.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn requires_auth(mut self, requires_auth: bool) -> Self {
        self.meta.requires_auth = Some(requires_auth);
        self
    }

    pub fn hide_when_no_children(mut self) -> Self {
        self.meta.hide_when_no_children = true;
        self
    }

    pub fn hide_in_menu(mut self) -> Self {
        self.meta.hide_in_menu = true;
        self
    }

    pub fn guard(mut self, guard: GuardKind) -> Self {
        self.before_enter = Some(guard);
        self
    }

    pub fn redirect_to(mut self, target: &str) -> Self {
        self.redirect = Some(target.to_string());
        self
    }

    pub fn child(mut self, child: NavigationNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn required_permissions(&self) -> &[String] {
        &self.meta.permissions
    }

    pub fn hide_when_children_empty(&self) -> bool {
        self.meta.hide_when_no_children
    }

    /// 由后端左侧菜单项转换
    pub fn from_menu_entry(entry: &MenuEntry) -> Self {
        Self {
            id: NodeId::Num(entry.id as i64),
            path: entry.url.clone().unwrap_or_default(),
            meta: RouteMeta {
                title: Some(entry.menu_name.clone()),
                icon: entry.icon.clone(),
                requires_auth: Some(true),
                ..Default::default()
            },
            children: entry.children.iter().map(Self::from_menu_entry).collect(),
            ..Default::default()
        }
    }
}

/// 将子路由路径拼接到父路径上；以 / 开头的子路径视为绝对路径
pub fn join_path(parent: &str, child: &str) -> String {
    if child.starts_with('/') || parent.is_empty() {
        return normalize_path(child);
    }
    if child.is_empty() {
        return normalize_path(parent);
    }
    normalize_path(&format!("{}/{}", parent.trim_end_matches('/'), child))
}

/// 去掉查询串、片段和末尾斜杠
pub fn normalize_path(path: &str) -> String {
    let path = path.split(&['?', '#'][..]).next().unwrap_or("");
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// 路由表
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteTable {
    pub routes: Vec<NavigationNode>,
}

impl RouteTable {
    /// 创建路由表，未指定 id 的节点以完整路径作为 id
    pub fn new(mut routes: Vec<NavigationNode>) -> Self {
        for route in &mut routes {
            assign_ids(route, "");
        }
        Self { routes }
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let routes: Vec<NavigationNode> =
            serde_yaml::from_str(raw).map_err(|e| GaError::Serialization {
                format: "yaml".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self::new(routes))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let routes: Vec<NavigationNode> = serde_json::from_str(raw)?;
        Ok(Self::new(routes))
    }
}

fn assign_ids(node: &mut NavigationNode, parent_path: &str) {
    let full = join_path(parent_path, &node.path);
    if node.id.is_unset() {
        node.id = NodeId::Text(full.clone());
    }
    for child in &mut node.children {
        assign_ids(child, &full);
    }
}

/// 由后端平铺菜单记录（id/parentId/menuName/url/icon/value）构造菜单树
///
/// `value` 为菜单对应的权限标识，非空时作为访问要求。
pub fn navigation_from_records(records: &[Value]) -> Vec<NavigationNode> {
    build_tree(records, &TreeConfig::default())
        .iter()
        .map(node_from_tree_value)
        .collect()
}

fn node_from_tree_value(value: &Value) -> NavigationNode {
    let text = |field: &str| {
        value
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let id = match value.get("id") {
        Some(Value::Number(n)) => n.as_i64().map(NodeId::Num).unwrap_or_default(),
        Some(Value::String(s)) => NodeId::Text(s.clone()),
        _ => NodeId::default(),
    };

    let children = value
        .get("children")
        .and_then(Value::as_array)
        .map(|kids| kids.iter().map(node_from_tree_value).collect())
        .unwrap_or_default();

    NavigationNode {
        id,
        path: text("url").unwrap_or_default(),
        meta: RouteMeta {
            title: text("menuName"),
            icon: text("icon"),
            requires_auth: Some(true),
            permissions: text("value").into_iter().collect(),
            ..Default::default()
        },
        children,
        ..Default::default()
    }
}

/// 内置的权限管理模块路由
pub fn default_auth_routes() -> RouteTable {
    use crate::permissions::Permission;

    let page = |path: &str, name: &str, title: &str, permissions: &[&str]| {
        let mut node = NavigationNode::new(NodeId::Text(name.to_string()), path)
            .title(title)
            .requires_auth(true)
            .permissions(permissions)
            .guard(GuardKind::RequireAuth);
        node.name = Some(name.to_string());
        node
    };

    let mut login = NavigationNode::new(NodeId::Text("AdminLogin".to_string()), "/adminLogin")
        .title("管理员登录")
        .requires_auth(false)
        .hide_in_menu()
        .guard(GuardKind::RedirectIfAuthenticated);
    login.name = Some("AdminLogin".to_string());

    let mut auth = NavigationNode::new(NodeId::Text("AuthManagement".to_string()), "/auth")
        .title("权限管理")
        .requires_auth(true)
        .permissions(&[Permission::AUTH_VIEW])
        .redirect_to("/auth/dashboard")
        .child(page("dashboard", "AuthDashboard", "权限总览", &[Permission::AUTH_VIEW]))
        .child(page("admin", "AdminManagement", "管理员管理", &[Permission::ADMIN_LIST]))
        .child(page("role", "RoleManagement", "角色管理", &[Permission::ROLE_LIST]))
        .child(page("permission", "PermissionManagement", "权限管理", &[Permission::MENU_LIST]))
        .child(page("dept", "DeptManagement", "部门管理", &[Permission::DEPT_LIST]))
        .child(page("post", "PostManagement", "岗位管理", &[Permission::POST_LIST]))
        .child(page("profile", "Profile", "个人资料", &[]))
        .child(page("logs", "SystemLogs", "系统日志", &[Permission::LOG_LIST]));
    auth.name = Some("AuthManagement".to_string());
    auth.meta.icon = Some("shield-check".to_string());

    let mut not_found = NavigationNode::new(NodeId::Text("404 Error".to_string()), "/error-404")
        .title("404 Error")
        .hide_in_menu();
    not_found.name = Some("404 Error".to_string());

    let root = NavigationNode::new(NodeId::Text("Root".to_string()), "/")
        .redirect_to("/adminLogin")
        .hide_in_menu();

    RouteTable::new(vec![root, login, auth, not_found])
}

/// 面包屑项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// 匹配链中的一项
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedRoute {
    pub path: String,
    pub name: Option<String>,
    pub meta: RouteMeta,
    pub redirect: Option<String>,
    pub before_enter: Option<GuardKind>,
}

/// 路径解析结果：从根到目标的匹配链
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRoute {
    pub path: String,
    pub full_path: String,
    pub matched: Vec<MatchedRoute>,
}

impl ResolvedRoute {
    /// 目标路由（匹配链最后一项）
    pub fn leaf(&self) -> Option<&MatchedRoute> {
        self.matched.last()
    }

    /// 沿匹配链从父到子合并的元信息
    pub fn meta(&self) -> RouteMeta {
        self.matched
            .iter()
            .fold(RouteMeta::default(), |merged, m| merged.overlaid_with(&m.meta))
    }
}

/// 在路由树中查找与路径完全匹配的节点，返回匹配链
pub fn resolve(routes: &[NavigationNode], full_path: &str) -> Option<ResolvedRoute> {
    let target = normalize_path(full_path);
    let mut chain = Vec::new();
    if find_chain(routes, "", &target, &mut chain) {
        Some(ResolvedRoute {
            path: target,
            full_path: full_path.to_string(),
            matched: chain,
        })
    } else {
        None
    }
}

fn find_chain(
    routes: &[NavigationNode],
    parent_path: &str,
    target: &str,
    chain: &mut Vec<MatchedRoute>,
) -> bool {
    for route in routes {
        let full = join_path(parent_path, &route.path);
        chain.push(MatchedRoute {
            path: full.clone(),
            name: route.name.clone(),
            meta: route.meta.clone(),
            redirect: route.redirect.clone(),
            before_enter: route.before_enter,
        });

        if full == target || find_chain(&route.children, &full, target, chain) {
            return true;
        }
        chain.pop();
    }
    false
}

/// 生成面包屑：跳过无标题和 hideInBreadcrumb 的项，当前页不带路径
pub fn generate_breadcrumb(route: &ResolvedRoute) -> Vec<Breadcrumb> {
    route
        .matched
        .iter()
        .filter(|m| !m.meta.hide_in_breadcrumb)
        .filter_map(|m| {
            m.meta.title.as_ref().map(|title| Breadcrumb {
                name: title.clone(),
                path: if m.path == route.path {
                    None
                } else {
                    Some(m.path.clone())
                },
            })
        })
        .collect()
}

/// 页面标题
pub fn page_title(meta: &RouteMeta) -> String {
    let title = meta.title.as_deref().unwrap_or("管理系统");
    format!("{} - 通用管理系统", title)
}
