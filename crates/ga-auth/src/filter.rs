use ga_core::{KeyValueStore, StoreKey};
use std::sync::Arc;
use tracing::debug;

use crate::permissions::PermissionSet;
use crate::routes::NavigationNode;

/// 按权限过滤路由/菜单树，返回新的森林，输入不变
///
/// - 节点有权限要求且与当前权限不相交时，整棵子树被移除
/// - 原本有子节点、过滤后子节点为空且声明了 `hideWhenNoChildren` 的节点也被移除
/// - 保留下来的兄弟节点顺序不变
pub fn filter_by_permission(
    tree: &[NavigationNode],
    permissions: &PermissionSet,
) -> Vec<NavigationNode> {
    tree.iter()
        .filter_map(|node| filter_node(node, permissions))
        .collect()
}

fn filter_node(node: &NavigationNode, permissions: &PermissionSet) -> Option<NavigationNode> {
    if !permissions.has_permission(node.required_permissions()) {
        debug!(node = %node.id, "缺少权限，移除节点");
        return None;
    }

    let had_children = !node.children.is_empty();
    let children = filter_by_permission(&node.children, permissions);

    if had_children && children.is_empty() && node.hide_when_children_empty() {
        debug!(node = %node.id, "子节点全部被过滤，隐藏父节点");
        return None;
    }

    let mut kept = node.clone();
    kept.children = children;
    Some(kept)
}

/// 去掉 hideInMenu 的节点，得到侧边栏可见的菜单
pub fn visible_menu(tree: &[NavigationNode]) -> Vec<NavigationNode> {
    tree.iter()
        .filter(|node| !node.meta.hide_in_menu)
        .map(|node| {
            let mut kept = node.clone();
            kept.children = visible_menu(&node.children);
            kept
        })
        .collect()
}

/// 基于持久化权限列表的权限检查
///
/// 每次调用都从存储读取，不做缓存。
pub struct PermissionFilter {
    store: Arc<KeyValueStore>,
}

impl PermissionFilter {
    pub fn new(store: Arc<KeyValueStore>) -> Self {
        Self { store }
    }

    /// 当前用户的权限集合，不存在或格式不符时为空
    pub fn current_permissions(&self) -> PermissionSet {
        self.store
            .get::<PermissionSet>(StoreKey::PERMISSION_LIST)
            .unwrap_or_default()
    }

    /// 当前用户的角色列表
    pub fn current_roles(&self) -> Vec<String> {
        self.store
            .get::<Vec<String>>(StoreKey::USER_ROLES)
            .unwrap_or_default()
    }

    pub fn has_permission<I, S>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.current_permissions().has_permission(required)
    }

    /// 角色检查，要求为空时恒为真，拥有任一角色即可
    pub fn has_role<I, S>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roles = self.current_roles();
        let mut any_required = false;
        for role in required {
            any_required = true;
            if roles.iter().any(|r| r == role.as_ref()) {
                return true;
            }
        }
        !any_required
    }

    pub fn filter(&self, tree: &[NavigationNode]) -> Vec<NavigationNode> {
        filter_by_permission(tree, &self.current_permissions())
    }

    /// 权限过滤后再去掉隐藏项，用于渲染侧边栏
    pub fn menu(&self, tree: &[NavigationNode]) -> Vec<NavigationNode> {
        visible_menu(&self.filter(tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::Permission;
    use crate::routes::{default_auth_routes, NodeId};

    fn node(id: i64) -> NavigationNode {
        NavigationNode::new(NodeId::Num(id), &format!("/n{}", id))
    }

    fn ids(nodes: &[NavigationNode]) -> Vec<String> {
        nodes.iter().map(|n| n.id.to_string()).collect()
    }

    fn perms(list: &[&str]) -> PermissionSet {
        list.iter().copied().collect()
    }

    #[test]
    fn test_node_without_permission_is_removed_with_subtree() {
        let tree = vec![node(1)
            .permissions(&[Permission::ROLE_LIST])
            .child(node(2))
            .child(node(3))];

        let filtered = filter_by_permission(&tree, &perms(&[Permission::ADMIN_LIST]));
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_unrestricted_nodes_survive_empty_permissions() {
        let tree = vec![node(1), node(2).permissions(&[Permission::LOG_LIST]), node(3)];
        let filtered = filter_by_permission(&tree, &PermissionSet::new());
        assert_eq!(ids(&filtered), vec!["1", "3"]);
    }

    #[test]
    fn test_hide_when_children_empty() {
        let tree = vec![
            node(1)
                .hide_when_no_children()
                .child(node(11).permissions(&[Permission::ROLE_LIST])),
            node(2).child(node(21).permissions(&[Permission::ROLE_LIST])),
            node(3).hide_when_no_children(),
        ];

        let filtered = filter_by_permission(&tree, &PermissionSet::new());
        // 1 被隐藏；2 未声明隐藏，保留为空；3 原本就没有子节点
        assert_eq!(ids(&filtered), vec!["2", "3"]);
        assert!(filtered[0].children.is_empty());
    }

    #[test]
    fn test_sibling_order_preserved() {
        let tree = vec![node(1)
            .child(node(12))
            .child(node(10).permissions(&["x"]))
            .child(node(11))];
        let filtered = filter_by_permission(&tree, &PermissionSet::new());
        assert_eq!(ids(&filtered[0].children), vec!["12", "11"]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let table = default_auth_routes();
        let mut routes = table.routes.clone();
        routes[2].meta.hide_when_no_children = true;

        for granted in [
            perms(&[]),
            perms(&[Permission::AUTH_VIEW]),
            perms(&[Permission::AUTH_VIEW, Permission::ROLE_LIST]),
            perms(&Permission::all()),
        ] {
            let once = filter_by_permission(&routes, &granted);
            let twice = filter_by_permission(&once, &granted);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_input_tree_untouched() {
        let tree = vec![node(1).child(node(2).permissions(&["x"]))];
        let before = tree.clone();
        let _ = filter_by_permission(&tree, &PermissionSet::new());
        assert_eq!(tree, before);
    }

    #[test]
    fn test_visible_menu_drops_hidden() {
        let tree = vec![
            node(1).child(node(2).hide_in_menu()).child(node(3)),
            node(4).hide_in_menu(),
        ];
        let menu = visible_menu(&tree);
        assert_eq!(ids(&menu), vec!["1"]);
        assert_eq!(ids(&menu[0].children), vec!["3"]);
    }

    #[test]
    fn test_filter_reads_permissions_from_store() {
        let store = Arc::new(KeyValueStore::in_memory("test"));
        let filter = PermissionFilter::new(store.clone());
        assert!(filter.current_permissions().is_empty());
        assert!(!filter.has_permission([Permission::ROLE_LIST]));

        store.set(StoreKey::PERMISSION_LIST, &[Permission::AUTH_VIEW, Permission::ROLE_LIST]);
        assert!(filter.has_permission([Permission::ROLE_LIST]));

        let menu = filter.menu(&default_auth_routes().routes);
        let auth = menu.iter().find(|n| n.path == "/auth").unwrap();
        let titles: Vec<&str> = auth
            .children
            .iter()
            .filter_map(|c| c.meta.title.as_deref())
            .collect();
        assert_eq!(titles, vec!["权限总览", "角色管理", "个人资料"]);
        assert!(menu.iter().all(|n| n.path != "/adminLogin"));
    }

    #[test]
    fn test_malformed_permission_list_is_empty() {
        let store = Arc::new(KeyValueStore::in_memory("test"));
        store.set(StoreKey::PERMISSION_LIST, "system:role:list");
        let filter = PermissionFilter::new(store);
        assert!(filter.current_permissions().is_empty());
    }

    #[test]
    fn test_role_check() {
        let store = Arc::new(KeyValueStore::in_memory("test"));
        let filter = PermissionFilter::new(store.clone());
        assert!(filter.has_role(Vec::<String>::new()));
        assert!(!filter.has_role(["admin"]));

        store.set(StoreKey::USER_ROLES, &["editor", "admin"]);
        assert!(filter.has_role(["viewer", "admin"]));
        assert!(!filter.has_role(["viewer"]));
    }
}
