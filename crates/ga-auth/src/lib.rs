pub mod filter;
pub mod guard;
pub mod permissions;
pub mod routes;
pub mod session;
pub mod token;

// 重新导出核心类型
pub use filter::{filter_by_permission, visible_menu, PermissionFilter};
pub use guard::{GuardDecision, Navigation, NavigationGuard, RouteTarget, Router};
pub use permissions::{Permission, PermissionSet};
pub use routes::{
    default_auth_routes, generate_breadcrumb, navigation_from_records, page_title, resolve,
    Breadcrumb, GuardKind, NavigationNode, NodeId, ResolvedRoute, RouteMeta, RouteTable,
};
pub use session::{MainState, SessionGuard, SessionPolicy};
pub use token::{bearer_header, extract_token_from_header, is_token_expired, token_expiry};

// 错误类型
pub use ga_error::{GaError, Result};
