use ga_core::AppConfig;
use ga_error::{GaError, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::routes::{resolve, GuardKind, NavigationNode, ResolvedRoute, RouteMeta};
use crate::session::SessionGuard;

/// 守卫看到的目标路由
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteTarget {
    pub full_path: String,
    pub meta: RouteMeta,
}

impl RouteTarget {
    pub fn new(full_path: &str) -> Self {
        Self {
            full_path: full_path.to_string(),
            meta: RouteMeta::default(),
        }
    }
}

impl From<&ResolvedRoute> for RouteTarget {
    fn from(route: &ResolvedRoute) -> Self {
        Self {
            full_path: route.full_path.clone(),
            meta: route.meta(),
        }
    }
}

/// 守卫决策
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum GuardDecision {
    Admit,
    Redirect {
        path: String,
        /// 登录后跳回的原始路径
        #[serde(skip_serializing_if = "Option::is_none")]
        return_to: Option<String>,
    },
}

impl GuardDecision {
    pub fn is_admit(&self) -> bool {
        matches!(self, GuardDecision::Admit)
    }

    /// 重定向的完整地址，`return_to` 作为 `redirect` 查询参数
    pub fn location(&self) -> Option<String> {
        match self {
            GuardDecision::Admit => None,
            GuardDecision::Redirect {
                path,
                return_to: Some(original),
            } => Some(format!("{}?redirect={}", path, urlencoding::encode(original))),
            GuardDecision::Redirect { path, .. } => Some(path.clone()),
        }
    }
}

/// 导航守卫
pub struct NavigationGuard {
    session: Arc<SessionGuard>,
    login_path: String,
    home_path: String,
}

impl NavigationGuard {
    pub fn new(session: Arc<SessionGuard>, config: &AppConfig) -> Self {
        Self {
            session,
            login_path: config.login_path.clone(),
            home_path: config.home_path.clone(),
        }
    }

    pub fn session(&self) -> &Arc<SessionGuard> {
        &self.session
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    fn signed_in(&self) -> bool {
        self.session.is_authenticated() && self.session.is_session_active()
    }

    /// 需要登录的路由：放行前刷新会话，否则带上原路径跳转登录页
    pub fn require_auth(&self, target: &RouteTarget) -> GuardDecision {
        if self.signed_in() {
            self.session.refresh_session();
            GuardDecision::Admit
        } else {
            debug!(target = %target.full_path, "未登录，跳转登录页");
            GuardDecision::Redirect {
                path: self.login_path.clone(),
                return_to: Some(target.full_path.clone()),
            }
        }
    }

    /// 已登录用户访问登录页时跳转到首页
    pub fn redirect_if_authenticated(&self, target: &RouteTarget) -> GuardDecision {
        if self.signed_in() {
            debug!(target = %target.full_path, "已登录，跳转首页");
            GuardDecision::Redirect {
                path: self.home_path.clone(),
                return_to: None,
            }
        } else {
            GuardDecision::Admit
        }
    }

    pub fn check(&self, kind: GuardKind, target: &RouteTarget) -> GuardDecision {
        match kind {
            GuardKind::RequireAuth => self.require_auth(target),
            GuardKind::RedirectIfAuthenticated => self.redirect_if_authenticated(target),
        }
    }
}

/// 一次导航的最终结果
#[derive(Debug, Clone, PartialEq)]
pub struct Navigation {
    /// 最终到达的地址（含查询串）
    pub location: String,
    pub route: ResolvedRoute,
    /// 途经的重定向地址
    pub redirects: Vec<String>,
}

/// 路由器：路径解析 + 静态重定向 + 守卫
pub struct Router {
    routes: Vec<NavigationNode>,
    guard: NavigationGuard,
    not_found_path: Option<String>,
    max_redirects: usize,
}

impl Router {
    pub fn new(routes: Vec<NavigationNode>, guard: NavigationGuard) -> Self {
        Self {
            routes,
            guard,
            not_found_path: None,
            max_redirects: 8,
        }
    }

    /// 未匹配的路径跳转到该页面
    pub fn with_not_found(mut self, path: &str) -> Self {
        self.not_found_path = Some(path.to_string());
        self
    }

    pub fn routes(&self) -> &[NavigationNode] {
        &self.routes
    }

    pub fn guard(&self) -> &NavigationGuard {
        &self.guard
    }

    pub fn resolve(&self, full_path: &str) -> Option<ResolvedRoute> {
        resolve(&self.routes, full_path)
    }

    /// 路由守卫：先按合并后的元信息做全局检查（requiresAuth 优先于
    /// redirectIfAuthenticated），放行后再执行目标路由的独享守卫
    fn decide(&self, route: &ResolvedRoute) -> GuardDecision {
        let target = RouteTarget::from(route);
        let global = if target.meta.requires_auth == Some(true) {
            self.guard.require_auth(&target)
        } else if target.meta.redirect_if_authenticated == Some(true) {
            self.guard.redirect_if_authenticated(&target)
        } else {
            GuardDecision::Admit
        };
        if !global.is_admit() {
            return global;
        }
        match route.leaf().and_then(|leaf| leaf.before_enter) {
            Some(kind) => self.guard.check(kind, &target),
            None => GuardDecision::Admit,
        }
    }

    /// 导航到指定地址，依次处理静态重定向和守卫重定向
    pub fn navigate(&self, full_path: &str) -> Result<Navigation> {
        let mut location = full_path.to_string();
        let mut redirects = Vec::new();

        loop {
            if redirects.len() > self.max_redirects {
                return Err(GaError::InvalidRequest {
                    reason: format!("重定向次数过多: {}", redirects.join(" -> ")),
                });
            }

            let route = match self.resolve(&location) {
                Some(route) => route,
                None => match &self.not_found_path {
                    Some(not_found)
                        if self.resolve(not_found).is_some() && location != *not_found =>
                    {
                        redirects.push(not_found.clone());
                        location = not_found.clone();
                        continue;
                    }
                    _ => {
                        return Err(GaError::NotFound {
                            resource: format!("route: {}", location),
                        })
                    }
                },
            };

            if let Some(target) = route.leaf().and_then(|leaf| leaf.redirect.clone()) {
                redirects.push(target.clone());
                location = target;
                continue;
            }

            match self.decide(&route) {
                GuardDecision::Admit => {
                    return Ok(Navigation {
                        location,
                        route,
                        redirects,
                    })
                }
                redirect => {
                    let next = redirect.location().unwrap_or_default();
                    redirects.push(next.clone());
                    location = next;
                }
            }
        }
    }
}
