use ga_core::models::{LoginData, MenuEntry, Principal, Session, StoreKey};
use ga_core::{Clock, KeyValueStore};
use serde_json::Value;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// 会话不活跃超时策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// 未勾选"保持登录"时的超时时间（毫秒）
    pub inactivity_timeout_ms: i64,
    /// 勾选"保持登录"时的超时时间（毫秒）
    pub remember_me_timeout_ms: i64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            inactivity_timeout_ms: 2 * 60 * 60 * 1000,        // 2小时
            remember_me_timeout_ms: 7 * 24 * 60 * 60 * 1000, // 7天
        }
    }
}

impl SessionPolicy {
    pub fn threshold_ms(&self, remember_me: bool) -> i64 {
        if remember_me {
            self.remember_me_timeout_ms
        } else {
            self.inactivity_timeout_ms
        }
    }
}

/// 主状态：存储内容在内存中的镜像，每次保存时同步更新
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MainState {
    pub sys_admin: Option<Principal>,
    pub token: Option<String>,
    pub left_menu_list: Vec<MenuEntry>,
    pub permission_list: Vec<String>,
    pub active_path: Option<String>,
}

impl MainState {
    /// 从存储中加载初始状态
    pub fn load(store: &KeyValueStore) -> Self {
        Self {
            sys_admin: store.get(StoreKey::SYS_ADMIN),
            token: read_token(store),
            left_menu_list: store.get(StoreKey::LEFT_MENU_LIST).unwrap_or_default(),
            permission_list: store.get(StoreKey::PERMISSION_LIST).unwrap_or_default(),
            active_path: store
                .get::<String>(StoreKey::ACTIVE_PATH)
                .filter(|p| !p.is_empty()),
        }
    }
}

/// 存储中的上次活动时间
enum LastActivity {
    Missing,
    Invalid,
    At(i64),
}

fn read_token(store: &KeyValueStore) -> Option<String> {
    store
        .get::<String>(StoreKey::TOKEN)
        .filter(|t| !t.is_empty())
}

/// 会话守卫
///
/// 认证状态完全由存储推导：token 与用户信息同时存在即视为已登录，
/// 不校验 token 签名和过期声明，交给后端在下一次请求时判断。
pub struct SessionGuard {
    store: Arc<KeyValueStore>,
    clock: Arc<dyn Clock>,
    policy: SessionPolicy,
    state: RwLock<MainState>,
}

impl SessionGuard {
    pub fn new(store: Arc<KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_policy(store, clock, SessionPolicy::default())
    }

    pub fn with_policy(
        store: Arc<KeyValueStore>,
        clock: Arc<dyn Clock>,
        policy: SessionPolicy,
    ) -> Self {
        let state = MainState::load(&store);
        Self {
            store,
            clock,
            policy,
            state: RwLock::new(state),
        }
    }

    pub fn store(&self) -> &Arc<KeyValueStore> {
        &self.store
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    /// 内存状态快照
    pub fn state(&self) -> MainState {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn update_state(&self, f: impl FnOnce(&mut MainState)) {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut *state);
    }

    pub fn token(&self) -> Option<String> {
        read_token(&self.store)
    }

    pub fn current_user(&self) -> Option<Principal> {
        self.store.get(StoreKey::SYS_ADMIN)
    }

    /// 是否勾选了"保持登录"，兼容旧的字符串 "true"
    pub fn is_keep_logged_in(&self) -> bool {
        match self.store.get_value(StoreKey::KEEP_LOGGED_IN) {
            Some(Value::Bool(keep)) => keep,
            Some(Value::String(s)) => s == "true",
            _ => false,
        }
    }

    fn last_activity(&self) -> LastActivity {
        let Some(value) = self.store.get_value(StoreKey::LAST_ACTIVITY) else {
            return LastActivity::Missing;
        };
        let parsed = match &value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        parsed.map_or(LastActivity::Invalid, LastActivity::At)
    }

    /// 从存储重建完整的会话投影
    pub fn session(&self) -> Session {
        Session {
            token: self.token(),
            principal: self.current_user(),
            last_activity_epoch_ms: match self.last_activity() {
                LastActivity::At(ms) => Some(ms),
                _ => None,
            },
            remember_me: self.is_keep_logged_in(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        let authenticated = self.token().is_some() && self.current_user().is_some();
        debug!(authenticated, "检查认证状态");
        authenticated
    }

    /// 会话是否仍处于活跃期
    ///
    /// 没有活动记录时视为活跃并立即记录当前时间。
    pub fn is_session_active(&self) -> bool {
        let now = self.clock.now_ms();
        let last = match self.last_activity() {
            LastActivity::Missing => {
                self.stamp_activity(now);
                return true;
            }
            LastActivity::Invalid => {
                debug!("活动时间无法解析，视为不活跃");
                return false;
            }
            LastActivity::At(last) => last,
        };

        let threshold = self.policy.threshold_ms(self.is_keep_logged_in());
        let Some(elapsed) = now.checked_sub(last) else {
            debug!(last, "活动时间超出范围，视为不活跃");
            return false;
        };
        let active = elapsed < threshold;
        debug!(elapsed_ms = elapsed, threshold_ms = threshold, active, "检查会话活跃状态");
        active
    }

    /// 刷新会话：仅在"保持登录"且已认证时更新活动时间
    pub fn refresh_session(&self) {
        if self.is_keep_logged_in() && self.is_authenticated() {
            self.stamp_activity(self.clock.now_ms());
        }
    }

    fn stamp_activity(&self, now_ms: i64) {
        self.store.set(StoreKey::LAST_ACTIVITY, &now_ms);
    }

    /// 登出：逐个清除会话相关的键，并重置内存状态
    pub fn logout(&self) {
        for key in StoreKey::session_keys() {
            self.store.remove(key);
        }
        self.update_state(|state| *state = MainState::default());
        info!("用户已登出");
    }

    pub fn save_token(&self, token: &str) {
        self.store.set(StoreKey::TOKEN, token);
        self.update_state(|state| state.token = Some(token.to_string()));
    }

    pub fn save_principal(&self, principal: &Principal) {
        self.store.set(StoreKey::SYS_ADMIN, principal);
        self.update_state(|state| state.sys_admin = Some(principal.clone()));
    }

    pub fn save_menu_list(&self, menus: &[MenuEntry]) {
        self.store.set(StoreKey::LEFT_MENU_LIST, menus);
        self.update_state(|state| state.left_menu_list = menus.to_vec());
    }

    pub fn save_permission_list(&self, permissions: &[String]) {
        self.store.set(StoreKey::PERMISSION_LIST, permissions);
        self.update_state(|state| state.permission_list = permissions.to_vec());
    }

    pub fn save_active_path(&self, path: &str) {
        self.store.set(StoreKey::ACTIVE_PATH, path);
        self.update_state(|state| state.active_path = Some(path.to_string()));
    }

    pub fn set_keep_logged_in(&self, keep: bool) {
        self.store.set(StoreKey::KEEP_LOGGED_IN, &keep);
    }

    /// 登录成功后保存后端返回的数据并记录活动时间
    pub fn establish(&self, login: &LoginData, remember_me: bool) {
        self.save_token(&login.token);
        self.save_principal(&login.sys_admin);
        self.save_menu_list(&login.left_menu_list);
        self.save_permission_list(&login.permission_list);
        self.set_keep_logged_in(remember_me);
        self.stamp_activity(self.clock.now_ms());
        info!(
            user = login.sys_admin.display_name().unwrap_or("-"),
            remember_me, "登录会话已建立"
        );
    }
}
