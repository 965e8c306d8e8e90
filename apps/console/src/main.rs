use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use ga_auth::{
    default_auth_routes, generate_breadcrumb, page_title, NavigationGuard, PermissionFilter,
    RouteTable, Router, SessionGuard,
};
use ga_client::{ApiClient, RecordingNavigator, RequestOptions, TracingNotifier};
use ga_core::{
    build_tree, AppConfig, FileBackend, KeyValueStore, LoginData, SystemClock, TreeConfig,
};
use ga_error::{ErrorMetadataBuilder, GaError};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "ga-console")]
#[command(about = "通用管理系统会话与路由检查工具")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 模拟导航到指定路径，输出守卫决策
    Route {
        path: String,
    },

    /// 输出当前权限下可见的菜单
    Menu,

    /// 输出认证与会话状态
    Session,

    /// 用保存的登录响应建立会话
    Login {
        /// 登录响应 JSON 文件（token/sysAdmin/leftMenuList/permissionList）
        file: PathBuf,

        /// 保持登录
        #[arg(long)]
        remember: bool,
    },

    /// 登出并清除会话数据
    Logout,

    /// 将平铺 JSON 数组组装为树
    Tree {
        file: PathBuf,

        #[arg(long, default_value = "id")]
        id_field: String,

        #[arg(long, default_value = "parentId")]
        parent_field: String,

        #[arg(long, default_value = "children")]
        children_field: String,
    },

    /// 通过接口客户端发送 GET 请求
    Get {
        url: String,

        /// 不附带 token
        #[arg(long)]
        skip_token: bool,
    },
}

struct Console {
    config: AppConfig,
    store: Arc<KeyValueStore>,
    session: Arc<SessionGuard>,
    router: Router,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let command = command_name(&cli.command);
    let result = run(cli).await;

    if let Err(err) = &result {
        if let Some(ga_err) = err.downcast_ref::<GaError>() {
            let metadata = ErrorMetadataBuilder::new("console")
                .operation(command)
                .build(ga_err);
            ga_err.log(&metadata);
        }
    }
    result
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Route { .. } => "route",
        Commands::Menu => "menu",
        Commands::Session => "session",
        Commands::Login { .. } => "login",
        Commands::Logout => "logout",
        Commands::Tree { .. } => "tree",
        Commands::Get { .. } => "get",
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = build_console()?;

    match cli.command {
        Commands::Route { path } => route(&ctx, &path)?,
        Commands::Menu => menu(&ctx)?,
        Commands::Session => session(&ctx)?,
        Commands::Login { file, remember } => login(&ctx, &file, remember)?,
        Commands::Logout => {
            ctx.session.logout();
            print_json(&json!({"loggedOut": true}))?;
        }
        Commands::Tree {
            file,
            id_field,
            parent_field,
            children_field,
        } => {
            let config = TreeConfig::new(&id_field, &parent_field, &children_field);
            tree(&file, &config)?
        }
        Commands::Get { url, skip_token } => get(&ctx, &url, skip_token).await?,
    }
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_default();
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn build_console() -> anyhow::Result<Console> {
    let config = AppConfig::from_env()?;
    let store_path = config
        .store_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(".ga-store.json"));
    let store = Arc::new(KeyValueStore::new(
        Arc::new(FileBackend::new(&store_path)),
        config.namespace.clone(),
    ));
    info!(store = %store_path.display(), namespace = %config.namespace, "加载存储");

    let session = Arc::new(SessionGuard::new(store.clone(), Arc::new(SystemClock)));
    let guard = NavigationGuard::new(session.clone(), &config);
    let router = Router::new(load_routes()?.routes, guard).with_not_found("/error-404");

    Ok(Console {
        config,
        store,
        session,
        router,
    })
}

fn load_routes() -> anyhow::Result<RouteTable> {
    match std::env::var("GA_ROUTES") {
        Ok(path) if !path.is_empty() => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("读取路由文件失败: {}", path))?;
            let table = RouteTable::from_yaml_str(&raw)?;
            info!(path = %path, routes = table.routes.len(), "加载路由表");
            Ok(table)
        }
        _ => Ok(default_auth_routes()),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn route(ctx: &Console, path: &str) -> anyhow::Result<()> {
    let nav = ctx.router.navigate(path)?;
    if ctx.session.is_authenticated() {
        ctx.session.save_active_path(&nav.route.path);
    }
    print_json(&json!({
        "requested": path,
        "location": nav.location,
        "redirects": nav.redirects,
        "title": page_title(&nav.route.meta()),
        "breadcrumb": generate_breadcrumb(&nav.route),
    }))
}

fn menu(ctx: &Console) -> anyhow::Result<()> {
    let filter = PermissionFilter::new(ctx.store.clone());
    print_json(&filter.menu(ctx.router.routes()))
}

fn session(ctx: &Console) -> anyhow::Result<()> {
    let session = ctx.session.session();
    print_json(&json!({
        "authenticated": ctx.session.is_authenticated(),
        "active": ctx.session.is_session_active(),
        "rememberMe": session.remember_me,
        "lastActivity": session.last_activity_epoch_ms,
        "user": session.principal.as_ref().and_then(|p| p.display_name()),
        "activePath": ctx.session.state().active_path,
    }))
}

fn login(ctx: &Console, file: &Path, remember: bool) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("读取登录响应失败: {}", file.display()))?;
    let data: LoginData = serde_json::from_str(&raw)?;
    ctx.session.establish(&data, remember);
    print_json(&json!({
        "authenticated": ctx.session.is_authenticated(),
        "permissions": data.permission_list.len(),
        "menus": data.left_menu_list.len(),
    }))
}

fn tree(file: &Path, config: &TreeConfig) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("读取记录文件失败: {}", file.display()))?;
    let records: Vec<Value> = serde_json::from_str(&raw)?;
    print_json(&build_tree(&records, config))
}

async fn get(ctx: &Console, url: &str, skip_token: bool) -> anyhow::Result<()> {
    let navigator = Arc::new(RecordingNavigator::new());
    let client = ApiClient::new(
        ctx.config.clone(),
        ctx.store.clone(),
        Arc::new(TracingNotifier),
        navigator.clone(),
    )?;

    let mut options = RequestOptions::get(url);
    if skip_token {
        options = options.skip_token();
    }

    match client.request::<Value>(options).await {
        Ok(envelope) => print_json(&envelope),
        Err(err @ GaError::AuthDenied { .. }) => {
            client.await_pending_logout().await;
            print_json(&json!({
                "error": err.user_message(),
                "redirectedTo": navigator.visits(),
            }))
        }
        Err(err) => Err(err.into()),
    }
}
