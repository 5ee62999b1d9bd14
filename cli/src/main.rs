use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing::debug;
use wishlist_auth::{
    AllauthClient, AuthError, AuthInfo, AuthStore, AuthView, ClientConfig, ClientKind, EventBridge, FileStorage, LoginRequest,
    Storage, User, UserCache, UserUpdated, use_auth_status, use_config, use_resolved_user,
};

const CACHE_FILE_NAME: &str = "wishlist-auth.json";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("pass --username or --email")]
    MissingIdentifier,
    #[error("not signed in")]
    NotSignedIn,
    #[error("auth configuration unavailable")]
    ConfigUnavailable,
    #[error("server rejected {action}: status {status}")]
    Rejected { action: &'static str, status: u16 },
}

#[derive(Parser, Debug)]
#[command(name = "wishlist-auth", about = "Wishlist session and account CLI")]
struct Cli {
    #[arg(long, env = "WISHLIST_BASE_URL")]
    base_url: Option<String>,

    /// allauth client flavour: `app` (session token) or `browser` (cookies).
    #[arg(long, env = "WISHLIST_AUTH_CLIENT")]
    client: Option<ClientKind>,

    #[arg(long, env = "WISHLIST_CACHE_FILE")]
    cache_file: Option<PathBuf>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the session and show the derived auth state.
    Status,
    /// Show the locally known user without contacting the server.
    Whoami,
    /// Show the auth configuration.
    Config,
    Login {
        #[arg(long, required_unless_present = "email")]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, env = "WISHLIST_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    Reauthenticate {
        #[arg(long, env = "WISHLIST_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Change the signed-in user's username.
    Rename { username: String },
    /// Drop the locally cached user.
    Forget,
}

struct CliContext {
    client: Arc<AllauthClient>,
    store: AuthStore,
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = resolve_config(ClientConfig::from_env()?, cli.base_url, cli.client, cli.cache_file);
    let ctx = connect(&config, cli.json)?;

    let _transitions = ctx.store.on_auth_change(|transition| {
        eprintln!("auth: {} (status {})", transition.event, transition.response.status);
    });
    let _renames = ctx.store.bridge().user_updated().subscribe(|update: &UserUpdated| {
        eprintln!("user: now {}", update.user.display_name());
    });

    let result = run(&ctx, cli.command).await;
    ctx.store.shutdown();
    result
}

/// Command-line flags override the environment.
fn resolve_config(
    mut config: ClientConfig,
    base_url: Option<String>,
    client: Option<ClientKind>,
    cache_file: Option<PathBuf>,
) -> ClientConfig {
    if let Some(base_url) = base_url {
        config.base_url = base_url.trim_end_matches('/').to_owned();
    }
    if let Some(client) = client {
        config.client_kind = client;
    }
    if cache_file.is_some() {
        config.cache_path = cache_file;
    }
    config
}

fn connect(config: &ClientConfig, json: bool) -> Result<CliContext, CliError> {
    let cache_path = config
        .cache_path
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join(CACHE_FILE_NAME));
    debug!(path = %cache_path.display(), api_root = %config.api_root(), "using local cache");

    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(cache_path));
    let bridge = EventBridge::new();
    let client = Arc::new(AllauthClient::new(config, Arc::clone(&storage), bridge.clone())?);
    let store = AuthStore::new(client.clone(), UserCache::with_default_key(storage), bridge);
    Ok(CliContext { client, store, json })
}

async fn run(ctx: &CliContext, command: Command) -> Result<(), CliError> {
    match command {
        Command::Whoami => {
            let resolved = use_resolved_user(Some(&ctx.store));
            let source = if resolved.is_cached() { "cache" } else { "session" };
            match resolved.user() {
                Some(user) if ctx.json => print_json(&json!({ "user": user, "source": source })),
                Some(user) => {
                    println!("{} (id {}, from {source})", user.display_name(), user.id);
                    Ok(())
                }
                None if ctx.json => print_json(&json!({ "user": null })),
                None => {
                    println!("anonymous");
                    Ok(())
                }
            }
        }
        Command::Forget => {
            ctx.store.update_user(None);
            println!("local user cleared");
            Ok(())
        }
        Command::Status => {
            ctx.store.load().await;
            print_status(ctx)
        }
        Command::Config => {
            ctx.store.load().await;
            let Some(config) = use_config(Some(&ctx.store)) else {
                return Err(CliError::ConfigUnavailable);
            };
            if ctx.json {
                return print_json(&serde_json::to_value(config.as_ref())?);
            }
            println!("config status {}", config.status);
            for provider in config.providers() {
                println!("  provider {} ({})", provider.id, provider.name);
            }
            Ok(())
        }
        Command::Login { username, email, password } => {
            if username.is_none() && email.is_none() {
                return Err(CliError::MissingIdentifier);
            }
            ctx.store.load().await;
            let response = ctx.client.login(&LoginRequest { username, email, password }).await?;
            // 401 here means a pending flow (MFA, email verification).
            expect_status("login", response.status, &[200, 401])?;
            print_status(ctx)
        }
        Command::Logout => {
            ctx.store.load().await;
            let response = ctx.client.logout().await?;
            expect_status("logout", response.status, &[401])?;
            print_status(ctx)
        }
        Command::Reauthenticate { password } => {
            ctx.store.load().await;
            let response = ctx.client.reauthenticate(&password).await?;
            expect_status("reauthentication", response.status, &[200])?;
            print_status(ctx)
        }
        Command::Rename { username } => {
            ctx.store.load().await;
            let Some(current) = ctx.store.user().filter(|_| ctx.store.is_authenticated()) else {
                return Err(CliError::NotSignedIn);
            };
            let profile = ctx.client.update_profile(&username, "").await?;
            expect_status("rename", profile.status, &[200])?;
            let renamed = User { username: profile.data.username.unwrap_or(username), ..current };
            ctx.store.update_user(Some(renamed));
            print_status(ctx)
        }
    }
}

/// Fail unless `status` is one of `accepted`.
fn expect_status(action: &'static str, status: u16, accepted: &[u16]) -> Result<(), CliError> {
    if accepted.contains(&status) {
        return Ok(());
    }
    Err(CliError::Rejected { action, status })
}

fn print_status(ctx: &CliContext) -> Result<(), CliError> {
    let (view, info) = use_auth_status(Some(&ctx.store));
    let report = status_report(&view, &info);
    if ctx.json {
        return print_json(&report);
    }
    match (&info.user, info.requires_reauthentication) {
        (Some(user), true) => println!("{} (reauthentication required)", user.display_name()),
        (Some(user), false) => println!("signed in as {}", user.display_name()),
        (None, _) if ctx.store.auth().is_failed() => println!("session unavailable"),
        (None, _) => println!("anonymous (status {})", view.status),
    }
    if let Some(flow) = &info.pending_flow {
        println!("pending flow: {}", flow.id);
    }
    Ok(())
}

fn status_report(view: &AuthView, info: &AuthInfo) -> Value {
    json!({
        "status": view.status,
        "is_authenticated": info.is_authenticated,
        "requires_reauthentication": info.requires_reauthentication,
        "user": info.user,
        "pending_flow": info.pending_flow.as_ref().map(|flow| flow.id.as_str()),
    })
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
