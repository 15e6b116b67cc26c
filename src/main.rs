use std::sync::Arc;

use tracing::{error, info, warn};

use gatehouse::web::SessionStore;
use gatehouse::{
    AppState, Config, PasswordStore, ServiceAccountManager, StaticPermissionResolver, WebServer,
};

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {CONFIG_PATH}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    // Initialize logging
    if let Err(e) = gatehouse::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        gatehouse::logging::init_console_only(&config.logging.level);
    }

    info!("Gatehouse starting");
    info!(
        "Server configured on {}:{}",
        config.server.host, config.server.port
    );

    if let Err(e) = run(config).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> gatehouse::Result<()> {
    let users = Arc::new(PasswordStore::open(config.store.users_path())?);
    info!(location = %users.location(), "User store loaded");

    let service_account_store =
        Arc::new(PasswordStore::open(config.store.service_accounts_path())?);
    info!(location = %service_account_store.location(), "Service account store loaded");

    let resolver = Arc::new(StaticPermissionResolver::from_config(&config.permissions)?);

    let service_accounts = Arc::new(
        ServiceAccountManager::new(service_account_store).with_resolver(resolver.clone()),
    );
    let report = service_accounts.import_provisioning_dir(&config.store.provisioning_path())?;
    info!(
        provisioned = report.provisioned.len(),
        removed = report.removed.len(),
        "Service account provisioning done"
    );
    for file in &report.failed {
        warn!(file = %file.display(), "Provisioning file was skipped");
    }

    let sessions = Arc::new(SessionStore::from_config(&config.session));
    let state = AppState::new(users, service_accounts, sessions, resolver);

    WebServer::new(&config.server, state)?.run().await
}
