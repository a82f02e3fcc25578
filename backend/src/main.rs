use backend::{build_rocket, config::Config, store::VoteStore};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[rocket::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    info!("🚀 Starting music vote server");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let store = match VoteStore::from_config(&config) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to set up {:?} vote store: {}", config.backend, e);
            std::process::exit(1);
        }
    };

    if let Some(message) = store.ensure_initialized().await {
        warn!("Starting without a reachable vote store: {}", message);
    }

    if store.reset_on_startup().await {
        info!(backend = store.backend_name(), "📋 Vote counts reset for this deployment");
    }

    if let Err(e) = build_rocket(store).launch().await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
