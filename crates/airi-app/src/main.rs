//! AIRI application binary - composition root.
//!
//! 1. Parse flags and load configuration (file, then env, then flags)
//! 2. Initialise logging; an unreadable config file is fatal
//! 3. Build the rule router, LLM client and session memory once
//! 4. Serve the axum API until Ctrl-C

mod cli;

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use airi_api::{start_server, AppState};
use airi_assistant::Assistant;
use airi_core::config::GeneralConfig;
use airi_core::AiriConfig;
use airi_llm::LlmClient;
use airi_memory::SessionMemory;
use airi_router::RuleRouter;

use crate::cli::CliArgs;

/// How often expired rows are removed from the durable memory store.
const MEMORY_PURGE_INTERVAL: Duration = Duration::from_secs(300);

fn init_tracing(general: &GeneralConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&general.log_level));
    if general.use_json_logs() {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Resolves on Ctrl-C (and SIGTERM on unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let config_exists = config_file.exists();
    let loaded = if config_exists {
        AiriConfig::load(&config_file).map(Some)
    } else {
        Ok(None)
    };
    let (mut config, load_error) = match loaded {
        Ok(found) => (found.unwrap_or_default(), None),
        Err(e) => (AiriConfig::default(), Some(e)),
    };
    config.apply_env_overrides();
    args.apply(&mut config);

    init_tracing(&config.general);
    // A broken file must not silently drop settings such as require_api_key.
    if let Some(e) = load_error {
        tracing::error!(path = %config_file.display(), error = %e, "Invalid configuration file");
        return Err(e.into());
    }
    tracing::info!("Starting {} v{}", config.general.app_name, env!("CARGO_PKG_VERSION"));
    if config_exists {
        tracing::info!(path = %config_file.display(), "Configuration loaded");
    } else {
        tracing::info!(path = %config_file.display(), "No configuration file; using defaults");
    }

    if config.llm.api_key().is_empty() {
        tracing::warn!(
            provider = config.llm.provider.as_str(),
            "No LLM API key configured; fallback requests will likely fail"
        );
    }
    if config.server.require_api_key && config.server.api_key.is_empty() {
        tracing::warn!("require_api_key is set but api_key is empty; all API requests will be rejected");
    }

    // Components, built once.
    let router = RuleRouter::from_config(&config.router);
    tracing::info!(rules = router.rules().len(), "Rule router ready");

    let llm = LlmClient::from_config(
        &config.llm,
        &config.general.app_name,
        config.memory.max_turns,
    )?;
    let memory = SessionMemory::from_config(&config.memory)?;

    if config.memory.persistent {
        let purger = memory.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(MEMORY_PURGE_INTERVAL);
            loop {
                ticker.tick().await;
                let removed = purger.purge_expired().await;
                if removed > 0 {
                    tracing::info!(removed, "Expired sessions purged");
                }
            }
        });
    }

    let assistant = Assistant::new(router, llm, memory, config.stream.token_delay());
    let state = AppState::new(&config, assistant);

    // API server.
    let host = config.server.host.clone();
    let port = config.server.port;
    if let Err(e) = start_server(&host, port, state, shutdown_signal()).await {
        tracing::error!(host = %host, port, error = %e, "API server failed");
        return Err(e.into());
    }

    Ok(())
}
