use std::process::ExitCode;

use library_portal::{
    PortalState,
    config::{AppConfig, Env},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initializes logging, navigates to the requested path
/// (default `/author`) and, when that lands on the author table, prints the
/// authors as JSON.
#[tokio::main]
async fn main() -> ExitCode {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::FAILURE;
        }
    };

    // 2. Logging Filter Setup
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "library_portal=debug,reqwest=info".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
    }

    tracing::info!(
        backend = %config.backend_host,
        "library portal starting in {:?} mode",
        config.env
    );

    // 4. State Assembly
    let state = match PortalState::from_config(config) {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "failed to build HTTP client");
            return ExitCode::FAILURE;
        }
    };

    // 5. Navigation
    let path = std::env::args().nth(1).unwrap_or_else(|| "/author".to_string());
    let mut navigator = state.navigator();
    let landed = match navigator.navigate(&path).await {
        Ok(route) => route.clone(),
        Err(err) => {
            tracing::error!(path = %path, error = %err, "navigation failed");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(route = %landed.name, view = %landed.component, "rendering view");

    // 6. Author table view
    if landed.name == "authorTable" {
        if let Err(err) = state.authors.fetch_all().await {
            tracing::error!(error = %err, "could not load authors");
            return ExitCode::FAILURE;
        }
        match serde_json::to_string_pretty(&state.authors.snapshot()) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                tracing::error!(error = %err, "could not render authors");
                return ExitCode::FAILURE;
            }
        }
        match state.authors.can_manage().await {
            Ok(can_manage) => tracing::info!(can_manage, "management controls"),
            Err(err) => tracing::warn!(error = %err, "could not determine management rights"),
        }
    }

    ExitCode::SUCCESS
}
