//! Switchboard binary - composition root.
//!
//! 1. Parse CLI args and load configuration from TOML
//! 2. Build the HTTP backend and chat session
//! 3. Write the config (`--write-config`), answer a single `--ask` prompt,
//!    or start the axum API server

mod cli;

use std::sync::Arc;

use clap::Parser;
use switchboard_api::{start_server, AppState};
use switchboard_chat::backend::HttpBackend;
use switchboard_chat::{Backend, ChatSession};
use switchboard_core::{Role, SwitchboardConfig};

use cli::CliArgs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing exists so its log level can apply.
    let config_file = args.resolve_config_path();
    let loaded = SwitchboardConfig::load(&config_file);
    let mut config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => SwitchboardConfig::default(),
    };

    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }
    config.general.port = args.resolve_port(config.general.port);
    if let Some(ref base_url) = args.base_url {
        config.endpoints.base_url = base_url.clone();
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Switchboard v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Ok(_) => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Err(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
    }
    tracing::info!(base_url = %config.endpoints.base_url, "Backend endpoints");

    if args.write_config {
        config.save(&config_file)?;
        return Ok(());
    }

    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::from_config(&config.dispatch)?);

    if let Some(prompt) = args.ask {
        let mut session = ChatSession::from_config(backend, &config);
        let entries = session.ask(&prompt).await?;
        for entry in &entries {
            match entry.role {
                Role::User => println!("> {}", entry.content),
                Role::Assistant => {
                    let source = entry.source.map(|s| s.as_str()).unwrap_or("switchboard");
                    println!("[{}] {}", source, entry.content);
                }
            }
        }
        return Ok(());
    }

    let state = AppState::new(config.clone(), backend);
    start_server(&config, state).await?;

    Ok(())
}
