use dotenvy::dotenv;
use pyobf_bot::bot;
use pyobf_bot::config::{ConfigStore, Settings};
use pyobf_bot::logging::{init_logging, RedactionPatterns};
use pyobf_bot::setup::{ensure_config, TerminalPrompter};
use pyobf_bot::utils::mask_token;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Compiled before the subscriber is installed
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);
    init_logging(patterns);

    info!("Starting Python Obfuscator Bot...");

    let settings = init_settings();

    let store = ConfigStore::new(&settings.config_path);
    let config = match ensure_config(&store, &mut TerminalPrompter, settings.ask_reuse_config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to prepare configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("📌 Bot Token: {}", mask_token(&config.token));
    info!("👤 Admin ID : {}", config.admin);

    bot::run_bot(settings, &config).await;

    Ok(())
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}
