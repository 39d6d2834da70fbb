//! Interactive first-run setup.
//!
//! Asks for the bot token and admin id when the configuration file has none,
//! and optionally asks whether an existing file should be reused.

use crate::config::{BotConfig, ConfigError, ConfigStore};
use dialoguer::Input;
use thiserror::Error;
use tracing::info;

/// Errors raised during setup
#[derive(Error, Debug)]
pub enum SetupError {
    /// Loading or saving the configuration failed
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Reading from the terminal failed
    #[error("Prompt failed: {0}")]
    Prompt(String),
}

/// Source of answers for setup questions
pub trait Prompter {
    /// Ask a free-form question and return the trimmed answer
    ///
    /// # Errors
    ///
    /// Returns an error if the answer cannot be read.
    fn ask(&mut self, prompt: &str) -> Result<String, SetupError>;
}

/// Prompts on the controlling terminal
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&mut self, prompt: &str) -> Result<String, SetupError> {
        let answer: String = Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(|e| SetupError::Prompt(e.to_string()))?;
        Ok(answer.trim().to_string())
    }
}

/// Load the configuration, prompting for credentials when needed.
///
/// With `ask_reuse` set and a configuration file present, the user is asked
/// whether to keep it; any answer other than `y` asks for new credentials.
///
/// # Errors
///
/// Returns an error if the file cannot be read or written, or a prompt fails.
pub fn ensure_config(
    store: &ConfigStore,
    prompter: &mut dyn Prompter,
    ask_reuse: bool,
) -> Result<BotConfig, SetupError> {
    let mut config = store.load()?;

    if ask_reuse && store.exists() {
        let answer = prompter.ask("⚙️ Config found. Reuse config? [y/n]")?;
        if !answer.eq_ignore_ascii_case("y") {
            config = BotConfig::default();
        }
    }

    if config.is_first_run() {
        config.token = prompter.ask("📲 Enter your Telegram Bot Token")?;
        config.admin = prompter.ask("👤 Enter your Admin Telegram ID")?;
        store.save(&config)?;
        info!(path = %store.path().display(), "✅ Configuration saved!");
    }

    Ok(config)
}
