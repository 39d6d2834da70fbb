//! Command and message handlers.

use crate::bot::delivery::send_reply;
use crate::config::Settings;
use crate::service::{is_python_file, ObfuscatorService, Reply, ONLY_PY_FILES};
use crate::utils::{retry_telegram_operation, TempFile};
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::ChatAction;
use teloxide::utils::command::BotCommands;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the help message
    #[command(description = "Show the help message.")]
    Start,
    /// Set the recursion level, 1 when the argument is omitted
    #[command(description = "Set recursion level (default 1).")]
    Recursive(String),
    /// Flip whether imports are kept
    #[command(description = "Toggle including imports.")]
    Imports,
    /// Obfuscate the pending code
    #[command(description = "Run obfuscation.")]
    Obfuscate,
}

/// Telegram id of the sender, 0 for anonymous messages
#[must_use]
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Whether a text message should be treated as source code
#[must_use]
pub fn is_code_text(text: &str) -> bool {
    !text.starts_with('/')
}

/// Run `cmd` for the sender of `msg`
///
/// # Errors
///
/// Returns an error if the reply cannot be delivered.
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    service: Arc<ObfuscatorService>,
    settings: Arc<Settings>,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let reply = match cmd {
        Command::Start => service.start(),
        Command::Recursive(arg) => service.set_recursive(user_id, &arg).await,
        Command::Imports => service.toggle_imports(user_id).await,
        Command::Obfuscate => {
            bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;
            service.obfuscate(user_id).await
        }
    };
    send_reply(&bot, msg.chat.id, reply, &settings.temp_dir).await
}

/// Accept an uploaded `.py` document as the pending code
///
/// # Errors
///
/// Returns an error if the download, the read or the reply fails.
pub async fn handle_file(
    bot: Bot,
    msg: Message,
    service: Arc<ObfuscatorService>,
    settings: Arc<Settings>,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let doc = msg.document().ok_or_else(|| anyhow!("No document found"))?;

    if !is_python_file(doc.file_name.as_deref()) {
        warn!(user_id, file_name = ?doc.file_name, "Rejected non-Python upload");
        let reply = Reply::Text(ONLY_PY_FILES.to_string());
        return send_reply(&bot, msg.chat.id, reply, &settings.temp_dir).await;
    }

    let temp = TempFile::unique_in(&settings.temp_dir, &user_id.to_string(), "py");
    retry_telegram_operation(|| async {
        let file = bot.get_file(doc.file.id.clone()).await?;
        let mut dst = tokio::fs::File::create(temp.path()).await?;
        bot.download_file(&file.path, &mut dst).await?;
        dst.flush().await?;
        Ok(())
    })
    .await?;

    let code = tokio::fs::read_to_string(temp.path())
        .await
        .with_context(|| format!("reading upload {}", temp.path().display()))?;
    drop(temp);

    info!(
        user_id,
        file_name = ?doc.file_name,
        size = code.len(),
        "Downloaded document from Telegram"
    );

    let reply = service.ingest_file(user_id, code).await;
    send_reply(&bot, msg.chat.id, reply, &settings.temp_dir).await
}

/// Store a free-text message as the pending code
///
/// # Errors
///
/// Returns an error if the reply cannot be delivered.
pub async fn handle_text(
    bot: Bot,
    msg: Message,
    service: Arc<ObfuscatorService>,
    settings: Arc<Settings>,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let text = msg.text().ok_or_else(|| anyhow!("No text found"))?;
    let reply = service.ingest_text(user_id, text.to_string()).await;
    send_reply(&bot, msg.chat.id, reply, &settings.temp_dir).await
}
