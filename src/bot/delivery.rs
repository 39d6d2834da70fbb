//! Turns service [`Reply`] values into Telegram messages.
//!
//! Short results go out as a MarkdownV2 `python` code block. Large results are
//! written to a uniquely named file, sent as a document and removed again.

use crate::service::Reply;
use crate::utils::TempFile;
use anyhow::{Context, Result};
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, ParseMode};
use teloxide::utils::markdown;
use tracing::debug;

/// Wrap `code` in a fenced block labelled `python`
#[must_use]
pub fn fenced_python(code: &str) -> String {
    markdown::code_block_with_lang(code, "python")
}

/// Write `content` to a fresh file in `dir`, named after `file_name`.
///
/// The returned guard deletes the file when dropped.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub async fn write_result_file(dir: &Path, file_name: &str, content: &str) -> Result<TempFile> {
    let stem = file_name.strip_suffix(".py").unwrap_or(file_name);
    let temp = TempFile::unique_in(dir, stem, "py");
    tokio::fs::write(temp.path(), content)
        .await
        .with_context(|| format!("writing result to {}", temp.path().display()))?;
    Ok(temp)
}

/// Send `reply` to `chat_id`
///
/// # Errors
///
/// Returns an error if Telegram rejects the message or the result file
/// cannot be written.
pub async fn send_reply(bot: &Bot, chat_id: ChatId, reply: Reply, temp_dir: &Path) -> Result<()> {
    match reply {
        Reply::Text(text) => {
            bot.send_message(chat_id, text).await?;
        }
        Reply::Code(code) => {
            bot.send_message(chat_id, fenced_python(&code))
                .parse_mode(ParseMode::MarkdownV2)
                .await?;
        }
        Reply::Document { file_name, content } => {
            let temp = write_result_file(temp_dir, &file_name, &content).await?;
            debug!(path = %temp.path().display(), "Sending result as document");
            let document = InputFile::file(temp.path().to_path_buf()).file_name(file_name);
            bot.send_document(chat_id, document).await?;
            // `temp` is dropped here, or earlier on error, removing the file.
        }
    }
    Ok(())
}
