//! Utility helpers: retries for Telegram file operations, transient file
//! guards and token masking.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;
use uuid::Uuid;

/// Retry a Telegram API operation with exponential backoff.
///
/// Meant for file operations (`get_file` + `download_file`) that may fail on
/// transient network errors. The first attempt is followed by up to 3 retries
/// (4 attempts in total). Delays start at 500ms, are capped at 4s and carry
/// jitter; see the constants in `config.rs`.
///
/// # Errors
///
/// Returns the last error if every attempt fails.
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    };

    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Telegram API operation failed after {} retries: {}",
            TELEGRAM_API_MAX_RETRIES, e
        );
        e
    })
}

/// A file on disk that is removed when the guard is dropped
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    /// Reserve a unique path `<dir>/<stem>_<uuid>.<ext>`; nothing is created yet
    #[must_use]
    pub fn unique_in(dir: &Path, stem: &str, ext: &str) -> Self {
        let id = Uuid::new_v4();
        Self {
            path: dir.join(format!("{stem}_{id}.{ext}")),
        }
    }

    /// Path guarded by this value
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "Failed to remove temp file: {e}"),
        }
    }
}

/// Shorten a bot token for display: first five and last five characters.
///
/// Tokens shorter than 10 characters are returned unchanged.
///
/// # Examples
///
/// ```
/// use pyobf_bot::utils::mask_token;
/// assert_eq!(mask_token("123456789:ABCDEFGHIJ"), "12345...FGHIJ");
/// assert_eq!(mask_token("short"), "short");
/// ```
#[must_use]
pub fn mask_token(token: &str) -> String {
    let count = token.chars().count();
    if count < 10 {
        return token.to_string();
    }
    let head: String = token.chars().take(5).collect();
    let tail: String = token.chars().skip(count - 5).collect();
    format!("{head}...{tail}")
}
