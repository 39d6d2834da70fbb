//! Command logic, independent of the Telegram transport.
//!
//! Every operation returns a [`Reply`] describing what the user should see;
//! the `bot` module turns replies into Telegram messages.

use crate::config::{INLINE_RESULT_LIMIT, PYTHON_FILE_SUFFIX};
use crate::engine::{ObfuscationEngine, ObfuscationRequest};
use crate::session::SessionStore;
use std::sync::Arc;
use tracing::{error, info};

/// Static help text for `/start`
pub const HELP_TEXT: &str = "👋 Welcome to Python Obfuscator Bot\n\n\
Send your Python code or .py file to get it obfuscated!\n\
Commands:\n\
/start - Show this message\n\
/recursive [N] - Set recursion level (default 1)\n\
/imports - Toggle including imports\n\
/obfuscate - Run obfuscation";

/// Reply to a malformed `/recursive` argument
pub const RECURSIVE_USAGE: &str = "⚠️ Usage: /recursive 2";
/// Reply to a document without the `.py` suffix
pub const ONLY_PY_FILES: &str = "⚠️ Only .py files are allowed.";
/// Reply to `/obfuscate` without pending code
pub const NO_CODE: &str = "⚠️ No code to obfuscate.";
/// Acknowledgement for an accepted file
pub const FILE_RECEIVED: &str = "✅ Python file received. Use /obfuscate to process.";
/// Acknowledgement for accepted text
pub const CODE_RECEIVED: &str = "📝 Code received. Use /obfuscate to process.";

/// What the transport should send back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Plain text message
    Text(String),
    /// Python source shown inline as a fenced code block
    Code(String),
    /// Python source sent as a document attachment
    Document {
        /// Name the user sees
        file_name: String,
        /// File body
        content: String,
    },
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// Name of the attachment carrying a large result
#[must_use]
pub fn result_file_name(user_id: i64) -> String {
    format!("obfuscated_{user_id}.py")
}

/// Whether an uploaded document name is accepted
#[must_use]
pub fn is_python_file(file_name: Option<&str>) -> bool {
    file_name.is_some_and(|name| name.ends_with(PYTHON_FILE_SUFFIX))
}

/// Parse the `/recursive` argument; empty means the default of 1
#[must_use]
pub fn parse_recursion_level(arg: &str) -> Option<u32> {
    match arg.split_whitespace().next() {
        None => Some(1),
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|level| *level >= 1)
            .and_then(|level| u32::try_from(level).ok()),
    }
}

/// Chooses inline or file delivery for an obfuscated result
#[must_use]
pub fn route_result(user_id: i64, result: String) -> Reply {
    if result.chars().count() < INLINE_RESULT_LIMIT {
        Reply::Code(result)
    } else {
        Reply::Document {
            file_name: result_file_name(user_id),
            content: result,
        }
    }
}

/// Session-aware command logic shared by all handlers
#[derive(Clone)]
pub struct ObfuscatorService {
    sessions: Arc<dyn SessionStore>,
    engine: Arc<dyn ObfuscationEngine>,
}

impl ObfuscatorService {
    /// Create a service over the given store and engine
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionStore>, engine: Arc<dyn ObfuscationEngine>) -> Self {
        Self { sessions, engine }
    }

    /// Session store used by this service
    #[must_use]
    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// `/start`
    #[must_use]
    pub fn start(&self) -> Reply {
        Reply::text(HELP_TEXT)
    }

    /// `/recursive [N]`
    pub async fn set_recursive(&self, user_id: i64, arg: &str) -> Reply {
        let Some(level) = parse_recursion_level(arg) else {
            return Reply::text(RECURSIVE_USAGE);
        };
        self.sessions
            .update(user_id, Box::new(move |s| s.recursive = level))
            .await;
        info!(user_id, level, "Recursion level updated");
        Reply::text(format!("🔁 Recursive obfuscation level set to {level}"))
    }

    /// `/imports`
    pub async fn toggle_imports(&self, user_id: i64) -> Reply {
        let session = self
            .sessions
            .update(user_id, Box::new(|s| s.include_imports = !s.include_imports))
            .await;
        let status = if session.include_imports { "ON" } else { "OFF" };
        Reply::text(format!("📦 Include imports is now {status}"))
    }

    /// Store the contents of an uploaded `.py` file
    pub async fn ingest_file(&self, user_id: i64, code: String) -> Reply {
        info!(user_id, len = code.len(), "Python file received");
        self.sessions
            .update(user_id, Box::new(move |s| s.code = Some(code)))
            .await;
        Reply::text(FILE_RECEIVED)
    }

    /// Store a free-text message as code
    pub async fn ingest_text(&self, user_id: i64, text: String) -> Reply {
        self.sessions
            .update(user_id, Box::new(move |s| s.code = Some(text)))
            .await;
        Reply::text(CODE_RECEIVED)
    }

    /// `/obfuscate`
    pub async fn obfuscate(&self, user_id: i64) -> Reply {
        let session = self.sessions.get(user_id).await;
        let Some(code) = session.pending_code() else {
            return Reply::text(NO_CODE);
        };

        let result = match ObfuscationRequest::new(code, session.include_imports, session.recursive)
        {
            Ok(request) => self.engine.obfuscate(&request).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(output) => route_result(user_id, output),
            Err(e) => {
                error!(user_id, "Obfuscation error: {}", e);
                Reply::text(format!("❌ Obfuscation failed: {e}"))
            }
        }
    }
}
