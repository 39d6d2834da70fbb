//! Per-user session state.
//!
//! Sessions hold the pending source code and the user's obfuscation
//! preferences. They live in memory only and are created lazily on first use.

use async_trait::async_trait;
use moka::future::Cache;
use std::time::Duration;

/// Transient state of one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Source code waiting for `/obfuscate`
    pub code: Option<String>,
    /// Recursion level forwarded to the engine, always at least 1
    pub recursive: u32,
    /// Whether the engine keeps import statements
    pub include_imports: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            code: None,
            recursive: 1,
            include_imports: false,
        }
    }
}

impl Session {
    /// Pending code, if any non-empty code has been received
    #[must_use]
    pub fn pending_code(&self) -> Option<&str> {
        self.code.as_deref().filter(|code| !code.is_empty())
    }
}

/// A mutation applied atomically to one session
pub type SessionUpdate = Box<dyn FnOnce(&mut Session) + Send>;

/// Interface for session stores
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current session of `user_id`, or the default one
    async fn get(&self, user_id: i64) -> Session;
    /// Replace the session of `user_id`
    async fn set(&self, user_id: i64, session: Session);
    /// Apply `update` to the session of `user_id` and return the result
    async fn update(&self, user_id: i64, update: SessionUpdate) -> Session;
    /// Forget the session of `user_id`
    async fn clear(&self, user_id: i64);
}

/// Session store backed by a concurrent in-memory cache
#[derive(Clone)]
pub struct InMemorySessionStore {
    cache: Cache<i64, Session>,
}

impl InMemorySessionStore {
    /// Store whose sessions live for the whole process
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().build(),
        }
    }

    /// Store that drops sessions after `idle` without access
    #[must_use]
    pub fn with_idle_timeout(idle: Duration) -> Self {
        Self {
            cache: Cache::builder().time_to_idle(idle).build(),
        }
    }

    /// Number of live sessions
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, user_id: i64) -> Session {
        self.cache.get(&user_id).await.unwrap_or_default()
    }

    async fn set(&self, user_id: i64, session: Session) {
        self.cache.insert(user_id, session).await;
    }

    async fn update(&self, user_id: i64, update: SessionUpdate) -> Session {
        // The upsert runs under the per-key lock, serialising updates for a user.
        self.cache
            .entry(user_id)
            .and_upsert_with(|existing| {
                let mut session = existing.map(|entry| entry.into_value()).unwrap_or_default();
                update(&mut session);
                std::future::ready(session)
            })
            .await
            .into_value()
    }

    async fn clear(&self, user_id: i64) {
        self.cache.invalidate(&user_id).await;
    }
}
