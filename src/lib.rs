#![deny(missing_docs)]
//! pyobf-bot
//!
//! A Telegram bot that collects Python source code from users (pasted text or
//! uploaded `.py` files), runs it through the external `BlankOBFv2` obfuscator
//! and sends the result back inline or as a document.

/// Telegram transport: commands, routing and delivery
pub mod bot;
/// Runtime settings and the persistent bot configuration file
pub mod config;
/// Adapter for the external obfuscation engine
pub mod engine;
/// Tracing setup with token redaction
pub mod logging;
/// Transport-independent command logic
pub mod service;
/// Per-user session state
pub mod session;
/// Interactive first-run setup
pub mod setup;
pub mod utils;
