//! Tracing setup.
//!
//! Log lines go to stderr through a writer that masks Telegram bot tokens, so
//! request URLs printed by teloxide on network errors never leak credentials.

use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting bot tokens
pub struct RedactionPatterns {
    url_token: Regex,
    bare_token: Regex,
    prefixed_token: Regex,
}

impl RedactionPatterns {
    /// Compile all patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            url_token: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            bare_token: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            prefixed_token: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
        })
    }

    /// Replace every token occurrence in `input`
    #[must_use]
    pub fn redact(&self, input: &str) -> String {
        let output = self
            .url_token
            .replace_all(input, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        let output = self
            .bare_token
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        self.prefixed_token
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string()
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length, the redacted text may differ in size.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
            patterns: self.patterns.clone(),
        }
    }
}

/// Install the global subscriber (`RUST_LOG`, default `info`)
pub fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
        patterns,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}
