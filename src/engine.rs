//! Adapter for the external obfuscation engine.
//!
//! The obfuscator itself (`BlankOBFv2`) is a Python class that lives outside
//! this crate. [`PythonEngine`] drives it in a child process; everything else
//! talks to the [`ObfuscationEngine`] trait.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Imports the engine module, runs one obfuscation and prints the result.
///
/// argv: engine dir, module name, include imports ("1"/"0"), recursion.
const DRIVER: &str = r#"
import importlib, sys
sys.path.insert(0, sys.argv[1])
engine = importlib.import_module(sys.argv[2])
source = sys.stdin.read()
try:
    result = engine.BlankOBFv2(source, sys.argv[3] == "1", int(sys.argv[4])).obfuscate()
except Exception as e:
    sys.stderr.write(str(e))
    sys.exit(2)
sys.stdout.write(result)
"#;

/// Exit code the driver uses after writing a caught exception to stderr
const ENGINE_FAILURE_EXIT: i32 = 2;

/// Human-readable failure text for a driver that exited unsuccessfully.
///
/// A caught engine exception is reported whole; anything else (an uncaught
/// traceback, e.g. a failed import) is reduced to its final line.
fn failure_message(exit_code: Option<i32>, stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        return match exit_code {
            Some(code) => format!("engine exited with code {code}"),
            None => "engine was terminated by a signal".to_string(),
        };
    }
    if exit_code == Some(ENGINE_FAILURE_EXIT) {
        return stderr.to_string();
    }
    stderr.lines().last().unwrap_or_default().trim().to_string()
}

/// Errors reported by an obfuscation attempt
#[derive(Error, Debug)]
pub enum ObfuscationError {
    /// The request carried a recursion level below 1
    #[error("Recursion length cannot be less than 1")]
    InvalidRecursion,
    /// The request carried no source code
    #[error("No code to obfuscate")]
    EmptyCode,
    /// The engine process could not be started or talked to
    #[error("Failed to run engine: {0}")]
    Spawn(#[from] std::io::Error),
    /// The engine ran and reported a failure
    #[error("{0}")]
    Engine(String),
    /// The engine produced output that is not UTF-8
    #[error("Engine output is not valid UTF-8: {0}")]
    Output(#[from] std::string::FromUtf8Error),
}

/// One obfuscation job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObfuscationRequest {
    code: String,
    include_imports: bool,
    recursion: u32,
}

impl ObfuscationRequest {
    /// Build a request, rejecting empty code and a recursion level below 1
    ///
    /// # Errors
    ///
    /// Returns [`ObfuscationError::EmptyCode`] or
    /// [`ObfuscationError::InvalidRecursion`].
    pub fn new(
        code: impl Into<String>,
        include_imports: bool,
        recursion: u32,
    ) -> Result<Self, ObfuscationError> {
        let code = code.into();
        if code.is_empty() {
            return Err(ObfuscationError::EmptyCode);
        }
        if recursion < 1 {
            return Err(ObfuscationError::InvalidRecursion);
        }
        Ok(Self {
            code,
            include_imports,
            recursion,
        })
    }

    /// Python source to transform
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Whether import statements are prepended to the output
    #[must_use]
    pub const fn include_imports(&self) -> bool {
        self.include_imports
    }

    /// Number of transformation passes
    #[must_use]
    pub const fn recursion(&self) -> u32 {
        self.recursion
    }
}

/// Interface for obfuscation engines
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObfuscationEngine: Send + Sync {
    /// Run one obfuscation and return the transformed source
    async fn obfuscate(&self, request: &ObfuscationRequest) -> Result<String, ObfuscationError>;
}

/// Runs `BlankOBFv2` through a Python interpreter
#[derive(Debug, Clone)]
pub struct PythonEngine {
    python_bin: String,
    engine_dir: PathBuf,
    module: String,
}

impl PythonEngine {
    /// Create an engine that imports `module` from `engine_dir`
    #[must_use]
    pub fn new(
        python_bin: impl Into<String>,
        engine_dir: impl Into<PathBuf>,
        module: impl Into<String>,
    ) -> Self {
        Self {
            python_bin: python_bin.into(),
            engine_dir: engine_dir.into(),
            module: module.into(),
        }
    }
}

#[async_trait]
impl ObfuscationEngine for PythonEngine {
    async fn obfuscate(&self, request: &ObfuscationRequest) -> Result<String, ObfuscationError> {
        debug!(
            python = %self.python_bin,
            module = %self.module,
            code_len = request.code().len(),
            include_imports = request.include_imports(),
            recursion = request.recursion(),
            "Spawning obfuscation engine"
        );

        let mut child = Command::new(&self.python_bin)
            .arg("-c")
            .arg(DRIVER)
            .arg(&self.engine_dir)
            .arg(&self.module)
            .arg(if request.include_imports() { "1" } else { "0" })
            .arg(request.recursion().to_string())
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Feed stdin concurrently so a driver that dies early cannot block us.
        let stdin = child.stdin.take();
        let source = request.code().to_owned();
        let writer = tokio::spawn(async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(source.as_bytes()).await?;
            }
            Ok::<(), std::io::Error>(())
        });

        let output = child.wait_with_output().await?;
        if let Ok(Err(e)) = writer.await {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(ObfuscationError::Spawn(e));
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = failure_message(output.status.code(), &stderr);
            return Err(ObfuscationError::Engine(message));
        }

        let result = String::from_utf8(output.stdout)?;
        info!(
            input_len = request.code().len(),
            output_len = result.len(),
            "Obfuscation finished"
        );
        Ok(result)
    }
}
