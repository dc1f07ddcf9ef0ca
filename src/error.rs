//! Error taxonomy for a bridge call.
//!
//! Every failure a caller can observe is a [`BridgeError`]. The variant tells
//! where the request stopped: before anything was acquired
//! ([`BridgeError::NotAFunction`]), while preparing the page
//! ([`BridgeError::Setup`], [`BridgeError::Staging`], [`BridgeError::Bundle`]),
//! while evaluating the bundle ([`BridgeError::Injection`]), or inside the
//! caller's own function ([`BridgeError::Script`]).

use std::time::Duration;

use thiserror::Error;

use crate::descriptor::SandboxError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = BridgeError> = core::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// The request was not function source. Raised before any browser work.
    #[error("script must be a function")]
    NotAFunction,

    /// Launching the browser, opening the page or installing the bindings failed.
    #[error("sandbox setup failed: {0}")]
    Setup(#[source] DriverError),

    /// The entry module could not be written to its staging file.
    #[error("failed to stage entry module: {0}")]
    Staging(#[source] std::io::Error),

    /// The bundler rejected the entry module.
    #[error(transparent)]
    Bundle(#[from] BundleError),

    /// The page could not evaluate the bundled source.
    #[error("injection failed: {0}")]
    Injection(#[source] DriverError),

    /// The function ran and threw (or rejected).
    #[error(transparent)]
    Script(#[from] SandboxError),

    /// A binding payload could not be routed or decoded.
    #[error("bridge protocol violation: {0}")]
    Protocol(String),

    #[error("sandbox call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The returned value did not match the type asked for by `run_as`.
    #[error("failed to decode sandbox result: {0}")]
    Decode(#[source] serde_json::Error),
}

impl BridgeError {
    /// Returns the reconstructed sandbox error when the function itself failed.
    pub fn as_script_error(&self) -> Option<&SandboxError> {
        match self {
            Self::Script(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure reported by an automation driver.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// Low-level protocol or transport error from the driver backend.
    #[error("browser protocol error: {0}")]
    Protocol(#[source] BoxError),

    /// The page threw while evaluating injected source.
    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    #[error("browser environment is closed")]
    Closed,
}

/// Failure reported by a [`Bundler`](crate::bundler::Bundler).
#[derive(Error, Debug)]
pub enum BundleError {
    #[error("failed to run bundler `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("bundler `{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("failed to read bundle input: {0}")]
    Io(#[from] std::io::Error),

    #[error("bundler output is not valid UTF-8")]
    InvalidOutput(#[from] std::string::FromUtf8Error),
}
