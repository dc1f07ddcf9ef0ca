//! Code bundler collaborators.
//!
//! A bundler turns the staged entry module into one dependency-free script
//! the page can evaluate as-is. [`CommandBundler`] shells out to a real
//! bundler (`browserify` by default, which also shims Node globals such as
//! `Buffer`); [`PassthroughBundler`] skips resolution entirely.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::BundlerSettings;
use crate::error::BundleError;

#[async_trait]
pub trait Bundler: Send + Sync {
    /// Bundles the module at `entry` and returns injectable source.
    async fn bundle(&self, entry: &Path) -> Result<String, BundleError>;
}

/// Builds the bundler described by `settings`.
pub fn from_settings(settings: &BundlerSettings) -> Arc<dyn Bundler> {
    match settings {
        BundlerSettings::Command { program, args } => {
            Arc::new(CommandBundler::new(program.clone(), args.clone()))
        }
        BundlerSettings::Passthrough => Arc::new(PassthroughBundler),
    }
}

/// Runs `program args... <entry>` and takes its stdout as the bundle.
#[derive(Debug, Clone)]
pub struct CommandBundler {
    program: String,
    args: Vec<String>,
}

impl CommandBundler {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl Bundler for CommandBundler {
    async fn bundle(&self, entry: &Path) -> Result<String, BundleError> {
        debug!("Bundling {} with {}", entry.display(), self.program);
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(entry)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| BundleError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(BundleError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let bundle = String::from_utf8(output.stdout)?;
        debug!("Bundle ready: {} bytes", bundle.len());
        Ok(bundle)
    }
}

/// Returns the entry module unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughBundler;

#[async_trait]
impl Bundler for PassthroughBundler {
    async fn bundle(&self, entry: &Path) -> Result<String, BundleError> {
        Ok(tokio::fs::read_to_string(entry).await?)
    }
}
