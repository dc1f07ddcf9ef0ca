//! The execution bridge.
//!
//! One call runs through these steps, each a suspension point:
//!
//! 1. validate the function source (nothing is acquired for bad input)
//! 2. acquire a context (borrowed browser or a freshly launched one, new page)
//! 3. install the resolve/reject bindings on the page
//! 4. register a result slot and package the entry module with its id
//! 5. stage and bundle the entry module
//! 6. inject the bundle while awaiting the result slot, jointly
//! 7. release the context, whatever happened above
//!
//! Outcomes are routed by request id through one [`PendingResults`] per
//! bridge, so concurrent calls may share a borrowed browser.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::bindings;
use crate::bundler::{self, Bundler};
use crate::channel::PendingResults;
use crate::config::Config;
use crate::context::ExecutionContext;
use crate::driver::{ChromiumLauncher, Environment, Launcher};
use crate::error::{BridgeError, Result};
use crate::packager::EntryModule;
use crate::script::JsFunction;

/// Runs JavaScript functions inside browser pages.
pub struct Bridge {
    launcher: Arc<dyn Launcher>,
    bundler: Arc<dyn Bundler>,
    pending: Arc<PendingResults>,
    staging_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl Bridge {
    pub fn new(launcher: Arc<dyn Launcher>, bundler: Arc<dyn Bundler>) -> Self {
        Self {
            launcher,
            bundler,
            pending: PendingResults::new(),
            staging_dir: None,
            timeout: None,
        }
    }

    /// Chromium launcher and bundler as described by `config`.
    pub fn from_config(config: &Config) -> Self {
        let mut bridge = Self::new(
            Arc::new(ChromiumLauncher::new(config.browser.clone())),
            bundler::from_settings(&config.bundler),
        );
        bridge.staging_dir = config.bridge.staging_dir.clone();
        bridge.timeout = config.bridge.timeout();
        info!("Bundler: {}", config.bundler.description());
        bridge
    }

    /// Bounds every call; the context is still released on expiry.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Runs `script` in a page of a browser launched for this call.
    pub async fn run(&self, script: &str) -> Result<Value> {
        self.execute(script, None).await
    }

    /// Runs `script` in a new page of `environment`.
    ///
    /// Only the page is closed afterwards; `environment` stays open.
    pub async fn run_in(&self, script: &str, environment: Arc<dyn Environment>) -> Result<Value> {
        self.execute(script, Some(environment)).await
    }

    /// Like [`Bridge::run`], decoding the result into `T`.
    pub async fn run_as<T: DeserializeOwned>(&self, script: &str) -> Result<T> {
        let value = self.run(script).await?;
        serde_json::from_value(value).map_err(BridgeError::Decode)
    }

    /// Runs `script`, in `existing` when given.
    pub async fn execute(
        &self,
        script: &str,
        existing: Option<Arc<dyn Environment>>,
    ) -> Result<Value> {
        let function = JsFunction::parse(script)?;
        let call = self.call(&function, existing);

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(BridgeError::Timeout(limit)),
            },
            None => call.await,
        };

        match &result {
            Ok(_) => info!("Sandbox call succeeded"),
            Err(e) => warn!("Sandbox call failed: {e}"),
        }
        result
    }

    async fn call(
        &self,
        function: &JsFunction,
        existing: Option<Arc<dyn Environment>>,
    ) -> Result<Value> {
        let context = ExecutionContext::acquire(self.launcher.as_ref(), existing).await?;
        let result = self.drive(&context, function).await;
        context.release().await;
        result
    }

    async fn drive(&self, context: &ExecutionContext, function: &JsFunction) -> Result<Value> {
        let page = context.page();
        bindings::install(page, &self.pending)
            .await
            .map_err(BridgeError::Setup)?;

        let registration = self.pending.register();
        let id = registration.id();
        debug!(%id, owned = context.is_owned(), "Bindings installed");

        let entry = EntryModule::new(function, id);
        let staged = entry.stage(self.staging_dir.as_deref()).await?;
        let source = self.bundler.bundle(staged.path()).await?;
        drop(staged);
        debug!(%id, "Entry module bundled ({} bytes)", source.len());

        // Evaluation returns before async work finishes, so the result must
        // be awaited alongside it rather than after it.
        let injection = async {
            page.add_script(&source)
                .await
                .map_err(BridgeError::Injection)
        };
        let (_, value) = tokio::try_join!(injection, registration.outcome())?;
        debug!(%id, "Request resolved");
        Ok(value)
    }
}

/// Runs `script` with the default configuration: headless Chrome and
/// `browserify`. Reuses `existing` instead of launching when given.
pub async fn run_in_sandbox(
    script: &str,
    existing: Option<Arc<dyn Environment>>,
) -> Result<Value> {
    Bridge::from_config(&Config::default())
        .execute(script, existing)
        .await
}
