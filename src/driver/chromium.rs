//! Chrome/Chromium driver built on `chromiumoxide`.
//!
//! Bindings use the DevTools `Runtime.addBinding` command: the page gets a
//! global function that takes one string, and every call shows up on the
//! host as a `Runtime.bindingCalled` event. Injection is a plain
//! `Runtime.evaluate` of the bundled source.

use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::cdp::js_protocol::runtime::{AddBindingParams, EvaluateParams, EventBindingCalled};
use chromiumoxide::{Browser, BrowserConfig, Handler};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{BindingHandler, Environment, Launcher, Page};
use crate::config::BrowserSettings;
use crate::error::DriverError;

const BLANK_PAGE: &str = "about:blank";

fn protocol_error(err: impl std::fmt::Display) -> DriverError {
    DriverError::Protocol(err.to_string().into())
}

/// Launches a new Chrome process per call.
pub struct ChromiumLauncher {
    settings: BrowserSettings,
}

impl ChromiumLauncher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    fn browser_config(&self) -> Result<BrowserConfig, DriverError> {
        let mut builder = BrowserConfig::builder();
        if !self.settings.headless {
            builder = builder.with_head();
        }
        if !self.settings.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref executable) = self.settings.executable {
            builder = builder.chrome_executable(executable);
        }
        for arg in &self.settings.args {
            builder = builder.arg(arg.as_str());
        }
        builder.build().map_err(DriverError::Launch)
    }
}

#[async_trait]
impl Launcher for ChromiumLauncher {
    async fn launch(&self) -> Result<Arc<dyn Environment>, DriverError> {
        let config = self.browser_config()?;
        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;
        info!(
            "Launched browser (headless: {}, sandbox: {})",
            self.settings.headless, self.settings.sandbox
        );
        Ok(Arc::new(ChromiumEnvironment::new(browser, handler)))
    }
}

/// A running `chromiumoxide` browser and the task driving its connection.
///
/// Build one from a browser you launched yourself to share it across
/// several bridge calls; the bridge will never close it.
pub struct ChromiumEnvironment {
    browser: tokio::sync::Mutex<Browser>,
    handler_task: JoinHandle<()>,
}

impl ChromiumEnvironment {
    /// Takes over `browser` and spawns the task that polls its `handler`.
    pub fn new(browser: Browser, mut handler: Handler) -> Self {
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser connection handler stopped: {e}");
                    break;
                }
            }
        });
        Self {
            browser: tokio::sync::Mutex::new(browser),
            handler_task,
        }
    }
}

#[async_trait]
impl Environment for ChromiumEnvironment {
    async fn new_page(&self) -> Result<Arc<dyn Page>, DriverError> {
        if self.handler_task.is_finished() {
            return Err(DriverError::Closed);
        }
        let page = self
            .browser
            .lock()
            .await
            .new_page(BLANK_PAGE)
            .await
            .map_err(protocol_error)?;
        Ok(Arc::new(ChromiumPage::new(page)))
    }

    async fn close(&self) -> Result<(), DriverError> {
        let mut browser = self.browser.lock().await;
        browser.close().await.map_err(protocol_error)?;
        if let Err(e) = browser.wait().await {
            warn!("Failed to reap browser process: {e}");
        }
        self.handler_task.abort();
        info!("Browser closed");
        Ok(())
    }
}

impl Drop for ChromiumEnvironment {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

/// One page, plus the tasks forwarding its binding calls to the host.
pub struct ChromiumPage {
    page: chromiumoxide::Page,
    listeners: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl ChromiumPage {
    pub fn new(page: chromiumoxide::Page) -> Self {
        Self {
            page,
            listeners: parking_lot::Mutex::new(Vec::new()),
        }
    }

    fn stop_listeners(&self) {
        for listener in self.listeners.lock().drain(..) {
            listener.abort();
        }
    }
}

#[async_trait]
impl Page for ChromiumPage {
    async fn expose_binding(
        &self,
        name: &str,
        handler: BindingHandler,
    ) -> Result<(), DriverError> {
        // Subscribe before adding the binding so no early call is missed
        let mut calls = self
            .page
            .event_listener::<EventBindingCalled>()
            .await
            .map_err(protocol_error)?;
        self.page
            .execute(AddBindingParams::new(name))
            .await
            .map_err(protocol_error)?;

        let binding = name.to_string();
        let listener = tokio::spawn(async move {
            while let Some(call) = calls.next().await {
                if call.name == binding {
                    handler(call.payload.clone());
                }
            }
            debug!("Binding listener for {binding} ended");
        });
        self.listeners.lock().push(listener);
        debug!("Exposed binding {name}");
        Ok(())
    }

    async fn add_script(&self, content: &str) -> Result<(), DriverError> {
        self.page
            .evaluate_expression(EvaluateParams::new(content))
            .await
            .map_err(|e| DriverError::Evaluation(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.stop_listeners();
        self.page.clone().close().await.map_err(protocol_error)
    }
}

impl Drop for ChromiumPage {
    fn drop(&mut self) {
        self.stop_listeners();
    }
}
