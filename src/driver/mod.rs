//! Automation driver abstraction.
//!
//! The bridge never talks to a browser directly. It needs three things:
//! something that can launch a browser ([`Launcher`]), a running browser
//! that can open pages ([`Environment`]), and a page that can expose host
//! callbacks and evaluate source ([`Page`]). [`chromium`] implements them
//! over the Chrome DevTools Protocol.

pub mod chromium;
#[cfg(test)]
pub(crate) mod fake;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DriverError;

pub use chromium::{ChromiumEnvironment, ChromiumLauncher, ChromiumPage};

/// Host callback exposed to the page. Receives the string the page passed.
pub type BindingHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Launches fresh browser environments.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn Environment>, DriverError>;
}

/// A running browser instance.
#[async_trait]
pub trait Environment: Send + Sync {
    /// Opens a new, empty page.
    async fn new_page(&self) -> Result<Arc<dyn Page>, DriverError>;

    /// Shuts the browser down. Pages still open are closed with it.
    async fn close(&self) -> Result<(), DriverError>;
}

/// A page inside an [`Environment`].
#[async_trait]
pub trait Page: Send + Sync {
    /// Makes `window[name](payload)` call `handler` on the host.
    ///
    /// The binding must be callable as soon as this returns.
    async fn expose_binding(&self, name: &str, handler: BindingHandler)
        -> Result<(), DriverError>;

    /// Evaluates `content` as a classic script in the page.
    ///
    /// Returns once evaluation finished; work the script scheduled
    /// asynchronously may still be running.
    async fn add_script(&self, content: &str) -> Result<(), DriverError>;

    async fn close(&self) -> Result<(), DriverError>;
}
