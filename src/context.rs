//! Acquisition and release of the page a request runs in.
//!
//! A request either brings its own browser (borrowed) or gets one launched
//! for it (owned). Either way it gets a fresh page. Release closes the page
//! and, for owned browsers only, the browser. A context dropped without an
//! explicit release (the request future was cancelled) is cleaned up on a
//! spawned task.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::driver::{Environment, Launcher, Page};
use crate::error::{BridgeError, Result};

pub struct ExecutionContext {
    environment: Arc<dyn Environment>,
    page: Arc<dyn Page>,
    owned: bool,
    released: bool,
}

impl ExecutionContext {
    /// Reuses `existing` when given, otherwise launches a browser, then
    /// opens a page in it.
    pub async fn acquire(
        launcher: &dyn Launcher,
        existing: Option<Arc<dyn Environment>>,
    ) -> Result<Self> {
        let (environment, owned) = match existing {
            Some(environment) => (environment, false),
            None => (launcher.launch().await.map_err(BridgeError::Setup)?, true),
        };

        match environment.new_page().await {
            Ok(page) => {
                debug!(owned, "Execution context acquired");
                Ok(Self {
                    environment,
                    page,
                    owned,
                    released: false,
                })
            }
            Err(e) => {
                if owned {
                    close_environment(environment.as_ref()).await;
                }
                Err(BridgeError::Setup(e))
            }
        }
    }

    pub fn page(&self) -> &dyn Page {
        self.page.as_ref()
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Closes the page, and the browser when this context launched it.
    ///
    /// If this future is cancelled part-way, the drop path runs the
    /// teardown again.
    pub async fn release(mut self) {
        teardown(
            Arc::clone(&self.page),
            Arc::clone(&self.environment),
            self.owned,
        )
        .await;
        self.released = true;
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let page = Arc::clone(&self.page);
        let environment = Arc::clone(&self.environment);
        let owned = self.owned;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Execution context dropped before release, cleaning up");
                handle.spawn(teardown(page, environment, owned));
            }
            Err(_) => warn!("Execution context dropped outside a runtime; page left open"),
        }
    }
}

async fn teardown(page: Arc<dyn Page>, environment: Arc<dyn Environment>, owned: bool) {
    if let Err(e) = page.close().await {
        warn!("Failed to close page: {e}");
    }
    if owned {
        close_environment(environment.as_ref()).await;
    }
    debug!(owned, "Execution context released");
}

async fn close_environment(environment: &dyn Environment) {
    if let Err(e) = environment.close().await {
        warn!("Failed to close browser: {e}");
    }
}
