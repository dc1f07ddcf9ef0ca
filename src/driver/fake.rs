//! Scripted in-memory driver for tests.
//!
//! Instead of evaluating JavaScript, a [`FakePage`] reads the request id out
//! of the injected entry module and calls the bindings the way the real
//! module would, according to a [`Behavior`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{BindingHandler, Environment, Launcher, Page};
use crate::descriptor::ErrorDescriptor;
use crate::error::DriverError;
use crate::packager::{REJECT_BINDING, RESOLVE_BINDING};

/// What the page does once the entry module is injected.
#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    Resolve(Value),
    Reject(ErrorDescriptor),
    ResolveAfter(Duration, Value),
    ResolveTwice(Value, Value),
    /// Settles an unrelated id first, then this request.
    StrayThenResolve(Value),
    /// Resolves with the request id as a string.
    EchoRequestId,
    /// Evaluation itself throws.
    ThrowOnEvaluation(String),
    /// Never calls a binding.
    Silent,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    launches: AtomicUsize,
    pages_opened: AtomicUsize,
    pages_closed: AtomicUsize,
    environments_closed: AtomicUsize,
    scripts: Mutex<Vec<String>>,
}

impl Counters {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn pages_opened(&self) -> usize {
        self.pages_opened.load(Ordering::SeqCst)
    }

    pub fn pages_closed(&self) -> usize {
        self.pages_closed.load(Ordering::SeqCst)
    }

    pub fn environments_closed(&self) -> usize {
        self.environments_closed.load(Ordering::SeqCst)
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().clone()
    }
}

pub(crate) struct FakeLauncher {
    pub counters: Arc<Counters>,
    behavior: Behavior,
    fail_launch: bool,
    fail_new_page: bool,
}

impl FakeLauncher {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            behavior,
            fail_launch: false,
            fail_new_page: false,
        }
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn failing_pages(mut self) -> Self {
        self.fail_new_page = true;
        self
    }

    /// An environment sharing this launcher's counters, for borrowed use.
    pub fn environment(&self) -> Arc<FakeEnvironment> {
        Arc::new(FakeEnvironment {
            counters: Arc::clone(&self.counters),
            behavior: self.behavior.clone(),
            fail_new_page: self.fail_new_page,
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self) -> Result<Arc<dyn Environment>, DriverError> {
        if self.fail_launch {
            return Err(DriverError::Launch("no browser binary".to_string()));
        }
        self.counters.launches.fetch_add(1, Ordering::SeqCst);
        Ok(self.environment())
    }
}

pub(crate) struct FakeEnvironment {
    counters: Arc<Counters>,
    behavior: Behavior,
    fail_new_page: bool,
    closed: AtomicBool,
}

impl FakeEnvironment {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Environment for FakeEnvironment {
    async fn new_page(&self) -> Result<Arc<dyn Page>, DriverError> {
        if self.is_closed() {
            return Err(DriverError::Closed);
        }
        if self.fail_new_page {
            return Err(DriverError::Protocol("target crashed".into()));
        }
        self.counters.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakePage {
            counters: Arc::clone(&self.counters),
            behavior: self.behavior.clone(),
            bindings: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }))
    }

    async fn close(&self) -> Result<(), DriverError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(DriverError::Closed);
        }
        self.counters.environments_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub(crate) struct FakePage {
    counters: Arc<Counters>,
    behavior: Behavior,
    bindings: Mutex<HashMap<String, BindingHandler>>,
    closed: AtomicBool,
}

impl FakePage {
    fn binding(&self, name: &str) -> Result<BindingHandler, DriverError> {
        self.bindings
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| DriverError::Evaluation(format!("TypeError: {name} is not a function")))
    }
}

/// Pulls the request id out of a generated entry module.
fn request_id(source: &str) -> Option<Uuid> {
    const MARKER: &str = "var requestId = \"";
    let start = source.find(MARKER)? + MARKER.len();
    let end = start + source[start..].find('"')?;
    source[start..end].parse().ok()
}

#[async_trait]
impl Page for FakePage {
    async fn expose_binding(
        &self,
        name: &str,
        handler: BindingHandler,
    ) -> Result<(), DriverError> {
        self.bindings.lock().insert(name.to_string(), handler);
        Ok(())
    }

    async fn add_script(&self, content: &str) -> Result<(), DriverError> {
        self.counters.scripts.lock().push(content.to_string());
        let id = request_id(content)
            .ok_or_else(|| DriverError::Evaluation("SyntaxError: no entry module".to_string()))?;
        let resolve = |value: &Value| json!({ "id": id, "value": value }).to_string();

        match &self.behavior {
            Behavior::Resolve(value) => {
                let handler = self.binding(RESOLVE_BINDING)?;
                handler(resolve(value));
            }
            Behavior::Reject(descriptor) => {
                let handler = self.binding(REJECT_BINDING)?;
                handler(json!({ "id": id, "error": descriptor }).to_string());
            }
            Behavior::ResolveAfter(delay, value) => {
                let handler = self.binding(RESOLVE_BINDING)?;
                let payload = resolve(value);
                let delay = *delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    handler(payload);
                });
            }
            Behavior::ResolveTwice(first, second) => {
                let handler = self.binding(RESOLVE_BINDING)?;
                handler(resolve(first));
                handler(resolve(second));
            }
            Behavior::StrayThenResolve(value) => {
                let handler = self.binding(RESOLVE_BINDING)?;
                handler(json!({ "id": Uuid::new_v4(), "value": "stray" }).to_string());
                handler(resolve(value));
            }
            Behavior::EchoRequestId => {
                let handler = self.binding(RESOLVE_BINDING)?;
                handler(resolve(&json!(id.to_string())));
            }
            Behavior::ThrowOnEvaluation(message) => {
                return Err(DriverError::Evaluation(message.clone()));
            }
            Behavior::Silent => {}
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(DriverError::Closed);
        }
        self.counters.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
