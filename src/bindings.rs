//! Host bindings that carry outcomes out of the page.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::channel::{Outcome, PendingResults};
use crate::descriptor::ErrorDescriptor;
use crate::driver::Page;
use crate::error::DriverError;
use crate::packager::{REJECT_BINDING, RESOLVE_BINDING};

#[derive(Deserialize)]
struct Envelope {
    id: Uuid,
}

#[derive(Deserialize)]
struct Resolved {
    // `undefined` results are dropped by JSON.stringify
    #[serde(default)]
    value: Value,
}

#[derive(Deserialize)]
struct Rejected {
    error: ErrorDescriptor,
}

/// Which binding a payload arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Resolve,
    Reject,
}

impl Binding {
    pub fn name(self) -> &'static str {
        match self {
            Self::Resolve => RESOLVE_BINDING,
            Self::Reject => REJECT_BINDING,
        }
    }
}

/// Exposes the resolve and reject bindings on `page`, both routing into
/// `pending`.
pub async fn install(page: &dyn Page, pending: &Arc<PendingResults>) -> Result<(), DriverError> {
    for binding in [Binding::Resolve, Binding::Reject] {
        let pending = Arc::clone(pending);
        page.expose_binding(
            binding.name(),
            Arc::new(move |payload: String| dispatch(&pending, binding, &payload)),
        )
        .await?;
    }
    Ok(())
}

/// Decodes one binding payload and settles the request it belongs to.
pub fn dispatch(pending: &PendingResults, binding: Binding, payload: &str) {
    let id = match serde_json::from_str::<Envelope>(payload) {
        Ok(envelope) => envelope.id,
        Err(e) => {
            error!(
                "Dropping {} payload without a request id: {e}",
                binding.name()
            );
            return;
        }
    };

    let outcome = match binding {
        Binding::Resolve => serde_json::from_str::<Resolved>(payload)
            .map(|resolved| Outcome::Resolved(resolved.value)),
        Binding::Reject => serde_json::from_str::<Rejected>(payload)
            .map(|rejected| Outcome::Rejected(rejected.error)),
    }
    .unwrap_or_else(|e| {
        warn!(%id, "Malformed {} payload: {e}", binding.name());
        Outcome::Malformed(format!("malformed {} payload: {e}", binding.name()))
    });

    if pending.settle(id, outcome) {
        debug!(%id, "Request settled via {}", binding.name());
    }
}
