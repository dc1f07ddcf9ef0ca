//! Entry module generation.
//!
//! The caller's function is embedded verbatim into a small script that
//! calls it, awaits it, and reports the outcome through the two bindings.
//! Every report is a JSON string tagged with the request id, so the host
//! can route it to the right caller.

use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;
use uuid::Uuid;

use crate::error::{BridgeError, Result};
use crate::script::JsFunction;

/// Page global that receives `{ id, value }` on success.
pub const RESOLVE_BINDING: &str = "__pageBridgeResolve";

/// Page global that receives `{ id, error }` on failure.
pub const REJECT_BINDING: &str = "__pageBridgeReject";

const ENTRY_TEMPLATE: &str = r#"(function () {
  var requestId = "__REQUEST_ID__";

  // NaN and the infinities cross as null; functions, symbols, BigInts and
  // cyclic objects cross as their string form.
  function portable(value) {
    if (value === undefined) {
      return undefined;
    }
    try {
      if (JSON.stringify(value) !== undefined) {
        return value;
      }
    } catch (ignored) {}
    try {
      return String(value);
    } catch (ignored) {
      return undefined;
    }
  }

  function describe(error) {
    if (error === null || error === undefined) {
      return {};
    }
    return {
      name: portable(error.name),
      message: portable(error.message),
      stack: portable(error.stack),
      lineNumber: portable(error.lineNumber),
      columnNumber: portable(error.columnNumber),
      fileName: portable(error.fileName)
    };
  }

  function settle(binding, payload) {
    globalThis[binding](JSON.stringify(payload));
  }

  async function main() {
    var result;
    try {
      result = await (__FUNCTION__)();
    } catch (error) {
      settle("__REJECT__", { id: requestId, error: describe(error) });
      return;
    }
    try {
      settle("__RESOLVE__", { id: requestId, value: result });
    } catch (error) {
      // result is not JSON-serialisable
      settle("__REJECT__", { id: requestId, error: describe(error) });
    }
  }

  main();
})();
"#;

/// Generated script wrapping one function call.
#[derive(Debug, Clone)]
pub struct EntryModule {
    id: Uuid,
    source: String,
}

impl EntryModule {
    pub fn new(function: &JsFunction, id: Uuid) -> Self {
        let source = ENTRY_TEMPLATE
            .replace("__REQUEST_ID__", &id.to_string())
            .replace("__RESOLVE__", RESOLVE_BINDING)
            .replace("__REJECT__", REJECT_BINDING)
            // Last, so placeholders inside the function text stay untouched
            .replace("__FUNCTION__", function.source());
        Self { id, source }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Writes the module to a temporary `.js` file for the bundler.
    ///
    /// The file lives in `dir` (system temp dir when `None`) and is removed
    /// when the returned handle is dropped.
    pub async fn stage(&self, dir: Option<&Path>) -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("page-bridge-").suffix(".js");
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(BridgeError::Staging)?;

        tokio::fs::write(file.path(), &self.source)
            .await
            .map_err(BridgeError::Staging)?;
        debug!(id = %self.id, "Staged entry module at {}", file.path().display());
        Ok(file)
    }
}
