//! Run a self-contained JavaScript function inside a headless browser page
//! and get back its return value, or a reconstruction of the error it threw.
//!
//! ```no_run
//! # async fn demo() -> Result<(), page_bridge::BridgeError> {
//! let agent = page_bridge::run_in_sandbox("() => navigator.userAgent", None).await?;
//! println!("{agent}");
//! # Ok(())
//! # }
//! ```
//!
//! The function must not capture host data: only its source text crosses
//! into the page. Values come back as JSON.

pub mod bindings;
pub mod bridge;
pub mod bundler;
pub mod channel;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod driver;
pub mod error;
pub mod packager;
pub mod script;

pub use bridge::{run_in_sandbox, Bridge};
pub use bundler::{Bundler, CommandBundler, PassthroughBundler};
pub use config::Config;
pub use descriptor::{ErrorDescriptor, SandboxError};
pub use driver::{ChromiumEnvironment, ChromiumLauncher, Environment, Launcher, Page};
pub use error::{BridgeError, BundleError, DriverError};
pub use script::JsFunction;
