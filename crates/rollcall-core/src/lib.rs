//! # rollcall-core
//!
//! Shared errors and logging for the rollcall attendance statistics tools.
//!
//! This crate provides:
//! - [`RollcallError`] - Configuration, filesystem and startup errors
//! - [`logging`] - Tracing setup and default log locations
//!
//! ## Example
//!
//! ```no_run
//! use rollcall_core::{logging, RollcallError};
//!
//! fn main() -> rollcall_core::Result<()> {
//!     let _guard = logging::init_logging(None, false)?;
//!
//!     let config_path = std::path::Path::new("/etc/rollcall/config.yaml");
//!     let _raw = std::fs::read_to_string(config_path)
//!         .map_err(|e| RollcallError::config_not_found_with_source(config_path, e))?;
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

pub use error::{Result, RollcallError};
pub use logging::{init_logging, LogGuard};
