//! Shared utilities for eurodata
//!
//! Logging setup and small environment-variable helpers used by the
//! library configuration and the command-line host.

pub mod env;
pub mod logging;

pub use env::{env_flag, env_opt};
pub use logging::{LogFormat, init_tracing};
