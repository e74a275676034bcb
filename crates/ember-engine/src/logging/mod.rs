//! Logging setup.
//!
//! The engine itself only talks to the `log` facade. Applications call
//! [`init_logging`] once near the top of `main` to install `env_logger`.

mod init;

pub use init::{DEFAULT_FILTER, LoggingConfig, init_logging};
