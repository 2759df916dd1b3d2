//! Stub receptor node. Serves the work control protocol on a Unix socket
//! and runs submitted units with configurable in-process workers.

pub mod config;
pub mod daemon;
pub mod units;
pub mod utils;
pub mod worker;

pub use config::{StubConfig, WorkerConfig, WorkerKind};
pub use daemon::{
    Daemon,
    serve::{ServeHandle, serve, serve_with_config},
};
pub use worker::Outcome;
