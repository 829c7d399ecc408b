// Enforce zero-panic production code at compile time
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # Bootstrap Module
//!
//! The bootstrap crate sits **outside** the enterprise layers (domain,
//! application, infrastructure) and owns the process edge:
//!
//! - **Argument parsing**: the CLI contract and its validation
//! - **Configuration**: defaults, `PIPELINE_*` environment overrides,
//!   CLI-over-environment precedence
//! - **Signal handling**: SIGTERM/SIGINT/SIGHUP to graceful shutdown
//! - **Shutdown coordination**: the cancellation token every stage
//!   checks at batch boundaries
//! - **Exit codes**: sysexits internally, collapsed to the external
//!   `0`/`1` contract
//!
//! ## Architecture Position
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          BOOTSTRAP (this crate)             │
//! │  - Entry point concerns                     │
//! │  - CLI + configuration                      │
//! │  - Signals + shutdown                      │
//! └─────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────┐
//! │   APPLICATION / INFRASTRUCTURE (docpipe)    │
//! └─────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────┐
//! │        DOMAIN (docpipe-domain)              │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Bootstrap may depend on the lower layers; they never depend on it.

pub mod cli;
pub mod config;
pub mod exit_code;
pub mod shutdown;
pub mod signals;

pub use cli::CliArgs;
pub use config::{ConfigError, PipelineSettings, StepName};
pub use exit_code::ExitCode;
pub use shutdown::{CancellationToken, ShutdownCoordinator};
