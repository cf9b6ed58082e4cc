//! Command-line interface and orchestration for awesome-rank
//!
//! This module parses arguments, loads configuration, and wires the harvesting
//! pipeline in [`crate::harvest`] to a cache, an HTTP transport, and a progress bar.
//!
//! # Implementation Model
//!
//! ## Commands
//!
//! - **rank**: Load an awesome list (from a repository or a local file), harvest
//!   star counts for every repository it links to, and print the top entries
//! - **init**: Generate a default configuration file
//!
//! ## Execution Flow
//!
//! The `run` function parses command-line arguments using clap and routes to the
//! appropriate command handler. All output goes through a [`Host`], so the commands
//! can be driven in-process by tests.
//!
//! Configuration is read from `awesome-rank.toml` in the current directory (or the
//! path given with `--config`) and covers concurrency, backoff, timeouts, and the
//! service endpoints.

mod common;
mod config;
mod host;
mod init;
mod progress_reporter;
mod rank;
mod run;

pub use common::{ColorMode, LogLevel};
pub use config::Config;
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use progress_reporter::ProgressReporter;
pub use rank::{RankArgs, process_rank};
pub use run::run;
