#![doc(hidden)]

//! Core library for awesome-rank
//!
//! Ranks the repositories linked from an awesome list by their star counts.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration
//! - [`harvest`]: Link extraction, cached rate-limit-aware fetching, and ranking

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod commands;
pub mod harvest;

pub use crate::commands::{Host, run};
