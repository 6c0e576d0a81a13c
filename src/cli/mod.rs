//! Command line interface module
//!
//! This module provides argument parsing, the validated run configuration and the runner
//! that publishes the declared images and resolves the template.

pub mod args;
pub mod config;
pub mod runner;

pub use args::Args;
pub use config::ResolverConfig;
pub use runner::Runner;
