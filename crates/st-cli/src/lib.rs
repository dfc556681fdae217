//! Screen time tracker CLI library.
//!
//! Argument parsing, configuration, platform probes and the command
//! implementations behind the `screentime` binary.

mod cli;
pub mod commands;
mod config;
pub mod platform;

pub use cli::{Action, ActionFlags, Cli};
pub use config::Config;
