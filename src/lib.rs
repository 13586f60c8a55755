//! Gator - a command-line RSS feed aggregator.
//!
//! Users register, follow RSS 2.0 feeds, and run `gator agg` to poll them.
//! Each polling cycle fetches the feed that has waited longest and stores
//! posts whose URL has not been seen before.

pub mod commands;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod feed;
pub mod logging;

pub use commands::{AppState, Command};
pub use config::Config;
pub use db::{Database, User, UserRepository};
pub use error::{GatorError, Result};
