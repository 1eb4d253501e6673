//! Core of the dice bot: callback tokens, route parsing and the menu engine.
//!
//! Framework-agnostic. Redis, Postgres and Telegram live behind ports implemented in the
//! adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod groups;
pub mod ids;
pub mod kv;
pub mod logging;
pub mod menu;
pub mod messaging;
pub mod params;
pub mod route;
pub mod store;
pub mod tokens;

pub use errors::{Error, Result};
