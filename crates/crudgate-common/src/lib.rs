//! Crudgate Common Types and Utilities
//!
//! Shared types, configuration, dotted-path helpers and error handling for the
//! rule engine and the query compiler.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod path;
pub mod types;

pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use types::*;
