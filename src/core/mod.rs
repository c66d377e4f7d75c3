//! Core types shared by every layer: constants, configuration and errors.
//!
//! This module has no transport dependencies and is always compiled.

mod config;
mod constants;
mod error;

pub use config::*;
pub use constants::*;
pub use error::*;
