//! IPMI protocol implementation for chassis fan controllers.
//!
//! This module contains the raw command constants, builders and the
//! credential masking used when command lines are logged.

pub mod commands;

pub use commands::*;
