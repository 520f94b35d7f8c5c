//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod init;
pub mod migrate;
pub mod next_number;
pub mod validate;
