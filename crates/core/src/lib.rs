//! Core types and utilities for the NGO staking price subsystem
//!
//! This crate provides shared types used across all components:
//! - Chain identifiers and price snapshots
//! - The watched-token reference table
//! - Swap quote types
//! - Configuration and error taxonomy

pub mod types;
pub mod tokens;
pub mod quotes;
pub mod config;
pub mod errors;

pub use types::*;
pub use tokens::*;
pub use quotes::*;
pub use config::*;
pub use errors::*;
