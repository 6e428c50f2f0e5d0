//! Headless price ticker
//!
//! Formats the scheduler's state as log-friendly price rows

pub mod display;

pub use display::{format_change, format_price, format_row, format_state};
