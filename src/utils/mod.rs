//! Utility modules for procsift
//!
//! Provides environment placeholder handling and time helpers.

pub mod path;
pub mod time;

pub use path::{expand_placeholders, EnvSnapshot, Generalizer};
pub use time::{now_timestamp_string, truncate_to_seconds};
