//! procsift library interface
//!
//! Exposes core modules for use by the binary and tests.

pub mod config;
pub mod engine;
pub mod hashing;
pub mod models;
pub mod normalizer;
pub mod output;
pub mod report;
pub mod reputation;
pub mod scanner;
pub mod utils;
pub mod whitelist;
