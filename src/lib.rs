//! Price Feeder Library
//!
//! Streaming exchange price providers for an on-chain oracle

pub mod config;
pub mod error;
pub mod oracle;
pub mod types;
