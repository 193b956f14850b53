//! CLI command implementations.

pub mod common;
pub mod config;
pub mod cruises;
pub mod locations;
pub mod position;
