//! Core types for the Atende AI secretary: errors, process configuration,
//! the inbound webhook envelope, per-clinic channel configuration, and the
//! trait seams shared across crates.

pub mod clinic;
pub mod config;
pub mod envelope;
pub mod error;
pub mod traits;

pub use error::AtendeError;
