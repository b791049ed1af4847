//! Types shared by every crate in the formatting server workspace.
//!
//! ## Architecture
//!
//! - **common** (this crate): error plumbing shared across layers
//! - **format-core**: session lifecycle, HTTP surface and engine adapters
//! - **format-server**: process wiring (config, logging, startup)

pub mod error;

pub use error::error_location::ErrorLocation;

#[cfg(test)]
mod tests;
