#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Error types for the io module.
pub mod error;

/// High level functions to read color panoramas and depth maps.
pub mod functional;

pub use error::IoError;
