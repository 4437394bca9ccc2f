#![deny(missing_docs)]
//! Image containers for color panoramas and depth maps

/// image representation for the reconstruction pipeline.
pub mod image;

/// Error types for the image module.
pub mod error;

pub use crate::error::ImageError;
pub use crate::image::{ColorImage, DepthMap, Image, ImageSize};
