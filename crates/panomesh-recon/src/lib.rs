#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// 2D Delaunay triangulation helper.
pub mod delaunay;

mod error;
pub use error::ReconstructionError;

mod global;

/// Poisson surface reconstruction.
pub mod poisson;

/// Radial slice triangulation.
pub mod radial;

mod reconstructor;
pub use reconstructor::{Reconstruction, ReconstructionStrategy, Reconstructor};

pub use poisson::PoissonParams;
