#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Pipeline configuration.
pub mod config;

/// Pipeline error taxonomy.
pub mod error;

mod pipeline;

pub use config::{PipelineConfig, StrategyKind};
pub use error::{PipelineError, ResourceError};
pub use pipeline::{DepthEstimator, Pipeline};

#[doc(inline)]
pub use panomesh_3d as geometry;

#[doc(inline)]
pub use panomesh_image as image;

#[doc(inline)]
pub use panomesh_io as io;

#[doc(inline)]
pub use panomesh_recon as recon;
