mod parser;
mod properties;
mod writer;

pub use parser::*;
pub use properties::*;
pub use writer::*;

/// Error types for the PLY module.
#[derive(Debug, thiserror::Error)]
pub enum PlyError {
    /// Failed to read or write the PLY file
    #[error("Failed to read or write PLY file")]
    Io(#[from] std::io::Error),

    /// Malformed PLY header
    #[error("Malformed PLY header: {0}")]
    InvalidHeader(String),

    /// Unsupported PLY property
    #[error("Unsupported PLY property: {0}")]
    UnsupportedProperty(String),

    /// Malformed PLY body
    #[error("Malformed PLY data: {0}")]
    InvalidData(String),

    /// A vertex index does not fit the on-disk index type
    #[error("Vertex index {0} does not fit in a 32 bit PLY index")]
    IndexOverflow(usize),
}
