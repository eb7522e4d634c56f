//! Error types for nitrogl.
//!
//! Lookup misses are reported as `None` by the pools and caches. [`Error`]
//! is reserved for conditions a caller cannot treat as a plain miss: running
//! out of sampler ids, a uniform the linked program does not expose, shader
//! compilation failures, and so on.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced by the pools, the shader compositor and the GL layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A key or resource that was required to exist is absent.
    #[error("entry not found")]
    NotFound,

    /// A sampler tree has more nodes than two-digit traversal ids allow.
    #[error("too many samplers in one composition ({count}, max 100)")]
    TooManySamplers {
        /// Number of samplers reached when the limit was hit.
        count: usize,
    },

    /// The linked program has no active uniform with this (mangled) name.
    #[error("uniform location missing: {0}")]
    UniformLocationMissing(String),

    /// An index (gradient stop, sub-sampler, ...) is past the end.
    #[error("index {index} out of range (len {len})")]
    OutOfRange {
        /// The offending index.
        index: usize,
        /// The number of valid indices.
        len: usize,
    },

    /// Probing visited every slot without finding a free one.
    #[error("pool exhausted: no free slot along the probe sequence")]
    PoolExhausted,

    /// Shader compilation or program linking failed.
    #[error("shader error: {0}")]
    Shader(String),

    /// A GL object could not be created.
    #[error("GL error: {0}")]
    Gl(String),

    /// Image decoding failed.
    #[error("image error: {0}")]
    Image(String),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err.to_string())
    }
}

/// Error returned when a pool's internal invariants are violated.
///
/// Produced by the `check_invariants` methods on the pool and cache types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct InvariantError(String);

impl InvariantError {
    /// Creates a new `InvariantError` with the given description.
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    pub fn message(&self) -> &str {
        &self.0
    }
}
