//! Error types for the faktura-core library.

use thiserror::Error;

/// Errors related to invoice field extraction.
///
/// A field that could not be extracted is never an error; every output field
/// is optional. The variants here are contract violations by the caller.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Image dimensions handed to the template engine are unusable.
    #[error("invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// A region does not satisfy the normalized-box invariant.
    #[error("invalid region for {field}: {reason}")]
    InvalidRegion { field: String, reason: String },
}

/// Result type for the faktura library.
pub type Result<T> = std::result::Result<T, ExtractionError>;
