//! Error types for pdfstrata layout reconstruction.

use thiserror::Error;

use crate::marker::ObjectId;

/// Primary error type for layout reconstruction.
///
/// Every variant is fatal to a run. The one recoverable anomaly (a
/// decompressed size smaller than the compressed span) is clamped in
/// place and never surfaces here.
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("\"%PDF-x.y\" header could not be found, not a PDF file")]
    HeaderNotFound,

    #[error("structural inconsistency at offset {offset}: {msg}")]
    StructuralInconsistency { offset: u64, msg: String },

    #[error("{what} ({count}) reached the complexity ceiling of {ceiling}; use force to override")]
    ComplexityExceeded {
        what: &'static str,
        count: usize,
        ceiling: usize,
    },

    #[error("decompression of object {object} failed: {reason}")]
    ExternalToolFailure { object: ObjectId, reason: String },

    #[error("more than one /Linearized dictionary found ({0})")]
    MultipleLinearizationDictionaries(usize),

    #[error(
        "number of \"%%EOF\" ({eofs}) does not match number of \"startxref\" ({startxrefs}), possibly a hybrid-reference file"
    )]
    UnbalancedEndOfFileMarkers { eofs: usize, startxrefs: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LayoutError {
    pub(crate) fn structure(offset: u64, msg: impl Into<String>) -> Self {
        Self::StructuralInconsistency {
            offset,
            msg: msg.into(),
        }
    }

    pub(crate) fn tool(object: ObjectId, reason: impl Into<String>) -> Self {
        Self::ExternalToolFailure {
            object,
            reason: reason.into(),
        }
    }
}

/// Convenience Result type alias for LayoutError.
pub type Result<T> = std::result::Result<T, LayoutError>;
