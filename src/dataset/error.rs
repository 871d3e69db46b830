//! Dataset input errors

use thiserror::Error;

/// Errors raised while turning raw input into rows of labels.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Invalid label type at row {row}, position {position}: {kind} values cannot be used as categories")]
    InvalidLabelType {
        row: usize,
        position: usize,
        kind: &'static str,
    },

    #[error("Invalid row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },

    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid CSV delimiter {0:?}: must be a single ASCII character")]
    InvalidDelimiter(char),
}
