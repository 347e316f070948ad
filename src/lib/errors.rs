//! Custom error types for bamfq operations.

use thiserror::Error;

/// Result type alias for bamfq operations
pub type Result<T> = std::result::Result<T, BamfqError>;

/// Error type for bamfq operations
#[derive(Error, Debug)]
pub enum BamfqError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// File format error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "BAM", "FASTQ")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// The input header does not declare coordinate order
    #[error("Input is not sorted on coordinate, got: {found}")]
    NotCoordinateSorted {
        /// The sort order found in the header
        found: String,
    },

    /// The run was cancelled between two input records
    #[error("Pairing cancelled after {records_read} input records")]
    Cancelled {
        /// Number of input records consumed before cancellation was observed
        records_read: u64,
    },
}
