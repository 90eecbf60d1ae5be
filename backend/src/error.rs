//! Error types for the retention pipeline.
//!
//! The hierarchy mirrors the pipeline stages:
//!
//! - [`CsvError`] - reading and decoding the uploaded file
//! - [`SchemaError`] - malformed or incomplete cohort table
//! - [`FormatError`] - a period header that cannot become a period index
//! - [`NotFoundError`] - a requested cohort absent from the data
//! - [`PipelineError`] - top-level orchestration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Conversions go through `From`, so `?` works across stage boundaries.
//! An undefined retention rate (zero baseline) is a value, not an error.

use thiserror::Error;

// =============================================================================
// CSV Loading Errors
// =============================================================================

/// Errors while reading the raw CSV bytes.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid CSV record.
    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(0);
        CsvError::Parse {
            line,
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Schema Errors
// =============================================================================

/// The cohort table is malformed or incomplete.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// Table has no data rows.
    #[error("Cohort table has no rows")]
    EmptyTable,

    /// Table has a cohort column but nothing to normalize.
    #[error("Cohort table has no period columns")]
    NoPeriodColumns,

    /// No column labelled as period 1.
    #[error("Missing baseline column (period 1)")]
    MissingBaseline,

    /// Requested cohort column is not in the header.
    #[error("Cohort column '{0}' not found")]
    MissingCohortColumn(String),

    /// Row width differs from the header.
    #[error("Row {row}: expected {expected} period values, found {found}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Count cell is not numeric.
    #[error("Row {row}, column '{column}' (value '{value}'): not a number")]
    InvalidCount {
        row: usize,
        column: String,
        value: String,
    },

    /// Row without a cohort identifier.
    #[error("Row {0}: empty cohort identifier")]
    EmptyCohort(usize),

    /// Same cohort identifier on two rows.
    #[error("Duplicate cohort '{0}'")]
    DuplicateCohort(String),
}

// =============================================================================
// Format Errors
// =============================================================================

/// A period header could not be turned into a period index.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    /// Header has no embedded integer.
    #[error("Period header '{0}' contains no integer")]
    NoPeriodIndex(String),

    /// Header parses to period 0.
    #[error("Period header '{0}' must be 1 or greater")]
    ZeroPeriod(String),

    /// Two headers parse to the same period index.
    #[error("Period headers '{first}' and '{second}' both map to period {index}")]
    DuplicatePeriod {
        index: u32,
        first: String,
        second: String,
    },
}

// =============================================================================
// Lookup Errors
// =============================================================================

/// A requested cohort identifier does not appear in the data.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Cohort not found: {0}")]
pub struct NotFoundError(pub String);

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// Returned by [`crate::retention::pipeline::run_file`] and friends.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV loading error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Schema error.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Period header error.
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Cohort lookup error.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload over the configured limit.
    #[error("Upload too large: {size} bytes (limit {limit})")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Invalid environment configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to bind or serve.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for schema checks.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for period header parsing.
pub type FormatResult<T> = Result<T, FormatError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
