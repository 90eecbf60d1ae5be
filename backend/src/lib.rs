//! # Cohort retention analysis
//!
//! Turns a cohort × period count table into retention rates and the views a
//! dashboard draws from them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV File   │────▶│   Loader    │────▶│  Retention  │────▶│  Long-form  │────▶│    Views    │
//! │ (ISO/UTF8)  │     │  (schema)   │     │   matrix    │     │   stream    │     │ (4 shapes)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cohort_retention::{run_file, PipelineOptions, ViewRequest};
//! use std::path::Path;
//!
//! let run = run_file(Path::new("cohorts.csv"), &PipelineOptions::default()).unwrap();
//! let aggregate = run.view(&ViewRequest::AggregateByPeriod).unwrap();
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error hierarchy
//! - [`models`] - Tables, rates, records
//! - [`parser`] - CSV reading with auto-detection
//! - [`retention`] - Matrix builder, reshaper, views, pipeline
//! - [`config`] - Defaults and environment overrides
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Retention transformation
pub mod retention;

// Configuration
pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CsvError, FormatError, NotFoundError, PipelineError, SchemaError, ServerError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    AggregatePoint, CohortId, CohortRow, PeriodColumn, PeriodIndex, Rate, RawCohortTable,
    RetentionGrid, RetentionMatrix, RetentionRecord, RetentionRow,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes, parse_bytes_auto,
    parse_csv_file, parse_csv_file_auto, parse_str, ParseResult,
};

// =============================================================================
// Re-exports - Retention
// =============================================================================

pub use retention::{
    aggregate_by_period, build_retention_matrix, parse_period_label, pivot, select,
    single_cohort_series, to_long_form, trend_subset, LongForm, View, ViewRequest,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use retention::pipeline::{
    compute, run_bytes, run_file, run_parsed, CsvInfo, Dashboard, PipelineOptions,
    RetentionRun, Selection,
};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, UploadResponse, UploadSelection};
pub use config::ServerConfig;

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
