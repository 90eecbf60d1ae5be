//! Retention transformation.
//!
//! - `period`: period header → period index
//! - `matrix`: raw counts → % of baseline
//! - `reshape`: wide matrix ↔ long-form stream
//! - `views`: the four view projections
//! - `pipeline`: CSV → all of the above, with progress logs

pub mod matrix;
pub mod period;
pub mod pipeline;
pub mod reshape;
pub mod views;

pub use matrix::build_retention_matrix;
pub use period::{find_baseline, parse_period_columns, parse_period_label};
pub use reshape::{pivot, to_long_form, LongForm};
pub use views::{
    aggregate_by_period, default_trend_selection, matrix as matrix_view, select,
    single_cohort_series, trend_subset, AggregateView, MatrixView, SeriesView, TrendView, View,
    ViewRequest,
};
