//! High-level pipeline API: CSV in, retention views out.
//!
//! Combines every step:
//! loading, schema validation, normalization, reshaping and view selection.
//! Each run owns its table; nothing is shared or cached between runs.
//!
//! # Example
//!
//! ```rust,ignore
//! use cohort_retention::retention::pipeline::{run_file, PipelineOptions, Selection};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let run = run_file(Path::new("cohorts.csv"), &PipelineOptions::default())?;
//!     let dashboard = run.dashboard(&Selection::default())?;
//!
//!     println!("{} cohorts, {} periods", dashboard.cohorts.len(), dashboard.aggregate.len());
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use super::matrix::build_retention_matrix;
use super::reshape::{to_long_form, LongForm};
use super::views::{self, View, ViewRequest};
use crate::api::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::config::DEFAULT_TREND_COHORTS;
use crate::error::PipelineResult;
use crate::models::{
    AggregatePoint, CohortId, RawCohortTable, RetentionGrid, RetentionMatrix, RetentionRecord,
};
use crate::parser::{parse_bytes, parse_csv_file, ParseResult};

/// Options for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOptions {
    /// Cohort identifier column; the first column when unset
    pub cohort_column: Option<String>,

    /// CSV delimiter; auto-detected when unset
    pub delimiter: Option<char>,

    /// Size of the default trend selection
    pub default_trend_cohorts: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            cohort_column: None,
            delimiter: None,
            default_trend_cohorts: DEFAULT_TREND_COHORTS,
        }
    }
}

/// CSV file information
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

/// Everything derived from one uploaded table.
#[derive(Debug, Clone)]
pub struct RetentionRun {
    pub csv_info: CsvInfo,
    pub table: RawCohortTable,
    pub matrix: RetentionMatrix,
    pub stream: LongForm,
    default_trend_cohorts: usize,
}

/// Caller's selection for the trend and single-cohort views.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// Trend cohorts; the first N cohorts when unset
    pub trend: Option<Vec<CohortId>>,

    /// Single-cohort series; the first cohort when unset
    pub series: Option<CohortId>,
}

/// All four views for one selection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub cohorts: Vec<CohortId>,
    pub selected_cohorts: Vec<CohortId>,
    pub series_cohort: Option<CohortId>,
    pub matrix: RetentionGrid,
    pub trend: Vec<RetentionRecord>,
    pub series: Vec<RetentionRecord>,
    pub aggregate: Vec<AggregatePoint>,
    pub undefined_cells: usize,
}

/// Run the pipeline on a CSV file.
pub fn run_file(path: &Path, options: &PipelineOptions) -> PipelineResult<RetentionRun> {
    log_info(format!("📖 Reading {}...", path.display()));
    let parse_result = parse_csv_file(path, options.delimiter)?;
    run_parsed(parse_result, options)
}

/// Run the pipeline on uploaded CSV bytes.
pub fn run_bytes(bytes: &[u8], options: &PipelineOptions) -> PipelineResult<RetentionRun> {
    log_info(format!("📖 Reading upload ({} bytes)...", bytes.len()));
    let parse_result = parse_bytes(bytes, options.delimiter)?;
    run_parsed(parse_result, options)
}

/// Run the pipeline on already-parsed CSV.
pub fn run_parsed(parse_result: ParseResult, options: &PipelineOptions) -> PipelineResult<RetentionRun> {
    log_success(format!("Detected encoding: {}", parse_result.encoding));
    log_success(format!(
        "Detected separator: '{}'",
        format_delimiter(parse_result.delimiter)
    ));
    log_success(format!("Read {} rows", parse_result.rows.len()));

    let csv_info = CsvInfo {
        encoding: parse_result.encoding.clone(),
        delimiter: parse_result.delimiter,
        headers: parse_result.headers.clone(),
        row_count: parse_result.rows.len(),
    };

    log_info("🔎 Validating cohort table...");
    let table = RawCohortTable::from_parsed(&parse_result, options.cohort_column.as_deref())?;
    log_success(format!("Cohort column: {}", table.cohort_column()));
    log_info(format!("📋 {} period columns:", table.periods().len()));
    for (i, period) in table.periods().iter().enumerate() {
        log_info_indent(format!("[{:2}] {}", i + 1, period.label), 1);
    }

    let (matrix, stream) = compute(&table)?;

    Ok(RetentionRun {
        csv_info,
        table,
        matrix,
        stream,
        default_trend_cohorts: options.default_trend_cohorts,
    })
}

/// Normalize and reshape a validated table.
pub fn compute(table: &RawCohortTable) -> PipelineResult<(RetentionMatrix, LongForm)> {
    log_info("📐 Building retention matrix...");
    let matrix = build_retention_matrix(table)?;
    log_success(format!("{} cohorts normalized", matrix.rows.len()));

    let undefined: Vec<&str> = matrix
        .rows
        .iter()
        .filter(|r| r.rates.iter().all(|rate| rate.is_undefined()))
        .map(|r| r.cohort.as_str())
        .collect();
    if !undefined.is_empty() {
        log_warning(format!(
            "{} cohort(s) with zero or missing baseline, rates undefined: {}",
            undefined.len(),
            undefined.join(", ")
        ));
    }

    log_info("🔁 Reshaping to long form...");
    let stream = to_long_form(&matrix)?;
    log_success(format!("{} retention records", stream.len()));

    Ok((matrix, stream))
}

impl RetentionRun {
    /// Compute a single view.
    pub fn view(&self, request: &ViewRequest) -> PipelineResult<View> {
        Ok(views::select(&self.stream, request)?)
    }

    /// Cohorts available for selection, in table order.
    pub fn cohorts(&self) -> Vec<CohortId> {
        views::cohorts(&self.stream)
    }

    pub fn default_trend_selection(&self) -> Vec<CohortId> {
        views::default_trend_selection(&self.stream, self.default_trend_cohorts)
    }

    /// Compute all four views for a selection.
    pub fn dashboard(&self, selection: &Selection) -> PipelineResult<Dashboard> {
        let cohorts = self.cohorts();

        let selected_cohorts = match &selection.trend {
            Some(chosen) => chosen.clone(),
            None => self.default_trend_selection(),
        };
        let trend_set: BTreeSet<CohortId> = selected_cohorts.iter().cloned().collect();

        let series_cohort = selection.series.clone().or_else(|| cohorts.first().cloned());
        let series = match &series_cohort {
            Some(cohort) => views::single_cohort_series(&self.stream, cohort)?.records,
            None => Vec::new(),
        };

        Ok(Dashboard {
            matrix: views::matrix(&self.stream).grid(),
            trend: views::trend_subset(&self.stream, &trend_set).records,
            series,
            aggregate: views::aggregate_by_period(&self.stream).points,
            undefined_cells: self.matrix.undefined_count(),
            cohorts,
            selected_cohorts,
            series_cohort,
        })
    }
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}
