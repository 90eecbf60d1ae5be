//! REST API types.
//!
//! Rates are plain numbers, undefined rates are `null`. Clients never need
//! the raw counts.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::{AggregatePoint, CohortId, RetentionGrid, RetentionRecord};
use crate::retention::pipeline::{format_delimiter, Dashboard, RetentionRun};

/// Response sent after an upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Status: "ready", "warning" (some rates undefined), "error"
    pub status: String,

    /// Every cohort, in table order
    pub cohorts: Vec<CohortId>,

    /// Cohorts shown in the trend view
    pub selected_cohorts: Vec<CohortId>,

    /// The four views
    pub views: ViewsPayload,

    pub metadata: ResponseMetadata,
}

/// The four views for the requested selection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewsPayload {
    /// Heatmap grid
    pub matrix: RetentionGrid,
    /// Line chart records
    pub trend: Vec<RetentionRecord>,
    /// Bar chart records
    pub series: SeriesPayload,
    /// Area chart totals
    pub aggregate: Vec<AggregatePoint>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPayload {
    pub cohort: Option<CohortId>,
    pub records: Vec<RetentionRecord>,
}

/// Metadata about the run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub total_cohorts: usize,
    pub total_periods: usize,
    pub undefined_cells: usize,
    pub generated_at: String,
    pub csv_info: CsvMetadata,
}

/// CSV file metadata
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub cohort_column: String,
    pub columns: Vec<String>,
}

/// Selection fields accepted next to the uploaded file.
///
/// Cohort identifiers are taken verbatim: one identifier per `cohorts`
/// field, repeated for several cohorts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSelection {
    /// Trend cohorts, one per field; `None` when no field was sent
    pub cohorts: Option<Vec<String>>,
    /// Single cohort for the series view
    pub cohort: Option<String>,
}

impl UploadSelection {
    /// Record one `cohorts` field.
    pub fn push_cohort(&mut self, value: String) {
        self.cohorts.get_or_insert_with(Vec::new).push(value);
    }

    /// Trend cohorts. A lone empty field is an explicit empty selection.
    pub fn trend(&self) -> Option<Vec<CohortId>> {
        self.cohorts.as_ref().map(|values| {
            values
                .iter()
                .filter(|s| !s.is_empty())
                .map(|s| CohortId::from(s.as_str()))
                .collect()
        })
    }

    pub fn series(&self) -> Option<CohortId> {
        self.cohort
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(CohortId::from)
    }
}

impl UploadResponse {
    pub fn new(job_id: impl Into<String>, run: &RetentionRun, dashboard: Dashboard) -> Self {
        let total_periods = dashboard.matrix.periods.len();

        UploadResponse {
            job_id: job_id.into(),
            status: if dashboard.undefined_cells == 0 { "ready" } else { "warning" }.to_string(),
            metadata: ResponseMetadata {
                total_cohorts: dashboard.cohorts.len(),
                total_periods,
                undefined_cells: dashboard.undefined_cells,
                generated_at: chrono::Utc::now().to_rfc3339(),
                csv_info: CsvMetadata {
                    encoding: run.csv_info.encoding.clone(),
                    delimiter: format_delimiter(run.csv_info.delimiter),
                    row_count: run.csv_info.row_count,
                    cohort_column: run.table.cohort_column().to_string(),
                    columns: run.csv_info.headers.clone(),
                },
            },
            cohorts: dashboard.cohorts,
            selected_cohorts: dashboard.selected_cohorts,
            views: ViewsPayload {
                matrix: dashboard.matrix,
                trend: dashboard.trend,
                series: SeriesPayload {
                    cohort: dashboard.series_cohort,
                    records: dashboard.series,
                },
                aggregate: dashboard.aggregate,
            },
        }
    }
}

/// Create an error response
pub fn error_response(job_id: &str, error: &str) -> Value {
    json!({
        "jobId": job_id,
        "status": "error",
        "error": error,
        "cohorts": [],
        "views": null
    })
}
