//! Typed cohort count table, validated once when it is loaded.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::CohortId;
use crate::error::{SchemaError, SchemaResult};
use crate::parser::ParseResult;

/// A period column header as written in the file, e.g. `Month 3`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodColumn {
    pub label: String,
}

impl PeriodColumn {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

/// One cohort's raw counts, aligned with [`RawCohortTable::periods`].
///
/// A `NaN` count is a missing observation (empty cell in the file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortRow {
    pub cohort: CohortId,
    pub counts: Vec<f64>,
}

/// Raw cohort × period count table.
///
/// Invariants upheld by every constructor:
/// - each row has exactly `periods.len()` counts
/// - cohort identifiers are non-empty and unique
/// - counts are finite or `NaN`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCohortTable {
    cohort_column: String,
    periods: Vec<PeriodColumn>,
    rows: Vec<CohortRow>,
}

impl RawCohortTable {
    /// Build a table from typed rows, checking the invariants.
    pub fn new(
        cohort_column: impl Into<String>,
        periods: Vec<PeriodColumn>,
        rows: Vec<CohortRow>,
    ) -> SchemaResult<Self> {
        let mut seen = HashSet::new();
        for (i, row) in rows.iter().enumerate() {
            let row_num = i + 1;
            if row.cohort.as_str().trim().is_empty() {
                return Err(SchemaError::EmptyCohort(row_num));
            }
            if !seen.insert(row.cohort.as_str()) {
                return Err(SchemaError::DuplicateCohort(row.cohort.to_string()));
            }
            if row.counts.len() != periods.len() {
                return Err(SchemaError::RaggedRow {
                    row: row_num,
                    expected: periods.len(),
                    found: row.counts.len(),
                });
            }
            if let Some((j, v)) = row.counts.iter().enumerate().find(|(_, v)| v.is_infinite()) {
                return Err(SchemaError::InvalidCount {
                    row: row_num,
                    column: periods[j].label.clone(),
                    value: v.to_string(),
                });
            }
        }

        Ok(Self {
            cohort_column: cohort_column.into(),
            periods,
            rows,
        })
    }

    /// Build a table from parsed CSV.
    ///
    /// The cohort column is `cohort_column` when given, otherwise the first
    /// column. Every other column is a period column, in file order.
    pub fn from_parsed(parsed: &ParseResult, cohort_column: Option<&str>) -> SchemaResult<Self> {
        let cohort_idx = match cohort_column {
            Some(name) => parsed
                .headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| SchemaError::MissingCohortColumn(name.to_string()))?,
            None => 0,
        };

        let cohort_header = parsed
            .headers
            .get(cohort_idx)
            .cloned()
            .ok_or_else(|| SchemaError::MissingCohortColumn(String::new()))?;

        let periods: Vec<PeriodColumn> = parsed
            .headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != cohort_idx)
            .map(|(_, h)| PeriodColumn::new(h.clone()))
            .collect();

        let mut rows = Vec::with_capacity(parsed.rows.len());
        for (i, cells) in parsed.rows.iter().enumerate() {
            let row_num = i + 1;
            if cells.len() != parsed.headers.len() {
                return Err(SchemaError::RaggedRow {
                    row: row_num,
                    expected: periods.len(),
                    found: cells.len().saturating_sub(1),
                });
            }

            let cohort = CohortId::new(cells[cohort_idx].clone());
            let mut counts = Vec::with_capacity(periods.len());
            for (j, cell) in cells.iter().enumerate() {
                if j == cohort_idx {
                    continue;
                }
                counts.push(parse_count(cell).ok_or_else(|| SchemaError::InvalidCount {
                    row: row_num,
                    column: parsed.headers[j].clone(),
                    value: cell.clone(),
                })?);
            }
            rows.push(CohortRow { cohort, counts });
        }

        Self::new(cohort_header, periods, rows)
    }

    pub fn cohort_column(&self) -> &str {
        &self.cohort_column
    }

    pub fn periods(&self) -> &[PeriodColumn] {
        &self.periods
    }

    pub fn rows(&self) -> &[CohortRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cohort identifiers in table order.
    pub fn cohorts(&self) -> impl Iterator<Item = &CohortId> {
        self.rows.iter().map(|r| &r.cohort)
    }
}

/// Empty cells are missing observations; anything else must be a finite number.
fn parse_count(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Some(f64::NAN);
    }
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;

    fn parsed(csv: &str) -> ParseResult {
        parse_str(csv, ',', "utf-8").unwrap()
    }

    #[test]
    fn test_first_column_is_cohort_by_default() {
        let table = RawCohortTable::from_parsed(
            &parsed("Cohort (Signup Month),Month 1,Month 2\n2023-01,100,50"),
            None,
        )
        .unwrap();

        assert_eq!(table.cohort_column(), "Cohort (Signup Month)");
        assert_eq!(table.periods().len(), 2);
        assert_eq!(table.periods()[1].label, "Month 2");
        assert_eq!(table.rows()[0].counts, vec![100.0, 50.0]);
    }

    #[test]
    fn test_named_cohort_column() {
        let table = RawCohortTable::from_parsed(
            &parsed("Month 1,Cohort,Month 2\n100,2023-01,50"),
            Some("Cohort"),
        )
        .unwrap();

        assert_eq!(table.rows()[0].cohort.as_str(), "2023-01");
        assert_eq!(table.rows()[0].counts, vec![100.0, 50.0]);
        assert_eq!(table.periods()[0].label, "Month 1");
    }

    #[test]
    fn test_missing_named_cohort_column() {
        let err = RawCohortTable::from_parsed(&parsed("Cohort,Month 1\na,1"), Some("Signup"))
            .unwrap_err();
        assert_eq!(err, SchemaError::MissingCohortColumn("Signup".into()));
    }

    #[test]
    fn test_empty_cell_is_missing_observation() {
        let table =
            RawCohortTable::from_parsed(&parsed("Cohort,Month 1,Month 2\n2023-01,100,"), None)
                .unwrap();
        assert!(table.rows()[0].counts[1].is_nan());
    }

    #[test]
    fn test_invalid_count_rejected() {
        let err = RawCohortTable::from_parsed(
            &parsed("Cohort,Month 1,Month 2\n2023-01,100,lots"),
            None,
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::InvalidCount {
                row: 1,
                column: "Month 2".into(),
                value: "lots".into(),
            }
        );
    }

    #[test]
    fn test_ragged_row_rejected() {
        let err = RawCohortTable::from_parsed(
            &parsed("Cohort,Month 1,Month 2\n2023-01,100,50\n2023-02,90"),
            None,
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::RaggedRow {
                row: 2,
                expected: 2,
                found: 1,
            }
        );
    }

    #[test]
    fn test_duplicate_cohort_rejected() {
        let err = RawCohortTable::from_parsed(
            &parsed("Cohort,Month 1\n2023-01,100\n2023-01,90"),
            None,
        )
        .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateCohort("2023-01".into()));
    }

    #[test]
    fn test_zero_baseline_row_is_kept() {
        let table =
            RawCohortTable::from_parsed(&parsed("Cohort,Month 1,Month 2\n2023-02,0,10"), None)
                .unwrap();
        assert_eq!(table.rows().len(), 1);
        assert_eq!(table.rows()[0].counts, vec![0.0, 10.0]);
    }

    #[test]
    fn test_cohort_identifier_kept_verbatim() {
        let table = RawCohortTable::from_parsed(
            &parsed("Cohort,Month 1,Month 2\n 2023-01 , 100 , 50\n\"Jan, 2023\",80,40"),
            None,
        )
        .unwrap();

        assert_eq!(table.rows()[0].cohort.as_str(), " 2023-01 ");
        assert_eq!(table.rows()[0].counts, vec![100.0, 50.0]);
        assert_eq!(table.rows()[1].cohort.as_str(), "Jan, 2023");
    }

    #[test]
    fn test_header_only_table_loads_empty() {
        let table = RawCohortTable::from_parsed(&parsed("Cohort,Month 1\n"), None).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_new_rejects_infinite_count() {
        let err = RawCohortTable::new(
            "Cohort",
            vec![PeriodColumn::new("Month 1")],
            vec![CohortRow {
                cohort: "a".into(),
                counts: vec![f64::INFINITY],
            }],
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidCount { row: 1, .. }));
    }
}
