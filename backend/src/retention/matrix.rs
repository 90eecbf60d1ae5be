//! Retention matrix builder.
//!
//! Normalizes each cohort's counts to a percentage of its baseline count:
//!
//! ```text
//! retention[p] = 100 * count[p] / count[1]
//! ```
//!
//! A zero baseline makes the whole row undefined. Rows are never dropped.

use crate::error::{SchemaError, SchemaResult};
use crate::models::{RawCohortTable, Rate, RetentionMatrix, RetentionRow};

use super::period::find_baseline;

/// Build the retention matrix for a cohort table.
///
/// Fails with [`SchemaError`] when the table has no rows, no period columns,
/// or no column labelled as period 1.
pub fn build_retention_matrix(table: &RawCohortTable) -> SchemaResult<RetentionMatrix> {
    if table.is_empty() {
        return Err(SchemaError::EmptyTable);
    }
    if table.periods().is_empty() {
        return Err(SchemaError::NoPeriodColumns);
    }
    let baseline = find_baseline(table.periods()).ok_or(SchemaError::MissingBaseline)?;

    let rows = table
        .rows()
        .iter()
        .map(|row| {
            let base = row.counts[baseline];
            let rates = row
                .counts
                .iter()
                .enumerate()
                .map(|(j, &count)| {
                    let rate = Rate::of(count, base);
                    // 100 * c / c can round away from 100 for non-integer counts
                    if j == baseline && !rate.is_undefined() {
                        Rate::FULL
                    } else {
                        rate
                    }
                })
                .collect();
            RetentionRow {
                cohort: row.cohort.clone(),
                rates,
            }
        })
        .collect();

    Ok(RetentionMatrix {
        cohort_column: table.cohort_column().to_string(),
        periods: table.periods().to_vec(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CohortRow, PeriodColumn};

    fn table(labels: &[&str], rows: Vec<(&str, Vec<f64>)>) -> RawCohortTable {
        RawCohortTable::new(
            "Cohort (Signup Month)",
            labels.iter().map(|l| PeriodColumn::new(*l)).collect(),
            rows.into_iter()
                .map(|(c, counts)| CohortRow {
                    cohort: c.into(),
                    counts,
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_single_cohort_scenario() {
        let t = table(
            &["Month 1", "Month 2", "Month 3"],
            vec![("2023-01", vec![100.0, 50.0, 25.0])],
        );
        let m = build_retention_matrix(&t).unwrap();

        assert_eq!(m.rows.len(), 1);
        assert_eq!(
            m.rows[0].rates,
            vec![Rate::new(100.0), Rate::new(50.0), Rate::new(25.0)]
        );
        assert_eq!(m.cohort_column, "Cohort (Signup Month)");
    }

    #[test]
    fn test_baseline_is_exactly_100() {
        let t = table(
            &["Month 1", "Month 2"],
            vec![
                ("a", vec![3.0, 1.0]),
                ("b", vec![0.7, 0.1]),
                ("c", vec![1234567.0, 7.0]),
            ],
        );
        let m = build_retention_matrix(&t).unwrap();

        for row in &m.rows {
            assert_eq!(row.rates[0].value(), 100.0);
        }
    }

    #[test]
    fn test_zero_baseline_row_is_undefined_not_zero() {
        let t = table(
            &["Month 1", "Month 2"],
            vec![("2023-01", vec![200.0, 50.0]), ("2023-02", vec![0.0, 10.0])],
        );
        let m = build_retention_matrix(&t).unwrap();

        assert_eq!(m.rows.len(), 2);
        assert!(m.rows[1].rates.iter().all(|r| r.is_undefined()));
        assert_eq!(m.rows[0].rates[1], Rate::new(25.0));
        assert_eq!(m.undefined_count(), 2);
    }

    #[test]
    fn test_missing_observation_stays_undefined() {
        let t = table(&["Month 1", "Month 2"], vec![("a", vec![10.0, f64::NAN])]);
        let m = build_retention_matrix(&t).unwrap();

        assert_eq!(m.rows[0].rates[0], Rate::FULL);
        assert!(m.rows[0].rates[1].is_undefined());
    }

    #[test]
    fn test_baseline_found_out_of_order() {
        let t = table(&["Month 2", "Month 1"], vec![("a", vec![30.0, 60.0])]);
        let m = build_retention_matrix(&t).unwrap();

        assert_eq!(m.rows[0].rates, vec![Rate::new(50.0), Rate::FULL]);
    }

    #[test]
    fn test_empty_table() {
        let t = table(&["Month 1"], vec![]);
        assert_eq!(build_retention_matrix(&t).unwrap_err(), SchemaError::EmptyTable);
    }

    #[test]
    fn test_no_period_columns() {
        let t = table(&[], vec![("a", vec![])]);
        assert_eq!(
            build_retention_matrix(&t).unwrap_err(),
            SchemaError::NoPeriodColumns
        );
    }

    #[test]
    fn test_missing_baseline() {
        let t = table(&["Month 2", "Month 3"], vec![("a", vec![1.0, 2.0])]);
        assert_eq!(
            build_retention_matrix(&t).unwrap_err(),
            SchemaError::MissingBaseline
        );
    }
}
