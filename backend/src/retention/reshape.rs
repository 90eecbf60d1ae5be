//! Wide ↔ long reshaping.
//!
//! ```text
//! Wide (RetentionMatrix)                 Long-form (LongForm)
//! ┌─────────┬─────────┬─────────┐        ┌─────────┬────────┬──────┐
//! │ Cohort  │ Month 1 │ Month 2 │        │ cohort  │ period │ rate │
//! ├─────────┼─────────┼─────────┤   →    ├─────────┼────────┼──────┤
//! │ 2023-01 │ 100     │ 50      │        │ 2023-01 │ 1      │ 100  │
//! │ 2023-02 │ 100     │ 40      │        │ 2023-01 │ 2      │ 50   │
//! └─────────┴─────────┴─────────┘        │ 2023-02 │ 1      │ 100  │
//!                                        │ 2023-02 │ 2      │ 40   │
//!                                        └─────────┴────────┴──────┘
//! ```
//!
//! Record order: cohort order of the matrix first, ascending period second.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::error::FormatResult;
use crate::models::{CohortId, PeriodIndex, Rate, RetentionGrid, RetentionMatrix, RetentionRecord};

use super::period::parse_period_columns;

/// Immutable long-form retention stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LongForm {
    records: Vec<RetentionRecord>,
}

impl LongForm {
    pub fn records(&self) -> &[RetentionRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RetentionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a LongForm {
    type Item = &'a RetentionRecord;
    type IntoIter = std::slice::Iter<'a, RetentionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Reshape a retention matrix into its long-form stream.
///
/// Emits `rows × periods` records. Fails with
/// [`FormatError`](crate::error::FormatError) when a period header has no
/// integer, is period 0, or repeats another header's index.
pub fn to_long_form(matrix: &RetentionMatrix) -> FormatResult<LongForm> {
    let indices = parse_period_columns(&matrix.periods)?;

    let mut order: Vec<usize> = (0..indices.len()).collect();
    order.sort_by_key(|&j| indices[j]);

    let mut records = Vec::with_capacity(matrix.rows.len() * indices.len());
    for row in &matrix.rows {
        for &j in &order {
            records.push(RetentionRecord {
                cohort: row.cohort.clone(),
                period: indices[j],
                rate: row.rates[j],
            });
        }
    }

    Ok(LongForm { records })
}

/// Pivot long-form records back into a cohort × period grid.
///
/// Cohorts keep first-appearance order, periods are ascending. Pairs missing
/// from the input are undefined.
pub fn pivot<'a, I>(records: I) -> RetentionGrid
where
    I: IntoIterator<Item = &'a RetentionRecord>,
{
    let mut cohorts: Vec<CohortId> = Vec::new();
    let mut cohort_pos: HashMap<CohortId, usize> = HashMap::new();
    let mut periods: BTreeSet<PeriodIndex> = BTreeSet::new();
    let mut values: Vec<(usize, PeriodIndex, Rate)> = Vec::new();

    for record in records {
        let i = *cohort_pos.entry(record.cohort.clone()).or_insert_with(|| {
            cohorts.push(record.cohort.clone());
            cohorts.len() - 1
        });
        periods.insert(record.period);
        values.push((i, record.period, record.rate));
    }

    let periods: Vec<PeriodIndex> = periods.into_iter().collect();
    let period_pos: HashMap<PeriodIndex, usize> =
        periods.iter().enumerate().map(|(j, p)| (*p, j)).collect();

    let mut cells = vec![vec![Rate::UNDEFINED; periods.len()]; cohorts.len()];
    for (i, period, rate) in values {
        cells[i][period_pos[&period]] = rate;
    }

    RetentionGrid {
        cohorts,
        periods,
        cells,
    }
}
