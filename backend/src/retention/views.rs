//! View selection over a long-form stream.
//!
//! Four read-only projections, each computed on demand:
//!
//! | View                 | Shape                                  |
//! |----------------------|----------------------------------------|
//! | `Matrix`             | every record (pivot with [`MatrixView::grid`]) |
//! | `TrendSubset`        | records of a chosen set of cohorts     |
//! | `SingleCohortSeries` | one cohort, ascending period           |
//! | `AggregateByPeriod`  | rate summed across cohorts per period  |
//!
//! Undefined rates are carried as-is; an undefined rate in any cohort makes
//! that period's aggregate undefined.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::NotFoundError;
use crate::models::{AggregatePoint, CohortId, PeriodIndex, Rate, RetentionGrid, RetentionRecord};

use super::reshape::{pivot, LongForm};

/// Which view to compute.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewRequest {
    Matrix,
    TrendSubset(BTreeSet<CohortId>),
    SingleCohortSeries(CohortId),
    AggregateByPeriod,
}

/// Full stream, for the heatmap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixView {
    pub records: Vec<RetentionRecord>,
}

impl MatrixView {
    pub fn grid(&self) -> RetentionGrid {
        pivot(&self.records)
    }
}

/// Records of the selected cohorts, in stream order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendView {
    pub records: Vec<RetentionRecord>,
}

/// One cohort's series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesView {
    pub cohort: CohortId,
    pub records: Vec<RetentionRecord>,
}

/// Cross-cohort totals per period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateView {
    pub points: Vec<AggregatePoint>,
}

/// A computed view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "camelCase")]
pub enum View {
    Matrix(MatrixView),
    TrendSubset(TrendView),
    SingleCohortSeries(SeriesView),
    AggregateByPeriod(AggregateView),
}

/// Compute the requested view.
///
/// Only `SingleCohortSeries` can fail, when the cohort is not in the stream.
pub fn select(stream: &LongForm, request: &ViewRequest) -> Result<View, NotFoundError> {
    Ok(match request {
        ViewRequest::Matrix => View::Matrix(matrix(stream)),
        ViewRequest::TrendSubset(cohorts) => View::TrendSubset(trend_subset(stream, cohorts)),
        ViewRequest::SingleCohortSeries(cohort) => {
            View::SingleCohortSeries(single_cohort_series(stream, cohort)?)
        }
        ViewRequest::AggregateByPeriod => View::AggregateByPeriod(aggregate_by_period(stream)),
    })
}

pub fn matrix(stream: &LongForm) -> MatrixView {
    MatrixView {
        records: stream.records().to_vec(),
    }
}

/// An empty selection yields an empty view. Identifiers not in the stream
/// match nothing.
pub fn trend_subset(stream: &LongForm, cohorts: &BTreeSet<CohortId>) -> TrendView {
    TrendView {
        records: stream
            .iter()
            .filter(|r| cohorts.contains(&r.cohort))
            .cloned()
            .collect(),
    }
}

pub fn single_cohort_series(stream: &LongForm, cohort: &CohortId) -> Result<SeriesView, NotFoundError> {
    let mut records: Vec<RetentionRecord> = stream
        .iter()
        .filter(|r| &r.cohort == cohort)
        .cloned()
        .collect();

    if records.is_empty() {
        return Err(NotFoundError(cohort.to_string()));
    }
    records.sort_by_key(|r| r.period);

    Ok(SeriesView {
        cohort: cohort.clone(),
        records,
    })
}

pub fn aggregate_by_period(stream: &LongForm) -> AggregateView {
    let mut totals: BTreeMap<PeriodIndex, Rate> = BTreeMap::new();
    for record in stream {
        let total = totals.entry(record.period).or_default();
        *total = *total + record.rate;
    }

    AggregateView {
        points: totals
            .into_iter()
            .map(|(period, total)| AggregatePoint { period, total })
            .collect(),
    }
}

/// Distinct cohorts in stream order.
pub fn cohorts(stream: &LongForm) -> Vec<CohortId> {
    let mut seen = HashSet::new();
    stream
        .iter()
        .filter(|r| seen.insert(r.cohort.clone()))
        .map(|r| r.cohort.clone())
        .collect()
}

/// The first `n` cohorts, the pre-selected trend set.
pub fn default_trend_selection(stream: &LongForm, n: usize) -> Vec<CohortId> {
    cohorts(stream).into_iter().take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CohortRow, PeriodColumn, RawCohortTable};
    use crate::retention::{build_retention_matrix, to_long_form};

    fn stream(rows: Vec<(&str, Vec<f64>)>) -> LongForm {
        let width = rows.first().map(|(_, c)| c.len()).unwrap_or(0);
        let table = RawCohortTable::new(
            "Cohort",
            (1..=width).map(|i| PeriodColumn::new(format!("Month {}", i))).collect(),
            rows.into_iter()
                .map(|(c, counts)| CohortRow {
                    cohort: c.into(),
                    counts,
                })
                .collect(),
        )
        .unwrap();
        to_long_form(&build_retention_matrix(&table).unwrap()).unwrap()
    }

    fn sample() -> LongForm {
        stream(vec![
            ("2023-01", vec![200.0, 100.0, 50.0]),
            ("2023-02", vec![100.0, 60.0, 30.0]),
            ("2023-03", vec![50.0, 40.0, 10.0]),
        ])
    }

    fn set(ids: &[&str]) -> BTreeSet<CohortId> {
        ids.iter().map(|s| CohortId::from(*s)).collect()
    }

    #[test]
    fn test_matrix_is_identity() {
        let s = sample();
        assert_eq!(matrix(&s).records, s.records());
    }

    #[test]
    fn test_matrix_grid() {
        let grid = matrix(&sample()).grid();
        assert_eq!(grid.cohorts.len(), 3);
        assert_eq!(grid.get(&"2023-03".into(), PeriodIndex(2)), Some(Rate::new(80.0)));
    }

    #[test]
    fn test_trend_subset_empty_selection() {
        assert!(trend_subset(&sample(), &BTreeSet::new()).records.is_empty());
    }

    #[test]
    fn test_trend_subset_all_equals_matrix() {
        let s = sample();
        let all: BTreeSet<CohortId> = cohorts(&s).into_iter().collect();
        assert_eq!(trend_subset(&s, &all).records, matrix(&s).records);
    }

    #[test]
    fn test_trend_subset_filters_and_ignores_unknown() {
        let view = trend_subset(&sample(), &set(&["2023-03", "1999-12"]));
        assert_eq!(view.records.len(), 3);
        assert!(view.records.iter().all(|r| r.cohort.as_str() == "2023-03"));
    }

    #[test]
    fn test_single_cohort_series_matches_matrix_subset() {
        let s = sample();
        let cohort = CohortId::from("2023-02");
        let view = single_cohort_series(&s, &cohort).unwrap();

        let expected: Vec<RetentionRecord> = s
            .iter()
            .filter(|r| r.cohort == cohort)
            .cloned()
            .collect();
        assert_eq!(view.records, expected);
        assert!(view.records.windows(2).all(|w| w[0].period < w[1].period));
        assert_eq!(view.records[1].rate, Rate::new(60.0));
    }

    #[test]
    fn test_single_cohort_series_not_found() {
        let err = single_cohort_series(&sample(), &"2024-01".into()).unwrap_err();
        assert_eq!(err, NotFoundError("2024-01".into()));
    }

    #[test]
    fn test_aggregate_single_cohort_scenario() {
        let s = stream(vec![("2023-01", vec![100.0, 50.0, 25.0])]);
        let view = aggregate_by_period(&s);

        assert_eq!(
            view.points,
            vec![
                AggregatePoint { period: PeriodIndex(1), total: Rate::new(100.0) },
                AggregatePoint { period: PeriodIndex(2), total: Rate::new(50.0) },
                AggregatePoint { period: PeriodIndex(3), total: Rate::new(25.0) },
            ]
        );
    }

    #[test]
    fn test_aggregate_equals_series_for_single_cohort() {
        let s = stream(vec![("only", vec![80.0, 20.0, 8.0, 4.0])]);
        let series = single_cohort_series(&s, &"only".into()).unwrap();
        let aggregate = aggregate_by_period(&s);

        let from_series: Vec<(PeriodIndex, Rate)> =
            series.records.iter().map(|r| (r.period, r.rate)).collect();
        let from_aggregate: Vec<(PeriodIndex, Rate)> =
            aggregate.points.iter().map(|p| (p.period, p.total)).collect();
        assert_eq!(from_series, from_aggregate);
    }

    #[test]
    fn test_aggregate_sums_across_cohorts() {
        let view = aggregate_by_period(&sample());
        let totals: Vec<f64> = view.points.iter().map(|p| p.total.value()).collect();
        assert_eq!(totals, vec![300.0, 190.0, 75.0]);
    }

    #[test]
    fn test_aggregate_zero_baseline_propagates_undefined() {
        let s = stream(vec![
            ("2023-01", vec![100.0, 50.0]),
            ("2023-02", vec![0.0, 10.0]),
        ]);
        let view = aggregate_by_period(&s);

        assert_eq!(view.points.len(), 2);
        assert!(view.points.iter().all(|p| p.total.is_undefined()));
    }

    #[test]
    fn test_select_dispatch() {
        let s = sample();
        assert!(matches!(select(&s, &ViewRequest::Matrix), Ok(View::Matrix(_))));
        assert!(matches!(
            select(&s, &ViewRequest::SingleCohortSeries("nope".into())),
            Err(NotFoundError(_))
        ));
        match select(&s, &ViewRequest::AggregateByPeriod).unwrap() {
            View::AggregateByPeriod(v) => assert_eq!(v.points.len(), 3),
            other => panic!("unexpected view: {:?}", other),
        }
    }

    #[test]
    fn test_select_is_repeatable() {
        let s = sample();
        let request = ViewRequest::TrendSubset(set(&["2023-01"]));
        assert_eq!(select(&s, &request).unwrap(), select(&s, &request).unwrap());
    }

    #[test]
    fn test_default_trend_selection() {
        let s = sample();
        let ids: Vec<String> = default_trend_selection(&s, 2)
            .into_iter()
            .map(|c| c.0)
            .collect();
        assert_eq!(ids, vec!["2023-01", "2023-02"]);
        assert_eq!(default_trend_selection(&s, 10).len(), 3);
    }

    #[test]
    fn test_view_serializes_with_tag() {
        let view = select(&sample(), &ViewRequest::AggregateByPeriod).unwrap();
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["view"], "aggregateByPeriod");
        assert_eq!(json["points"][0]["total"], 300.0);
    }
}
