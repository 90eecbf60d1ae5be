//! Domain models for the retention pipeline.
//!
//! - [`RawCohortTable`] - validated cohort × period count table
//! - [`RetentionMatrix`] - the same shape, normalized to % of baseline
//! - [`RetentionRecord`] - one (cohort, period, rate) observation
//! - [`AggregatePoint`] - summed rate for one period
//! - [`RetentionGrid`] - a long-form stream pivoted back into a grid
//! - [`Rate`] - a retention percentage with an explicit undefined value

mod table;

pub use table::{CohortRow, PeriodColumn, RawCohortTable};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Add;

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque cohort label, e.g. a signup month.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CohortId(pub String);

impl CohortId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CohortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CohortId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CohortId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Observation period, starting at 1 (the baseline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodIndex(pub u32);

impl PeriodIndex {
    /// The baseline period every rate is normalized against.
    pub const BASELINE: PeriodIndex = PeriodIndex(1);

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn is_baseline(self) -> bool {
        self == Self::BASELINE
    }
}

impl fmt::Display for PeriodIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Rate
// =============================================================================

/// Retention rate in percent of the baseline count.
///
/// A zero or missing baseline makes the rate undefined. Undefined is stored
/// as NaN, compares equal to itself, survives addition, and serializes as
/// JSON `null`.
#[derive(Debug, Clone, Copy)]
pub struct Rate(f64);

impl Rate {
    pub const UNDEFINED: Rate = Rate(f64::NAN);
    pub const FULL: Rate = Rate(100.0);

    pub fn new(value: f64) -> Self {
        Self(value)
    }

    /// Percentage of `baseline` that `count` represents.
    pub fn of(count: f64, baseline: f64) -> Self {
        if baseline == 0.0 || baseline.is_nan() {
            return Self::UNDEFINED;
        }
        Self(100.0 * count / baseline)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_undefined(self) -> bool {
        self.0.is_nan()
    }

    /// The rate as an option, `None` when undefined.
    pub fn defined(self) -> Option<f64> {
        if self.is_undefined() {
            None
        } else {
            Some(self.0)
        }
    }
}

impl Default for Rate {
    fn default() -> Self {
        Self(0.0)
    }
}

impl PartialEq for Rate {
    fn eq(&self, other: &Self) -> bool {
        (self.is_undefined() && other.is_undefined()) || self.0 == other.0
    }
}

impl Add for Rate {
    type Output = Rate;

    fn add(self, rhs: Rate) -> Rate {
        Rate(self.0 + rhs.0)
    }
}

impl std::iter::Sum for Rate {
    fn sum<I: Iterator<Item = Rate>>(iter: I) -> Rate {
        iter.fold(Rate::default(), Add::add)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.defined() {
            Some(v) => match f.precision() {
                Some(p) => write!(f, "{:.*}", p, v),
                None => write!(f, "{}", v),
            },
            None => f.write_str("NaN"),
        }
    }
}

impl Serialize for Rate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.defined() {
            Some(v) => serializer.serialize_f64(v),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Rate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<f64>::deserialize(deserializer)?;
        Ok(value.map_or(Rate::UNDEFINED, Rate))
    }
}

// =============================================================================
// Retention Matrix
// =============================================================================

/// One cohort's normalized rates, aligned with [`RetentionMatrix::periods`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionRow {
    pub cohort: CohortId,
    pub rates: Vec<Rate>,
}

/// Wide retention table: one row per cohort, one column per period label.
///
/// Column labels are kept as written in the source file; turning them into
/// period indices is the reshaper's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionMatrix {
    pub cohort_column: String,
    pub periods: Vec<PeriodColumn>,
    pub rows: Vec<RetentionRow>,
}

impl RetentionMatrix {
    /// Number of undefined cells.
    pub fn undefined_count(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|r| r.rates.iter())
            .filter(|r| r.is_undefined())
            .count()
    }
}

// =============================================================================
// Long-form records and view shapes
// =============================================================================

/// A single long-form observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionRecord {
    pub cohort: CohortId,
    pub period: PeriodIndex,
    pub rate: Rate,
}

impl RetentionRecord {
    pub fn new(cohort: impl Into<CohortId>, period: u32, rate: f64) -> Self {
        Self {
            cohort: cohort.into(),
            period: PeriodIndex(period),
            rate: Rate::new(rate),
        }
    }
}

/// Summed retention across cohorts for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatePoint {
    pub period: PeriodIndex,
    pub total: Rate,
}

/// Cohort × period grid rebuilt from a long-form stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionGrid {
    pub cohorts: Vec<CohortId>,
    pub periods: Vec<PeriodIndex>,
    /// `cells[i][j]` is the rate of `cohorts[i]` at `periods[j]`.
    /// Pairs absent from the stream are undefined.
    pub cells: Vec<Vec<Rate>>,
}

impl RetentionGrid {
    pub fn get(&self, cohort: &CohortId, period: PeriodIndex) -> Option<Rate> {
        let i = self.cohorts.iter().position(|c| c == cohort)?;
        let j = self.periods.iter().position(|p| *p == period)?;
        Some(self.cells[i][j])
    }
}
