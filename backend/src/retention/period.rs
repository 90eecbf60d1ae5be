//! Period header parsing.
//!
//! A period header carries its index as the first run of digits:
//! `Month 3` → 3, `M12` → 12, `week_04` → 4.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::error::{FormatError, FormatResult};
use crate::models::{PeriodColumn, PeriodIndex};

static PERIOD_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("static regex"));

/// Parse a single period header into its index.
///
/// # Example
/// ```ignore
/// use cohort_retention::retention::period::parse_period_label;
///
/// assert_eq!(parse_period_label("Month 3").unwrap().get(), 3);
/// assert!(parse_period_label("Total").is_err());
/// ```
pub fn parse_period_label(label: &str) -> FormatResult<PeriodIndex> {
    let digits = PERIOD_DIGITS
        .find(label)
        .ok_or_else(|| FormatError::NoPeriodIndex(label.to_string()))?;

    let index: u32 = digits
        .as_str()
        .parse()
        .map_err(|_| FormatError::NoPeriodIndex(label.to_string()))?;

    if index == 0 {
        return Err(FormatError::ZeroPeriod(label.to_string()));
    }

    Ok(PeriodIndex(index))
}

/// Parse every column header, rejecting two headers with the same index.
pub fn parse_period_columns(columns: &[PeriodColumn]) -> FormatResult<Vec<PeriodIndex>> {
    let mut seen: HashMap<PeriodIndex, &str> = HashMap::new();
    let mut indices = Vec::with_capacity(columns.len());

    for column in columns {
        let index = parse_period_label(&column.label)?;
        if let Some(first) = seen.insert(index, column.label.as_str()) {
            return Err(FormatError::DuplicatePeriod {
                index: index.get(),
                first: first.to_string(),
                second: column.label.clone(),
            });
        }
        indices.push(index);
    }

    Ok(indices)
}

/// Position of the baseline (period 1) column, if any.
///
/// Headers that do not parse are not baseline candidates; reporting them is
/// left to [`parse_period_columns`].
pub fn find_baseline(columns: &[PeriodColumn]) -> Option<usize> {
    columns
        .iter()
        .position(|c| matches!(parse_period_label(&c.label), Ok(p) if p.is_baseline()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(labels: &[&str]) -> Vec<PeriodColumn> {
        labels.iter().map(|l| PeriodColumn::new(*l)).collect()
    }

    #[test]
    fn test_month_headers() {
        assert_eq!(parse_period_label("Month 1").unwrap(), PeriodIndex(1));
        assert_eq!(parse_period_label("Month 12").unwrap(), PeriodIndex(12));
    }

    #[test]
    fn test_first_digit_run_wins() {
        assert_eq!(parse_period_label("M3 (2023)").unwrap(), PeriodIndex(3));
        assert_eq!(parse_period_label("week_04").unwrap(), PeriodIndex(4));
    }

    #[test]
    fn test_header_without_integer() {
        assert_eq!(
            parse_period_label("Total").unwrap_err(),
            FormatError::NoPeriodIndex("Total".into())
        );
    }

    #[test]
    fn test_zero_period_rejected() {
        assert_eq!(
            parse_period_label("Month 0").unwrap_err(),
            FormatError::ZeroPeriod("Month 0".into())
        );
    }

    #[test]
    fn test_overflowing_index_rejected() {
        assert!(parse_period_label("Month 99999999999").is_err());
    }

    #[test]
    fn test_duplicate_indices_rejected() {
        let err = parse_period_columns(&columns(&["Month 1", "Month 2", "Month 01"])).unwrap_err();
        assert_eq!(
            err,
            FormatError::DuplicatePeriod {
                index: 1,
                first: "Month 1".into(),
                second: "Month 01".into(),
            }
        );
    }

    #[test]
    fn test_find_baseline() {
        assert_eq!(find_baseline(&columns(&["Month 2", "Month 1"])), Some(1));
        assert_eq!(find_baseline(&columns(&["Notes", "Month 1"])), Some(1));
        assert_eq!(find_baseline(&columns(&["Month 2", "Month 3"])), None);
    }
}
