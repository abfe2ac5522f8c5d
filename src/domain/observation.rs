//! Daily per-asset market observation.

use chrono::NaiveDate;

/// One asset's fields on one day, as delivered by a data source.
///
/// `None` is the missing-data marker for either field.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub asset: String,
    pub date: NaiveDate,
    pub close: Option<f64>,
    pub is_liquid: Option<f64>,
}

impl Observation {
    pub fn new(asset: &str, date: NaiveDate, close: Option<f64>, is_liquid: Option<f64>) -> Self {
        Self {
            asset: asset.to_string(),
            date,
            close,
            is_liquid,
        }
    }

    /// True when neither field carries a value.
    pub fn is_empty(&self) -> bool {
        absent(self.close) && absent(self.is_liquid)
    }
}

/// NaN is folded into the missing-data marker.
pub(crate) fn absent(value: Option<f64>) -> bool {
    value.is_none_or(f64::is_nan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[test]
    fn empty_when_both_fields_missing() {
        let obs = Observation::new("BHP", day(), None, Some(f64::NAN));
        assert!(obs.is_empty());
    }

    #[test]
    fn not_empty_with_close() {
        let obs = Observation::new("BHP", day(), Some(45.2), None);
        assert!(!obs.is_empty());
    }
}
