//! Daily price curve shaping and summary statistics
//!
//! The API does not guarantee ordering, so the curve is re-sorted by start
//! time here before anything else looks at it. Summary statistics bucket the
//! sorted values into the fixed peak/off-peak windows used for display:
//! indices [0,8) and [20,len) around hours of low demand, [9,17) for the
//! daytime peak.

use crate::client::PriceEntry;
use crate::error::{OerstedError, Result};
use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

const OFF_PEAK_1: (usize, usize) = (0, 8);
const PEAK: (usize, usize) = (9, 17);
const OFF_PEAK_2_START: usize = 20;

/// A price entry with timestamps converted to the display timezone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalPriceEntry {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub value: f64,
}

/// One day's price curve: localized entries plus the bare value sequence,
/// both in ascending start order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyCurve {
    pub raw: Vec<LocalPriceEntry>,
    pub values: Vec<f64>,
}

/// Summary statistics over a single day's values. Recomputed on every
/// refresh, never cached across days.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSummary {
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub peak: f64,
    pub off_peak_1: f64,
    pub off_peak_2: f64,
}

/// Sort entries by start time ascending and convert to the display timezone
pub fn localize_and_sort(mut entries: Vec<PriceEntry>, tz: Tz) -> DailyCurve {
    entries.sort_by(|a, b| a.start.cmp(&b.start));

    let raw: Vec<LocalPriceEntry> = entries
        .iter()
        .map(|e| LocalPriceEntry {
            start: e.start.with_timezone(&tz),
            end: e.end.with_timezone(&tz),
            value: e.value,
        })
        .collect();
    let values = entries.iter().map(|e| e.value).collect();

    DailyCurve { raw, values }
}

impl DailyCurve {
    /// Compute the day's summary statistics.
    ///
    /// Fails with a no-data error when any partition is empty (fewer than 21
    /// entries leaves the second off-peak window without values); a partial
    /// day never produces NaN statistics.
    pub fn summarize(&self) -> Result<PriceSummary> {
        let values = &self.values;

        let average = mean(values, "day")?;
        let off_peak_1 = mean(window(values, OFF_PEAK_1.0, OFF_PEAK_1.1), "off_peak_1")?;
        let peak = mean(window(values, PEAK.0, PEAK.1), "peak")?;
        let off_peak_2 = mean(window(values, OFF_PEAK_2_START, values.len()), "off_peak_2")?;

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Ok(PriceSummary {
            average,
            min,
            max,
            peak,
            off_peak_1,
            off_peak_2,
        })
    }
}

/// Index window clamped to the value count
fn window(values: &[f64], start: usize, end: usize) -> &[f64] {
    let len = values.len();
    if start >= len {
        return &[];
    }
    &values[start..end.min(len)]
}

/// Arithmetic mean; an empty partition is an explicit error
fn mean(values: &[f64], partition: &str) -> Result<f64> {
    if values.is_empty() {
        return Err(OerstedError::no_data(format!(
            "Empty {} partition in daily curve",
            partition
        )));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(hour: u32, value: f64) -> PriceEntry {
        PriceEntry {
            start: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap() + chrono::TimeDelta::hours(1),
            value,
        }
    }

    fn full_day_shuffled() -> Vec<PriceEntry> {
        // Hours 0..24 with value == hour, deliberately out of order
        let order = [
            5, 0, 17, 3, 23, 11, 8, 1, 19, 14, 2, 22, 7, 12, 4, 20, 9, 16, 6, 13, 21, 10, 18, 15,
        ];
        order.iter().map(|&h| entry(h, f64::from(h))).collect()
    }

    #[test]
    fn sorting_restores_start_order() {
        let curve = localize_and_sort(full_day_shuffled(), chrono_tz::UTC);
        let expected: Vec<f64> = (0..24).map(f64::from).collect();
        assert_eq!(curve.values, expected);
        for pair in curve.raw.windows(2) {
            assert!(pair[0].start < pair[1].start);
        }
    }

    #[test]
    fn localizes_to_display_timezone() {
        let tz: Tz = "Europe/Copenhagen".parse().unwrap();
        let curve = localize_and_sort(vec![entry(0, 1.0)], tz);
        // 00:00 UTC in January is 01:00 CET
        assert_eq!(
            curve.raw[0].start,
            tz.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap()
        );
    }

    #[test]
    fn summary_matches_hand_computed_windows() {
        let curve = localize_and_sort(full_day_shuffled(), chrono_tz::UTC);
        let summary = curve.summarize().unwrap();

        assert!((summary.average - 11.5).abs() < 1e-9);
        assert!((summary.min - 0.0).abs() < 1e-9);
        assert!((summary.max - 23.0).abs() < 1e-9);
        // mean(0..=7), mean(9..=16), mean(20..=23)
        assert!((summary.off_peak_1 - 3.5).abs() < 1e-9);
        assert!((summary.peak - 12.5).abs() < 1e-9);
        assert!((summary.off_peak_2 - 21.5).abs() < 1e-9);
    }

    #[test]
    fn short_day_fails_with_no_data() {
        // 20 entries: off_peak_2 window [20, 20) is empty
        let entries: Vec<PriceEntry> = (0..20).map(|h| entry(h, f64::from(h))).collect();
        let curve = localize_and_sort(entries, chrono_tz::UTC);
        let err = curve.summarize().unwrap_err();
        assert!(err.is_no_data());
    }

    #[test]
    fn empty_day_fails_with_no_data() {
        let curve = localize_and_sort(Vec::new(), chrono_tz::UTC);
        assert!(curve.summarize().unwrap_err().is_no_data());
    }

    #[test]
    fn twenty_one_entries_is_the_minimum_for_a_summary() {
        let entries: Vec<PriceEntry> = (0..21).map(|h| entry(h, f64::from(h))).collect();
        let curve = localize_and_sort(entries, chrono_tz::UTC);
        let summary = curve.summarize().unwrap();
        assert!((summary.off_peak_2 - 20.0).abs() < 1e-9);
    }
}
