//! 60-day earning cycles anchored at a user's activation date.

use crate::domain::{Decimal, TimeMs};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::warn;

pub const CYCLE_LENGTH_DAYS: i64 = 60;

/// Parse a `dd-mm-yyyy` activation date (`dd/mm/yyyy` also accepted).
pub fn parse_activation_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%d-%m-%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
}

pub fn format_activation_date(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

/// Activation date from the explicit field, else the creation timestamp's
/// UTC date.
pub fn resolve_activation(activated_date: Option<&str>, created_at: TimeMs) -> Option<NaiveDate> {
    if let Some(raw) = activated_date {
        match parse_activation_date(raw) {
            Some(date) => return Some(date),
            None => warn!(
                activated_date = %raw,
                "Unparseable activation date, falling back to creation time"
            ),
        }
    }
    created_at.utc_date()
}

/// An inclusive 60-day window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleWindow {
    pub index: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CycleWindow {
    /// The cycle containing `today` for a user activated on `activation`.
    ///
    /// Dates before activation fall in cycle 1.
    pub fn containing(activation: NaiveDate, today: NaiveDate) -> Self {
        let days_since = (today - activation).num_days().max(0);
        let offset = days_since / CYCLE_LENGTH_DAYS;
        let start = activation + Duration::days(offset * CYCLE_LENGTH_DAYS);
        Self {
            index: (offset + 1) as u32,
            start,
            end: start + Duration::days(CYCLE_LENGTH_DAYS - 1),
        }
    }

    /// `[start_ms, end_ms)` covering the window at UTC day granularity.
    pub fn bounds_ms(&self) -> (TimeMs, TimeMs) {
        (
            TimeMs::start_of_day(self.start),
            TimeMs::start_of_day(self.end + Duration::days(1)),
        )
    }

    pub fn contains(&self, at: TimeMs) -> bool {
        let (start, end) = self.bounds_ms();
        at >= start && at < end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleStats {
    pub cycle_index: u32,
    pub cycle_start: NaiveDate,
    pub cycle_end: NaiveDate,
    pub days_passed: i64,
    pub remaining_days: i64,
    pub matching_bonus_in_cycle: Decimal,
    pub match_count_in_cycle: u64,
}

impl CycleStats {
    /// Stats for `today`, aggregating `(amount, created_at)` matching records.
    /// Records outside the window are ignored.
    pub fn compute(
        window: CycleWindow,
        today: NaiveDate,
        matching_records: impl IntoIterator<Item = (Decimal, TimeMs)>,
    ) -> Self {
        let days_passed = (today - window.start).num_days().clamp(0, CYCLE_LENGTH_DAYS - 1);
        let mut total = Decimal::zero();
        let mut count = 0u64;
        for (amount, created_at) in matching_records {
            if window.contains(created_at) {
                total = total.saturating_add(amount);
                count += 1;
            }
        }
        Self {
            cycle_index: window.index,
            cycle_start: window.start,
            cycle_end: window.end,
            days_passed,
            remaining_days: CYCLE_LENGTH_DAYS - days_passed,
            matching_bonus_in_cycle: total,
            match_count_in_cycle: count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_second_cycle_window() {
        let activation = parse_activation_date("01-01-2024").unwrap();
        let today = date(2024, 3, 5);
        let window = CycleWindow::containing(activation, today);
        let stats = CycleStats::compute(window, today, Vec::new());

        assert_eq!(stats.cycle_index, 2);
        assert_eq!(stats.cycle_start, date(2024, 3, 1));
        assert_eq!(stats.cycle_end, date(2024, 4, 29));
        assert_eq!(stats.days_passed, 4);
        assert_eq!(stats.remaining_days, 56);
    }

    #[test]
    fn test_first_day_and_last_day_of_cycle() {
        let activation = date(2024, 1, 1);
        let first = CycleWindow::containing(activation, activation);
        assert_eq!(first.index, 1);
        assert_eq!(first.end, date(2024, 2, 29));

        let last = CycleWindow::containing(activation, date(2024, 2, 29));
        assert_eq!(last.index, 1);
        let next = CycleWindow::containing(activation, date(2024, 3, 1));
        assert_eq!(next.index, 2);
    }

    #[test]
    fn test_future_activation_is_cycle_one() {
        let window = CycleWindow::containing(date(2024, 6, 1), date(2024, 5, 1));
        assert_eq!(window.index, 1);
        let stats = CycleStats::compute(window, date(2024, 5, 1), Vec::new());
        assert_eq!(stats.days_passed, 0);
        assert_eq!(stats.remaining_days, 60);
    }

    #[test]
    fn test_aggregates_only_records_inside_window() {
        let window = CycleWindow::containing(date(2024, 1, 1), date(2024, 3, 5));
        let (start, end) = window.bounds_ms();
        let amount = Decimal::from_str("500").unwrap();
        let records = vec![
            (amount, TimeMs::new(start.as_ms() - 1)),
            (amount, start),
            (amount, TimeMs::new(end.as_ms() - 1)),
            (amount, end),
        ];
        let stats = CycleStats::compute(window, date(2024, 3, 5), records);
        assert_eq!(stats.match_count_in_cycle, 2);
        assert_eq!(stats.matching_bonus_in_cycle, Decimal::from_str("1000").unwrap());
    }

    #[test]
    fn test_activation_parsing_and_fallback() {
        assert_eq!(parse_activation_date("15/08/2023"), Some(date(2023, 8, 15)));
        assert_eq!(parse_activation_date("2023-08-15"), None);

        let created = TimeMs::start_of_day(date(2023, 9, 2));
        assert_eq!(resolve_activation(None, created), Some(date(2023, 9, 2)));
        assert_eq!(
            resolve_activation(Some("garbage"), created),
            Some(date(2023, 9, 2))
        );
        assert_eq!(
            resolve_activation(Some("01-01-2024"), created),
            Some(date(2024, 1, 1))
        );
        assert_eq!(format_activation_date(date(2024, 1, 1)), "01-01-2024");
    }
}
