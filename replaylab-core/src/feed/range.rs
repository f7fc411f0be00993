//! Inclusive timestamp window applied to a feed before replay.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::domain::Bar;

/// Optional inclusive `[start, end]` bounds on bar timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl ReplayRange {
    /// No bounds: the whole feed is replayed.
    pub const fn full() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    pub const fn new(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        Self { start, end }
    }

    pub fn is_full(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        self.start.map_or(true, |s| timestamp >= s) && self.end.map_or(true, |e| timestamp <= e)
    }

    /// Bars inside the range, in feed order. Borrows when unbounded.
    pub fn select<'a>(&self, bars: &'a [Bar]) -> Cow<'a, [Bar]> {
        if self.is_full() {
            return Cow::Borrowed(bars);
        }
        Cow::Owned(
            bars.iter()
                .filter(|b| self.contains(b.timestamp))
                .cloned()
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn bars() -> Vec<Bar> {
        (2..=5)
            .map(|day| Bar {
                timestamp: at(day, 10),
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                sig_long: false,
                sig_short: false,
                sl_level: None,
                tp_level: None,
            })
            .collect()
    }

    #[test]
    fn full_range_borrows() {
        let bars = bars();
        assert!(matches!(ReplayRange::full().select(&bars), Cow::Borrowed(_)));
    }

    #[test]
    fn bounds_are_inclusive() {
        let bars = bars();
        let range = ReplayRange::new(Some(at(3, 10)), Some(at(4, 10)));
        let selected = range.select(&bars);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].timestamp, at(3, 10));
        assert_eq!(selected[1].timestamp, at(4, 10));
    }

    #[test]
    fn open_ended_bounds() {
        let bars = bars();
        assert_eq!(ReplayRange::new(Some(at(4, 0)), None).select(&bars).len(), 2);
        assert_eq!(ReplayRange::new(None, Some(at(2, 23))).select(&bars).len(), 1);
    }

    #[test]
    fn out_of_range_yields_empty() {
        let bars = bars();
        let range = ReplayRange::new(Some(at(20, 0)), None);
        assert!(range.select(&bars).is_empty());
    }
}
