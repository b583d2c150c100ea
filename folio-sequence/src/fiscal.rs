//! Fiscal year resolution.
//!
//! A fiscal year starts on April 1 and is labelled by its two calendar years,
//! e.g. `2024-25` for the period 2024-04-01 through 2025-03-31.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDate};
use parking_lot::Mutex;

use crate::SequenceError;

/// First month (1-indexed) of the fiscal year.
pub const FISCAL_YEAR_START_MONTH: u32 = 4;

/// Twelve-month accounting period identified by the calendar year it starts in.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct FiscalYear {
    pub start_year: i32,
}

impl FiscalYear {
    pub fn new(start_year: i32) -> Self {
        Self { start_year }
    }

    /// Resolve the fiscal year that contains `date`.
    pub fn containing(date: NaiveDate) -> Self {
        if date.month() >= FISCAL_YEAR_START_MONTH {
            Self::new(date.year())
        } else {
            Self::new(date.year() - 1)
        }
    }

    pub fn label(&self) -> String {
        format!(
            "{}-{:02}",
            self.start_year,
            (self.start_year + 1).rem_euclid(100)
        )
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.start_year, FISCAL_YEAR_START_MONTH, 1)
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.start_year + 1, FISCAL_YEAR_START_MONTH, 1)
            .and_then(|next| next.pred_opt())
    }

    pub fn next(&self) -> Self {
        Self::new(self.start_year + 1)
    }
}

impl fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for FiscalYear {
    type Err = SequenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SequenceError::InvalidFiscalYear(s.to_string());
        let (start, end) = s.trim().split_once('-').ok_or_else(invalid)?;
        if start.len() != 4 || end.len() != 2 {
            return Err(invalid());
        }
        let start_year: i32 = start.parse().map_err(|_| invalid())?;
        let end_suffix: i32 = end.parse().map_err(|_| invalid())?;
        if (start_year + 1).rem_euclid(100) != end_suffix {
            return Err(invalid());
        }
        Ok(Self::new(start_year))
    }
}

/// Label of the fiscal year containing `date`.
pub fn fiscal_year_label(date: NaiveDate) -> String {
    FiscalYear::containing(date).label()
}

/// Source of the current calendar date.
///
/// The allocator asks the clock on every call so a long-running process rolls
/// over to the new fiscal year without a restart.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Clock backed by the host's local calendar date.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Manually driven clock used by tests and backfills.
#[derive(Debug)]
pub struct FixedClock {
    date: Mutex<NaiveDate>,
}

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: Mutex::new(date),
        }
    }

    pub fn set(&self, date: NaiveDate) {
        *self.date.lock() = date;
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.date.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn resolves_labels_on_either_side_of_april() {
        assert_eq!(fiscal_year_label(date(2024, 6, 15)), "2024-25");
        assert_eq!(fiscal_year_label(date(2025, 2, 10)), "2024-25");
    }

    #[test]
    fn boundary_falls_on_april_first() {
        assert_eq!(fiscal_year_label(date(2025, 3, 31)), "2024-25");
        assert_eq!(fiscal_year_label(date(2025, 4, 1)), "2025-26");
        assert_eq!(fiscal_year_label(date(2025, 1, 1)), "2024-25");
        assert_eq!(fiscal_year_label(date(2024, 12, 31)), "2024-25");
    }

    #[test]
    fn century_rollover_keeps_two_digits() {
        assert_eq!(fiscal_year_label(date(2099, 5, 1)), "2099-00");
        assert_eq!(fiscal_year_label(date(2009, 5, 1)), "2009-10");
        assert_eq!(fiscal_year_label(date(2000, 1, 1)), "1999-00");
    }

    #[test]
    fn period_bounds_cover_april_through_march() {
        let fy = FiscalYear::new(2024);
        assert_eq!(fy.start_date(), Some(date(2024, 4, 1)));
        assert_eq!(fy.end_date(), Some(date(2025, 3, 31)));
        assert_eq!(fy.next().label(), "2025-26");
    }

    #[test]
    fn parses_labels_and_rejects_inconsistent_halves() {
        assert_eq!("2024-25".parse::<FiscalYear>().unwrap(), FiscalYear::new(2024));
        assert_eq!("2099-00".parse::<FiscalYear>().unwrap(), FiscalYear::new(2099));
        assert!("2024-26".parse::<FiscalYear>().is_err());
        assert!("2024".parse::<FiscalYear>().is_err());
        assert!("24-25".parse::<FiscalYear>().is_err());
        assert!("2024-2025".parse::<FiscalYear>().is_err());
    }

    #[test]
    fn fixed_clock_can_be_moved() {
        let clock = FixedClock::new(date(2025, 3, 31));
        assert_eq!(clock.today(), date(2025, 3, 31));
        clock.set(date(2025, 4, 1));
        assert_eq!(clock.today(), date(2025, 4, 1));
    }
}
