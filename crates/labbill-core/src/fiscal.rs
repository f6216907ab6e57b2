//! # Fiscal Years & Invoice Numbers
//!
//! Indian fiscal years run April 1 to March 31. Invoice sequences reset at
//! the start of each fiscal year.
//!
//! ```text
//! created_at (UTC) ──► business timezone ──► local date ──► FiscalYear
//!
//!   2026-02-14 ──► FY 2025-26 ──► INV/25-26/00042
//!   2026-04-01 ──► FY 2026-27 ──► INV/26-27/00001
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A fiscal year, identified by the calendar year it starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FiscalYear {
    start_year: i32,
}

impl FiscalYear {
    pub const fn starting(start_year: i32) -> Self {
        FiscalYear { start_year }
    }

    /// Fiscal year containing a local calendar date.
    pub fn from_date(date: NaiveDate) -> Self {
        let start_year = if date.month() >= 4 {
            date.year()
        } else {
            date.year() - 1
        };
        FiscalYear { start_year }
    }

    /// Fiscal year containing an instant, as seen in the business timezone.
    pub fn containing(at: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self::from_date(at.with_timezone(&offset).date_naive())
    }

    pub const fn start_year(&self) -> i32 {
        self.start_year
    }

    /// `2025-26`
    pub fn label(&self) -> String {
        format!("{}-{:02}", self.start_year, (self.start_year + 1).rem_euclid(100))
    }

    /// `25-26`
    pub fn short_label(&self) -> String {
        format!(
            "{:02}-{:02}",
            self.start_year.rem_euclid(100),
            (self.start_year + 1).rem_euclid(100)
        )
    }
}

impl fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for FiscalYear {
    type Err = ValidationError;

    /// Parses a `2025-26` label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidFormat {
            field: "fiscal_year".to_string(),
            reason: format!("expected YYYY-YY, got '{}'", s),
        };

        let (start, end) = s.split_once('-').ok_or_else(invalid)?;
        if start.len() != 4 || end.len() != 2 {
            return Err(invalid());
        }
        let start_year: i32 = start.parse().map_err(|_| invalid())?;
        let end_short: i32 = end.parse().map_err(|_| invalid())?;

        if (start_year + 1).rem_euclid(100) != end_short {
            return Err(invalid());
        }

        Ok(FiscalYear { start_year })
    }
}

impl TryFrom<String> for FiscalYear {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FiscalYear> for String {
    fn from(fy: FiscalYear) -> Self {
        fy.label()
    }
}

/// Formats an invoice number: `<prefix>/<FYshort>/<seq padded to 5>`.
///
/// Sequences beyond 99999 are printed in full rather than truncated.
///
/// ## Example
/// ```rust
/// use labbill_core::fiscal::{format_invoice_number, FiscalYear};
///
/// let fy = FiscalYear::starting(2025);
/// assert_eq!(format_invoice_number("INV", fy, 1), "INV/25-26/00001");
/// ```
pub fn format_invoice_number(prefix: &str, fiscal_year: FiscalYear, sequence: i64) -> String {
    format!("{}/{}/{:05}", prefix, fiscal_year.short_label(), sequence)
}

/// Business timezone from a UTC offset in minutes (IST is +330).
pub fn business_offset(utc_offset_minutes: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(utc_offset_minutes * 60)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_fiscal_year_boundaries() {
        assert_eq!(FiscalYear::from_date(date(2026, 2, 14)).label(), "2025-26");
        assert_eq!(FiscalYear::from_date(date(2026, 3, 31)).label(), "2025-26");
        assert_eq!(FiscalYear::from_date(date(2026, 4, 1)).label(), "2026-27");
        assert_eq!(FiscalYear::from_date(date(1999, 12, 31)).label(), "1999-00");
    }

    #[test]
    fn test_business_timezone_shifts_the_date() {
        let ist = business_offset(330).unwrap();
        // 20:00 UTC on March 31 is already April 1 in IST
        let at = Utc.with_ymd_and_hms(2026, 3, 31, 20, 0, 0).unwrap();
        assert_eq!(FiscalYear::containing(at, ist), FiscalYear::starting(2026));

        let utc = business_offset(0).unwrap();
        assert_eq!(FiscalYear::containing(at, utc), FiscalYear::starting(2025));
    }

    #[test]
    fn test_invoice_number_format() {
        let fy = FiscalYear::starting(2025);
        assert_eq!(format_invoice_number("INV", fy, 1), "INV/25-26/00001");
        assert_eq!(format_invoice_number("INV", fy, 42), "INV/25-26/00042");
        assert_eq!(format_invoice_number("LAB", fy, 123_456), "LAB/25-26/123456");
    }

    #[test]
    fn test_parse_label() {
        let fy: FiscalYear = "2025-26".parse().unwrap();
        assert_eq!(fy.start_year(), 2025);
        assert_eq!(fy.to_string(), "2025-26");

        assert!("2025-27".parse::<FiscalYear>().is_err());
        assert!("25-26".parse::<FiscalYear>().is_err());
        assert!("garbage".parse::<FiscalYear>().is_err());
    }
}
