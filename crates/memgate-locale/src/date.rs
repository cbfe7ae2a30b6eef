//! Partially-known calendar dates produced by the locale parsers

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// A date read from OCR text, any part of which may be unknown
///
/// Either every field is unknown (no match) or month and day are both
/// known. The year is optional because some locales omit it. Values are
/// not range-checked here; month 13 is representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RecognizedDate {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
}

impl RecognizedDate {
    /// The fully-unknown sentinel returned when no line matched
    #[inline]
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            year: None,
            month: None,
            day: None,
        }
    }

    /// Date with all three fields known
    #[inline]
    #[must_use]
    pub const fn ymd(year: i32, month: u32, day: u32) -> Self {
        Self {
            year: Some(year),
            month: Some(month),
            day: Some(day),
        }
    }

    /// Date whose year was not present in the source text
    #[inline]
    #[must_use]
    pub const fn without_year(month: u32, day: u32) -> Self {
        Self {
            year: None,
            month: Some(month),
            day: Some(day),
        }
    }

    /// Year, if the text carried one
    #[inline]
    #[must_use]
    pub const fn year(&self) -> Option<i32> {
        self.year
    }

    /// Month and day, present together or not at all
    #[inline]
    #[must_use]
    pub fn month_day(&self) -> Option<(u32, u32)> {
        self.month.zip(self.day)
    }

    /// True when no date was found
    #[inline]
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.month_day().is_none()
    }

    /// True when month and day are known but the year is not
    #[inline]
    #[must_use]
    pub fn is_year_missing(&self) -> bool {
        self.year.is_none() && !self.is_unknown()
    }
}

impl Display for RecognizedDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match (self.year, self.month_day()) {
            (_, None) => write!(f, "unknown"),
            (Some(y), Some((m, d))) => write!(f, "{y:04}-{m:02}-{d:02}"),
            (None, Some((m, d))) => write!(f, "????-{m:02}-{d:02}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sentinel() {
        let d = RecognizedDate::unknown();
        assert!(d.is_unknown());
        assert!(!d.is_year_missing());
        assert_eq!(d.month_day(), None);
        assert_eq!(d, RecognizedDate::default());
    }

    #[test]
    fn year_missing() {
        let d = RecognizedDate::without_year(3, 9);
        assert!(d.is_year_missing());
        assert_eq!(d.to_string(), "????-03-09");
    }

    #[test]
    fn display_full_date() {
        assert_eq!(RecognizedDate::ymd(2025, 3, 15).to_string(), "2025-03-15");
        assert_eq!(RecognizedDate::unknown().to_string(), "unknown");
    }
}
