//! Validity decision
//!
//! Turns evidence plus an as-of date into one of three outcomes. Total:
//! every input maps to exactly one [`Decision`] and nothing here fails.
//!
//! Dates whose year was absent from the billing text resolve to the next
//! occurrence of that month/day on or after the as-of date. Such a date
//! is in the future by construction, so year-less evidence can only ever
//! decide `Active` or `Indeterminate`, never `Expired`. This asymmetry is
//! kept for compatibility with existing members; see DESIGN.md.

use crate::evidence::MembershipEvidence;
use crate::types::BillingDate;
use chrono::{Datelike, NaiveDate};
use memgate_locale::RecognizedDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// Feb 29 recurs within eight years even across skipped century leap years.
const YEARLESS_SEARCH_SPAN: i32 = 8;

/// Why evidence could not confirm membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndeterminateReason {
    /// OCR text carried no recognizable billing date
    NoDateFound,
    /// A date was read but is not a real calendar date
    InvalidDate(RecognizedDate),
}

impl fmt::Display for IndeterminateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDateFound => f.write_str(
                "no billing date could be read from the screenshot; \
                 make sure the next billing date is visible and the language is correct",
            ),
            Self::InvalidDate(date) => {
                write!(f, "the billing date {date} read from the screenshot is not a valid date")
            }
        }
    }
}

/// Outcome of evaluating evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Membership confirmed
    Active,
    /// Membership lapsed
    Expired,
    /// Evidence cannot confirm membership either way
    Indeterminate(IndeterminateReason),
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Expired => f.write_str("expired"),
            Self::Indeterminate(_) => f.write_str("indeterminate"),
        }
    }
}

/// Resolve a recognized date to a calendar date relative to `as_of`
///
/// Returns `None` when the date is unknown or not a valid calendar date.
/// A missing year resolves to the first valid occurrence on or after
/// `as_of`.
#[must_use]
pub fn resolve_billing_date(date: &RecognizedDate, as_of: NaiveDate) -> Option<BillingDate> {
    let (month, day) = date.month_day()?;

    match date.year() {
        Some(year) => NaiveDate::from_ymd_opt(year, month, day).map(|date| BillingDate {
            date,
            year_known: true,
        }),
        None => (as_of.year()..=as_of.year() + YEARLESS_SEARCH_SPAN)
            .filter_map(|year| NaiveDate::from_ymd_opt(year, month, day))
            .find(|candidate| *candidate >= as_of)
            .map(|date| BillingDate {
                date,
                year_known: false,
            }),
    }
}

/// Decide membership validity as of `as_of`
#[must_use]
pub fn decide(evidence: &MembershipEvidence, as_of: NaiveDate) -> Decision {
    match evidence {
        MembershipEvidence::ApiMembership(true) => Decision::Active,
        MembershipEvidence::ApiMembership(false) => Decision::Expired,
        MembershipEvidence::ParsedDate(date) if date.is_unknown() => {
            Decision::Indeterminate(IndeterminateReason::NoDateFound)
        }
        MembershipEvidence::ParsedDate(date) => match resolve_billing_date(date, as_of) {
            None => Decision::Indeterminate(IndeterminateReason::InvalidDate(*date)),
            Some(billing) if billing.date >= as_of => Decision::Active,
            Some(_) => Decision::Expired,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn parsed(date: RecognizedDate) -> MembershipEvidence {
        MembershipEvidence::ParsedDate(date)
    }

    #[test]
    fn api_flag_maps_directly() {
        let as_of = day(2025, 1, 1);
        assert_eq!(decide(&MembershipEvidence::ApiMembership(true), as_of), Decision::Active);
        assert_eq!(decide(&MembershipEvidence::ApiMembership(false), as_of), Decision::Expired);
    }

    #[test]
    fn unknown_date_is_indeterminate() {
        assert_eq!(
            decide(&parsed(RecognizedDate::unknown()), day(2025, 1, 1)),
            Decision::Indeterminate(IndeterminateReason::NoDateFound)
        );
    }

    #[test]
    fn future_billing_date_is_active() {
        let ev = parsed(RecognizedDate::ymd(2025, 3, 15));
        assert_eq!(decide(&ev, day(2025, 3, 1)), Decision::Active);
    }

    #[test]
    fn billing_date_today_is_active() {
        let ev = parsed(RecognizedDate::ymd(2025, 3, 15));
        assert_eq!(decide(&ev, day(2025, 3, 15)), Decision::Active);
    }

    #[test]
    fn past_billing_date_is_expired() {
        let ev = parsed(RecognizedDate::ymd(2025, 3, 15));
        assert_eq!(decide(&ev, day(2025, 3, 16)), Decision::Expired);
    }

    #[test]
    fn out_of_range_month_is_indeterminate() {
        let date = RecognizedDate::ymd(2025, 13, 1);
        assert_eq!(
            decide(&parsed(date), day(2025, 1, 1)),
            Decision::Indeterminate(IndeterminateReason::InvalidDate(date))
        );
        let yearless = RecognizedDate::without_year(2, 30);
        assert!(matches!(
            decide(&parsed(yearless), day(2025, 1, 1)),
            Decision::Indeterminate(_)
        ));
    }

    #[test]
    fn yearless_date_rolls_into_next_year() {
        let billing = resolve_billing_date(&RecognizedDate::without_year(1, 10), day(2025, 3, 1));
        assert_eq!(
            billing,
            Some(BillingDate {
                date: day(2026, 1, 10),
                year_known: false
            })
        );
    }

    #[test]
    fn yearless_date_later_this_year() {
        let billing = resolve_billing_date(&RecognizedDate::without_year(12, 1), day(2025, 3, 1));
        assert_eq!(billing.map(|b| b.date), Some(day(2025, 12, 1)));
    }

    #[test]
    fn yearless_leap_day_finds_next_leap_year() {
        let billing = resolve_billing_date(&RecognizedDate::without_year(2, 29), day(2025, 3, 1));
        assert_eq!(billing.map(|b| b.date), Some(day(2028, 2, 29)));
    }

    #[test]
    fn yearless_past_date_is_still_active() {
        // Known limitation: a lapsed year-less date cannot be told apart from next year's.
        let ev = parsed(RecognizedDate::without_year(1, 1));
        assert_eq!(decide(&ev, day(2025, 6, 1)), Decision::Active);
    }

    #[test]
    fn reason_is_human_readable() {
        let reason = IndeterminateReason::NoDateFound.to_string();
        assert!(reason.contains("no billing date"));
        let invalid = IndeterminateReason::InvalidDate(RecognizedDate::ymd(2025, 13, 1)).to_string();
        assert!(invalid.contains("2025-13-01"));
    }
}
