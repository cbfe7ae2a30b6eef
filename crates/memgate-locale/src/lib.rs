//! Locale-aware billing date extraction
//!
//! Turns OCR'd text lines from a membership billing page into a
//! [`RecognizedDate`]. Each supported OCR locale code maps to exactly one
//! pattern; locales whose billing page carries no parseable date share a
//! fallback that always reports "not found".
//!
//! The parsers are pure string-to-structure mappings:
//! - The first matching line wins
//! - Numeric tokens are read as base-10 integers without range checks
//! - A year is never invented when the locale's text omits it
//!
//! # Example
//!
//! ```rust
//! use memgate_locale::{parse_billing_date, Locale};
//!
//! let lines = ["結算日期:2025年3月15日"];
//! let date = parse_billing_date(&lines, Locale::ChineseTraditional);
//! assert_eq!(date.year(), Some(2025));
//! assert_eq!(date.month_day(), Some((3, 15)));
//! ```

#![warn(unreachable_pub)]

pub mod date;
pub mod locale;
pub mod patterns;

pub use date::RecognizedDate;
pub use locale::{Locale, LocaleError};
pub use patterns::parse_billing_date;
