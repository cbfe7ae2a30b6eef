//! Per-locale billing date patterns
//!
//! One matcher per locale, dispatched by [`Locale`]. Every matcher uses
//! the named groups `y`, `m` and `d`, so token order lives in the pattern
//! itself. Digits are matched as ASCII `[0-9]` only; OCR output in other
//! digit systems is treated as "no match".

use crate::date::RecognizedDate;
use crate::locale::Locale;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

// `YYYY年M月D日`, shared by both Chinese scripts
static CHINESE: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?P<y>[0-9]{4})\s*年\s*(?P<m>[0-9]{1,2})\s*月\s*(?P<d>[0-9]{1,2})\s*日")
});

// `D.M.YYYY`
static GERMAN: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?:^|[^0-9.])(?P<d>[0-9]{1,2})\s*\.\s*(?P<m>[0-9]{1,2})\s*\.\s*(?P<y>[0-9]{4})(?:[^0-9]|$)")
});

// `YYYY/MM/DD`
static JAPANESE: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?:^|[^0-9])(?P<y>[0-9]{4})\s*/\s*(?P<m>[0-9]{1,2})\s*/\s*(?P<d>[0-9]{1,2})(?:[^0-9]|$)")
});

// `YYYY. M. D.`
static KOREAN: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?:^|[^0-9])(?P<y>[0-9]{4})\s*\.\s*(?P<m>[0-9]{1,2})\s*\.\s*(?P<d>[0-9]{1,2})\s*\.")
});

// `D thg M`, optionally followed by `, YYYY`. Without a year, a digit run
// after the month makes the line a non-match rather than a year-less date.
static VIETNAMESE: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)(?:^|[^0-9])(?P<d>[0-9]{1,2})\s*thg\s*(?P<m>[0-9]{1,2})(?:\s*,?\s*(?P<y>[0-9]{4})(?:[^0-9]|$)|\s*,?\s*(?:[^0-9\s,]|$))",
    )
});

fn compile(pattern: &str) -> Regex {
    // Patterns are compile-time constants covered by the tests below.
    Regex::new(pattern).expect("billing date pattern must compile")
}

/// The matcher for a locale, or `None` for locales on the fallback
fn matcher(locale: Locale) -> Option<&'static Regex> {
    match locale {
        Locale::ChineseSimplified | Locale::ChineseTraditional => Some(&*CHINESE),
        Locale::German => Some(&*GERMAN),
        Locale::Japanese => Some(&*JAPANESE),
        Locale::Korean => Some(&*KOREAN),
        Locale::Vietnamese => Some(&*VIETNAMESE),
        Locale::English
        | Locale::French
        | Locale::Indonesian
        | Locale::Russian
        | Locale::Thai => None,
    }
}

/// Extract the next billing date from OCR text lines
///
/// Scans `lines` in order and returns the date from the first line that
/// matches the locale's pattern. Returns [`RecognizedDate::unknown`] when
/// nothing matches or the locale has no pattern.
#[must_use]
pub fn parse_billing_date<S: AsRef<str>>(lines: &[S], locale: Locale) -> RecognizedDate {
    let Some(re) = matcher(locale) else {
        return RecognizedDate::unknown();
    };

    lines
        .iter()
        .find_map(|line| re.captures(line.as_ref()).and_then(|caps| extract(&caps)))
        .unwrap_or_else(RecognizedDate::unknown)
}

fn extract(caps: &Captures<'_>) -> Option<RecognizedDate> {
    let month = caps.name("m")?.as_str().parse::<u32>().ok()?;
    let day = caps.name("d")?.as_str().parse::<u32>().ok()?;

    match caps.name("y") {
        Some(y) => Some(RecognizedDate::ymd(y.as_str().parse().ok()?, month, day)),
        None => Some(RecognizedDate::without_year(month, day)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn all_patterns_compile() {
        for locale in Locale::ALL {
            let _ = matcher(locale).map(Regex::as_str);
        }
    }

    #[test]
    fn chinese_simplified() {
        let lines = ["结算日期:2025年3月15日"];
        assert_eq!(
            parse_billing_date(&lines, Locale::ChineseSimplified),
            RecognizedDate::ymd(2025, 3, 15)
        );
    }

    #[test]
    fn chinese_tolerates_ocr_spacing() {
        let lines = ["下次帳單日期 2024 年 12 月 1 日"];
        assert_eq!(
            parse_billing_date(&lines, Locale::ChineseTraditional),
            RecognizedDate::ymd(2024, 12, 1)
        );
    }

    #[test]
    fn german() {
        let lines = ["Nächstes Abrechnungsdatum: 7.11.2025"];
        assert_eq!(
            parse_billing_date(&lines, Locale::German),
            RecognizedDate::ymd(2025, 11, 7)
        );
    }

    #[test]
    fn japanese() {
        let lines = ["次回の請求日：2025/04/02"];
        assert_eq!(
            parse_billing_date(&lines, Locale::Japanese),
            RecognizedDate::ymd(2025, 4, 2)
        );
    }

    #[test]
    fn korean() {
        let lines = ["다음 결제일: 2025. 6. 30."];
        assert_eq!(
            parse_billing_date(&lines, Locale::Korean),
            RecognizedDate::ymd(2025, 6, 30)
        );
    }

    #[test]
    fn vietnamese_without_year() {
        let lines = ["Ngày thanh toán tiếp theo: 15 thg 3"];
        assert_eq!(
            parse_billing_date(&lines, Locale::Vietnamese),
            RecognizedDate::without_year(3, 15)
        );
    }

    #[test]
    fn vietnamese_with_year() {
        let lines = ["Ngày thanh toán tiếp theo: 2 thg 10, 2025"];
        assert_eq!(
            parse_billing_date(&lines, Locale::Vietnamese),
            RecognizedDate::ymd(2025, 10, 2)
        );
    }

    #[test]
    fn out_of_range_tokens_pass_through() {
        let lines = ["2025年13月45日"];
        assert_eq!(
            parse_billing_date(&lines, Locale::ChineseSimplified),
            RecognizedDate::ymd(2025, 13, 45)
        );
    }

    #[test]
    fn fallback_locales_never_match() {
        let lines = ["Next billing date: Mar 15, 2025", "2025年3月15日", "15.3.2025"];
        for locale in [
            Locale::English,
            Locale::French,
            Locale::Indonesian,
            Locale::Russian,
            Locale::Thai,
        ] {
            assert!(parse_billing_date(&lines, locale).is_unknown(), "{locale}");
        }
    }

    #[test]
    fn non_ascii_digits_do_not_match() {
        let lines = ["２０２５年３月１５日"];
        assert!(parse_billing_date(&lines, Locale::ChineseSimplified).is_unknown());
    }

    #[test]
    fn vietnamese_ignores_longer_numbers() {
        for line in ["15 thg 123", "2 thg 10, 20251", "2 thg 10 20251"] {
            assert!(parse_billing_date(&[line], Locale::Vietnamese).is_unknown(), "{line}");
        }
    }

    #[test]
    fn vietnamese_month_followed_by_text() {
        let lines = ["Gia hạn 15 thg 3, hết hạn sau đó"];
        assert_eq!(
            parse_billing_date(&lines, Locale::Vietnamese),
            RecognizedDate::without_year(3, 15)
        );
    }

    #[test]
    fn german_ignores_longer_numbers() {
        let lines = ["Rechnung 123.4.20256"];
        assert!(parse_billing_date(&lines, Locale::German).is_unknown());
    }
}
