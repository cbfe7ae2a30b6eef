//! Supported OCR locale codes

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Locale parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocaleError {
    /// The code is not one of the supported OCR locales
    #[error("unsupported locale code: {0}")]
    Unsupported(String),
}

/// OCR language code of a billing screenshot
///
/// Codes follow the OCR service's naming (`chi_sim`, `deu`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Locale {
    /// Simplified Chinese (`chi_sim`)
    ChineseSimplified,
    /// Traditional Chinese (`chi_tra`)
    ChineseTraditional,
    /// German (`deu`)
    German,
    /// English (`eng`)
    English,
    /// French (`fra`)
    French,
    /// Indonesian (`ind`)
    Indonesian,
    /// Japanese (`jpn`)
    Japanese,
    /// Korean (`kor`)
    Korean,
    /// Russian (`rus`)
    Russian,
    /// Thai (`tha`)
    Thai,
    /// Vietnamese (`vie`)
    Vietnamese,
}

impl Locale {
    /// Every supported locale, in code order
    pub const ALL: [Locale; 11] = [
        Locale::ChineseSimplified,
        Locale::ChineseTraditional,
        Locale::German,
        Locale::English,
        Locale::French,
        Locale::Indonesian,
        Locale::Japanese,
        Locale::Korean,
        Locale::Russian,
        Locale::Thai,
        Locale::Vietnamese,
    ];

    /// OCR service code
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ChineseSimplified => "chi_sim",
            Self::ChineseTraditional => "chi_tra",
            Self::German => "deu",
            Self::English => "eng",
            Self::French => "fra",
            Self::Indonesian => "ind",
            Self::Japanese => "jpn",
            Self::Korean => "kor",
            Self::Russian => "rus",
            Self::Thai => "tha",
            Self::Vietnamese => "vie",
        }
    }
}

impl Display for Locale {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Locale {
    type Err = LocaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Self::ALL
            .into_iter()
            .find(|l| l.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| LocaleError::Unsupported(s.to_string()))
    }
}

impl TryFrom<String> for Locale {
    type Error = LocaleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.code().to_string()
    }
}
