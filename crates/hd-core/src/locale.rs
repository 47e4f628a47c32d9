use core::fmt;
use core::str::FromStr;

use crate::error::{CoreError, CoreResult};

/// Locales that have their own default catalog, units and flow systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Locale {
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "en-au"))]
    Australia,
    #[cfg_attr(feature = "serde", serde(rename = "en-us"))]
    UnitedStates,
    #[cfg_attr(feature = "serde", serde(rename = "en-uk"))]
    UnitedKingdom,
}

impl Locale {
    pub const ALL: [Locale; 3] = [
        Locale::Australia,
        Locale::UnitedStates,
        Locale::UnitedKingdom,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Locale::Australia => "en-au",
            Locale::UnitedStates => "en-us",
            Locale::UnitedKingdom => "en-uk",
        }
    }

    /// Locale for a tag such as `en-AU`, ignoring case.
    pub fn from_tag(tag: &str) -> CoreResult<Locale> {
        Locale::ALL
            .into_iter()
            .find(|l| l.tag().eq_ignore_ascii_case(tag))
            .ok_or_else(|| CoreError::UnknownLocale {
                tag: tag.to_string(),
            })
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Locale {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Locale::from_tag(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tags_case_insensitively() {
        assert_eq!("en-US".parse::<Locale>().unwrap(), Locale::UnitedStates);
        assert_eq!("en-au".parse::<Locale>().unwrap(), Locale::Australia);
        assert!("fr-fr".parse::<Locale>().is_err());
    }

    #[test]
    fn unknown_tag_is_named_in_the_error() {
        let err = Locale::from_tag("fr-fr").unwrap_err();
        assert_eq!(
            err,
            CoreError::UnknownLocale {
                tag: "fr-fr".to_string()
            }
        );
        assert!(err.to_string().contains("fr-fr"));
    }

    #[test]
    fn display_round_trips() {
        for locale in Locale::ALL {
            assert_eq!(locale.to_string().parse::<Locale>().unwrap(), locale);
        }
    }
}
