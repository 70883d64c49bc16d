use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Display languages supported by the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    So,
    En,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::So => "so",
            Locale::En => "en",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "so" => Ok(Locale::So),
            "en" => Ok(Locale::En),
            other => Err(format!("unsupported locale '{}'", other)),
        }
    }
}

/// A bilingual text field: the legacy default plus English and Somali variants.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalizedText {
    pub default: String,
    pub en: String,
    pub so: String,
}

impl LocalizedText {
    pub fn new(default: impl Into<String>, en: impl Into<String>, so: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            en: en.into(),
            so: so.into(),
        }
    }

    /// Same text in every variant.
    pub fn uniform(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            default: text.clone(),
            en: text.clone(),
            so: text,
        }
    }

    /// Picks the variant for `locale`, falling back to the default text when
    /// that variant is blank.
    pub fn pick(&self, locale: Locale) -> &str {
        let chosen = match locale {
            Locale::So => &self.so,
            Locale::En => &self.en,
        };
        if chosen.trim().is_empty() {
            &self.default
        } else {
            chosen
        }
    }

    /// Case-insensitive substring match against any variant. `needle` must
    /// already be lowercased.
    pub fn contains_lowercase(&self, needle: &str) -> bool {
        [&self.default, &self.en, &self.so]
            .iter()
            .any(|text| text.to_lowercase().contains(needle))
    }

    pub fn is_blank(&self) -> bool {
        self.default.trim().is_empty() && self.en.trim().is_empty() && self.so.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_uses_requested_variant() {
        let title = LocalizedText::new("Python", "Python Basics", "Python Bilaaga");
        assert_eq!(title.pick(Locale::En), "Python Basics");
        assert_eq!(title.pick(Locale::So), "Python Bilaaga");
    }

    #[test]
    fn pick_falls_back_to_default_when_variant_blank() {
        let title = LocalizedText::new("Ganacsi", "Business", "  ");
        assert_eq!(title.pick(Locale::So), "Ganacsi");
    }

    #[test]
    fn search_matches_any_variant() {
        let desc = LocalizedText::new("Learn Python", "Learn Python from scratch", "Baro Python");
        assert!(desc.contains_lowercase("scratch"));
        assert!(desc.contains_lowercase("baro"));
        assert!(!desc.contains_lowercase("rust"));
    }

    #[test]
    fn locale_parsing_is_case_insensitive() {
        assert_eq!("SO".parse::<Locale>().unwrap(), Locale::So);
        assert_eq!(" en ".parse::<Locale>().unwrap(), Locale::En);
        assert!("fr".parse::<Locale>().is_err());
    }
}
