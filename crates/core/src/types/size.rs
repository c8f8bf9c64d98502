//! Product variant sizes.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A variant size.
///
/// Covers the apparel ladder explicitly and keeps an `Other` escape value so
/// that non-apparel products (or new apparel sizes) do not require a schema
/// or enum change. Stored and serialized as the display string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Size {
    Xs,
    S,
    M,
    L,
    Xl,
    Xxl,
    /// Free-form size label (e.g. "One Size", "EU 42").
    Other(String),
}

impl Size {
    /// The canonical label for this size.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Xs => "XS",
            Self::S => "S",
            Self::M => "M",
            Self::L => "L",
            Self::Xl => "XL",
            Self::Xxl => "XXL",
            Self::Other(label) => label,
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for Size {
    fn from(s: &str) -> Self {
        // Apparel labels are matched case-insensitively; anything else is
        // preserved verbatim as Other.
        match s.trim().to_ascii_uppercase().as_str() {
            "XS" => Self::Xs,
            "S" => Self::S,
            "M" => Self::M,
            "L" => Self::L,
            "XL" => Self::Xl,
            "XXL" => Self::Xxl,
            _ => Self::Other(s.trim().to_owned()),
        }
    }
}

impl From<String> for Size {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<Size> for String {
    fn from(size: Size) -> Self {
        size.as_str().to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn apparel_sizes_parse_case_insensitively() {
        assert_eq!(Size::from("xs"), Size::Xs);
        assert_eq!(Size::from("XL"), Size::Xl);
        assert_eq!(Size::from(" m "), Size::M);
    }

    #[test]
    fn unknown_labels_fall_back_to_other() {
        assert_eq!(Size::from("One Size"), Size::Other("One Size".to_owned()));
        assert_eq!(Size::from("EU 42").as_str(), "EU 42");
    }

    #[test]
    fn serializes_as_plain_string() {
        assert_eq!(serde_json::to_string(&Size::Xxl).unwrap(), "\"XXL\"");
        let parsed: Size = serde_json::from_str("\"One Size\"").unwrap();
        assert_eq!(parsed, Size::Other("One Size".to_owned()));
    }
}
