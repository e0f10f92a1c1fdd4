//! Source type of an ingested document.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Kind of publication a document came from.
///
/// Unknown kinds are preserved via `Other(String)` so that filters on
/// collector-specific types keep working.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceType {
    /// Research paper (arXiv, conference proceedings)
    Paper,
    /// News article
    News,
    /// Industry or institutional report
    Report,
    /// Blog post
    Blog,
    /// Any other source type (e.g., "podcast", "patent")
    Other(String),
}

impl SourceType {
    /// Hint passed to the classifier.
    pub fn as_hint(&self) -> &str {
        match self {
            SourceType::Paper => "paper",
            SourceType::News => "news",
            SourceType::Report => "report",
            SourceType::Blog => "blog",
            SourceType::Other(s) => s,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_hint())
    }
}

impl std::str::FromStr for SourceType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "paper" => SourceType::Paper,
            "news" => SourceType::News,
            "report" => SourceType::Report,
            "blog" => SourceType::Blog,
            other => SourceType::Other(other.to_string()),
        })
    }
}

impl Serialize for SourceType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_hint())
    }
}

impl<'de> Deserialize<'de> for SourceType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let Ok(source_type) = s.parse::<SourceType>();
        Ok(source_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_and_unknown() {
        assert_eq!("Paper".parse::<SourceType>().unwrap(), SourceType::Paper);
        assert_eq!(" news ".parse::<SourceType>().unwrap(), SourceType::News);
        assert_eq!(
            "patent".parse::<SourceType>().unwrap(),
            SourceType::Other("patent".to_string())
        );
    }

    #[test]
    fn test_serde_as_plain_string() {
        let json = serde_json::to_string(&SourceType::Report).unwrap();
        assert_eq!(json, "\"report\"");
        let back: SourceType = serde_json::from_str("\"blog\"").unwrap();
        assert_eq!(back, SourceType::Blog);
    }
}
