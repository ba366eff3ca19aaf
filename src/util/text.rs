use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{de, Deserialize, Deserializer};

/// Parses an `f64` from its decimal text representation, e.g. `"50000.00"`.
///
/// The text must be a plain number; surrounding whitespace or thousands
/// separators are rejected rather than cleaned.
pub fn parse_f64(s: &str) -> Result<f64> {
    f64::from_str(s).map_err(|why| anyhow!("Failed to parse '{}' as f64 because {:?}", s, why))
}

/// serde helper for decimals that arrive as JSON strings (`"12.5"`).
///
/// A native JSON number is refused, the field must be a string.
pub fn deserialize_f64_from_str<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_f64(&text).map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize, Debug)]
    struct Wrapper {
        #[serde(deserialize_with = "deserialize_f64_from_str")]
        value: f64,
    }

    #[test]
    fn test_parse_f64() {
        assert_eq!(parse_f64("50000.00").unwrap(), 50000.0);
        assert_eq!(parse_f64("-1.25").unwrap(), -1.25);
        assert!(parse_f64("").is_err());
        assert!(parse_f64("1,000.5").is_err());
        assert!(parse_f64("abc").is_err());
    }

    #[test]
    fn test_deserialize_f64_from_str() {
        let w: Wrapper = serde_json::from_str(r#"{"value":"12.5"}"#).unwrap();
        assert_eq!(w.value, 12.5);

        assert!(serde_json::from_str::<Wrapper>(r#"{"value":12.5}"#).is_err());
        assert!(serde_json::from_str::<Wrapper>(r#"{"value":"twelve"}"#).is_err());
        assert!(serde_json::from_str::<Wrapper>(r#"{"value":null}"#).is_err());
    }
}
