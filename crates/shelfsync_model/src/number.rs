//! Numbers that clients send either as JSON numbers or as numeric text.

use serde::{Deserialize, Serialize};

/// A timestamp-like value that arrives as an integer, a float or a string.
///
/// The original representation is preserved on serialization; comparisons
/// go through [`LooseNumber::as_i64`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    /// Integral JSON number.
    Int(i64),
    /// Non-integral JSON number.
    Float(f64),
    /// Numeric text, e.g. `"1700000000000"`.
    Text(String),
}

impl LooseNumber {
    /// Coerces the value to an integer.
    ///
    /// Text that is neither an integer nor a float coerces to `0`.
    pub fn as_i64(&self) -> i64 {
        match self {
            LooseNumber::Int(v) => *v,
            LooseNumber::Float(v) => *v as i64,
            LooseNumber::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
                    .unwrap_or(0)
            }
        }
    }
}

impl Default for LooseNumber {
    fn default() -> Self {
        LooseNumber::Int(0)
    }
}

impl From<i64> for LooseNumber {
    fn from(value: i64) -> Self {
        LooseNumber::Int(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_each_representation() {
        assert_eq!(LooseNumber::Int(42).as_i64(), 42);
        assert_eq!(LooseNumber::Float(42.9).as_i64(), 42);
        assert_eq!(LooseNumber::Text("1700000000000".into()).as_i64(), 1_700_000_000_000);
        assert_eq!(LooseNumber::Text(" 12.5 ".into()).as_i64(), 12);
        assert_eq!(LooseNumber::Text("yesterday".into()).as_i64(), 0);
    }

    #[test]
    fn preserves_wire_form() {
        let text: LooseNumber = serde_json::from_str("\"123\"").unwrap();
        assert_eq!(text, LooseNumber::Text("123".into()));
        assert_eq!(serde_json::to_string(&text).unwrap(), "\"123\"");

        let int: LooseNumber = serde_json::from_str("123").unwrap();
        assert_eq!(int, LooseNumber::Int(123));
        assert_eq!(serde_json::to_string(&int).unwrap(), "123");
    }

    #[test]
    fn numeric_text_orders_like_numbers() {
        let earlier = LooseNumber::Text("999".into());
        let later = LooseNumber::Int(1000);
        assert!(later.as_i64() > earlier.as_i64());
    }
}
