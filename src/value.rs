//! Tagged attribute values.
//!
//! Raw data enters the crate as JSON-shaped mappings (YAML files are decoded
//! into the same shape). Entities store [`Value`]s, which add two things JSON
//! lacks: calendar dates, and [`Link`]s to other content entries once
//! relationships have been resolved.

use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Reference to a content entry held in a mounting point.
///
/// `key` addresses the entry in the mounting point's collection
/// (`"{content_type}/{slug}"`); `id` is the entry's identifier, which is what
/// queries compare against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Link {
    pub key: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Link(Link),
}

impl Value {
    /// Convert a decoded JSON (or YAML) value. Strings stay strings; dates
    /// are only recognised when a field schema asks for them.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert back to JSON for writers. Links collapse to their identifier.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Link(link) => serde_json::Value::String(link.id.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, empty strings and empty lists count as blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Map(map) => map.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::String(s) if s == "true" => Some(true),
            Value::String(s) if s == "false" => Some(false),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_link(&self) -> Option<&Link> {
        match self {
            Value::Link(link) => Some(link),
            _ => None,
        }
    }

    /// Identifier of a linked entry, if this value is a link.
    pub fn identifier(&self) -> Option<&str> {
        self.as_link().map(|l| l.id.as_str())
    }

    /// Replace links (at any depth of a list) by their identifier string.
    pub fn to_identifiers(&self) -> Value {
        match self {
            Value::Link(link) => Value::String(link.id.clone()),
            Value::List(items) => Value::List(items.iter().map(Value::to_identifiers).collect()),
            other => other.clone(),
        }
    }

    /// Ordering across compatible variants.
    ///
    /// Integers and floats compare numerically; a date compares with an ISO
    /// date string; links compare by identifier. Incompatible pairs yield
    /// `None`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::String(b)) => parse_date(b).map(|b| a.cmp(&b)),
            (Value::String(a), Value::Date(b)) => parse_date(a).map(|a| a.cmp(b)),
            (Value::Link(a), Value::Link(b)) => Some(a.id.cmp(&b.id)),
            (Value::Link(a), Value::String(b)) => Some(a.id.as_str().cmp(b.as_str())),
            (Value::String(a), Value::Link(b)) => Some(a.as_str().cmp(b.id.as_str())),
            _ => None,
        }
    }

    /// Equality that tolerates numeric and date/string representation
    /// differences.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match self.compare(other) {
            Some(ordering) => ordering == Ordering::Equal,
            None => self == other,
        }
    }
}

/// Parse `YYYY-MM-DD` (also accepts `DD/MM/YYYY`, the filesystem writer's
/// historical format).
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(input, "%d/%m/%Y"))
        .ok()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(", "))
            }
            Value::Map(_) => f.write_str(&self.to_json().to_string()),
            Value::Link(link) => f.write_str(&link.id),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<Link> for Value {
    fn from(link: Link) -> Self {
        Value::Link(link)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_numbers_keep_integer_precision() {
        assert_eq!(Value::from_json(&json!(42)), Value::Integer(42));
        assert_eq!(Value::from_json(&json!(4.5)), Value::Float(4.5));
    }

    #[test]
    fn links_serialize_as_identifier() {
        let link = Value::Link(Link {
            key: "authors/jane".into(),
            id: "jane".into(),
        });
        assert_eq!(link.to_json(), json!("jane"));
    }

    #[test]
    fn mixed_numeric_comparison() {
        assert_eq!(
            Value::Integer(3).compare(&Value::Float(2.5)),
            Some(Ordering::Greater)
        );
        assert!(Value::Integer(2).loose_eq(&Value::Float(2.0)));
    }

    #[test]
    fn date_compares_with_iso_string() {
        let date = Value::Date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(date.compare(&"2024-01-01".into()), Some(Ordering::Greater));
        assert!(date.loose_eq(&"01/05/2024".into()));
    }

    #[test]
    fn incompatible_values_do_not_order() {
        assert_eq!(Value::Bool(true).compare(&Value::Integer(1)), None);
        assert!(!Value::Bool(true).loose_eq(&Value::Integer(1)));
    }

    #[test]
    fn blank_detection() {
        assert!(Value::Null.is_blank());
        assert!(Value::from("  ").is_blank());
        assert!(Value::List(vec![]).is_blank());
        assert!(!Value::Bool(false).is_blank());
    }
}
