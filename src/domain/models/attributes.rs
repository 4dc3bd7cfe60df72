//! Ecommerce attribute values and their JSON normalization.
//!
//! Attribute maps carry the analytics-relevant fields of a tracked item or
//! event (price, brand, category, variant, position, quantity, list name).
//! Values are restricted to what the payload can represent: plain scalars,
//! dates (rendered as ISO-8601 strings) and decimals (rendered as JSON
//! floating-point numbers). Anything else is rejected when the map is built.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::{TrackerError, TrackerResult};

const MAX_DECIMAL_SCALE: u32 = 18;

/// Fixed-point decimal used for currency amounts.
///
/// Stored as integer `units` scaled by `10^scale`, so `15.25` is
/// `Decimal::new(1525, 2)`. The scale never exceeds 18.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    units: i64,
    scale: u32,
}

impl Decimal {
    /// Builds a decimal; fractional digits beyond a scale of 18 are
    /// truncated toward zero.
    pub const fn new(units: i64, scale: u32) -> Self {
        let mut units = units;
        let mut scale = scale;
        while scale > MAX_DECIMAL_SCALE {
            if units == 0 {
                scale = MAX_DECIMAL_SCALE;
                break;
            }
            units /= 10;
            scale -= 1;
        }
        Self { units, scale }
    }

    pub const fn units(self) -> i64 {
        self.units
    }

    pub const fn scale(self) -> u32 {
        self.scale
    }

    /// Lossy conversion used when the value is written to JSON.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    pub fn to_f64(self) -> f64 {
        self.units as f64 / 10f64.powi(self.scale as i32)
    }
}

impl FromStr for Decimal {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TrackerError::InvalidDecimal(s.to_string());

        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let scale = u32::try_from(fraction.len()).map_err(|_| invalid())?;
        if scale > MAX_DECIMAL_SCALE {
            return Err(invalid());
        }

        // Negative input accumulates downward so i64::MIN stays representable.
        let sign: i64 = if negative { -1 } else { 1 };
        let mut units: i64 = 0;
        for digit in whole.chars().chain(fraction.chars()) {
            let value = i64::from(digit.to_digit(10).ok_or_else(invalid)?);
            units = units
                .checked_mul(10)
                .and_then(|u| u.checked_add(sign * value))
                .ok_or_else(invalid)?;
        }

        Ok(Self { units, scale })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.units);
        }

        let divisor = 10u128.pow(self.scale);
        let magnitude = u128::from(self.units.unsigned_abs());
        let sign = if self.units < 0 { "-" } else { "" };
        write!(
            f,
            "{sign}{}.{:0width$}",
            magnitude / divisor,
            magnitude % divisor,
            width = self.scale as usize
        )
    }
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    Decimal(Decimal),
}

impl AttrValue {
    /// Converts a loose JSON value, rejecting nested arrays and objects.
    pub fn from_json(key: &str, value: serde_json::Value) -> TrackerResult<Self> {
        use serde_json::Value;

        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .ok_or_else(|| TrackerError::UnsupportedSerializationValue {
                    key: key.to_string(),
                    kind: "number",
                }),
            Value::String(s) => Ok(Self::Text(s)),
            Value::Array(_) => Err(TrackerError::UnsupportedSerializationValue {
                key: key.to_string(),
                kind: "array",
            }),
            Value::Object(_) => Err(TrackerError::UnsupportedSerializationValue {
                key: key.to_string(),
                kind: "object",
            }),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Serialize for AttrValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Date(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
            Self::DateTime(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            Self::Decimal(d) => serializer.serialize_f64(d.to_f64()),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for AttrValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<u32> for AttrValue {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for AttrValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<NaiveDate> for AttrValue {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<DateTime<FixedOffset>> for AttrValue {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Self::DateTime(dt)
    }
}

impl From<DateTime<Utc>> for AttrValue {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt.fixed_offset())
    }
}

impl From<Decimal> for AttrValue {
    fn from(d: Decimal) -> Self {
        Self::Decimal(d)
    }
}

/// Insertion-ordered attribute map.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Attributes(IndexMap<String, AttrValue>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces `key`, keeping its original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.0.shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.0.iter()
    }

    /// Builds a map from a JSON object; every value must be a scalar.
    pub fn from_json(value: serde_json::Value) -> TrackerResult<Self> {
        let serde_json::Value::Object(object) = value else {
            return Err(TrackerError::UnsupportedSerializationValue {
                key: String::new(),
                kind: "non-object root",
            });
        };

        object
            .into_iter()
            .map(|(key, value)| {
                let value = AttrValue::from_json(&key, value)?;
                Ok((key, value))
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<AttrValue>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a String, &'a AttrValue);
    type IntoIter = indexmap::map::Iter<'a, String, AttrValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decimal_parse_and_display() {
        let price: Decimal = "15.25".parse().unwrap();
        assert_eq!(price, Decimal::new(1525, 2));
        assert_eq!(price.to_string(), "15.25");

        let negative: Decimal = "-0.05".parse().unwrap();
        assert_eq!(negative, Decimal::new(-5, 2));
        assert_eq!(negative.to_string(), "-0.05");

        let whole: Decimal = "42".parse().unwrap();
        assert_eq!(whole, Decimal::new(42, 0));
        assert_eq!(whole.to_string(), "42");
    }

    #[test]
    fn test_decimal_rejects_garbage() {
        assert!(matches!(
            "".parse::<Decimal>(),
            Err(TrackerError::InvalidDecimal(_))
        ));
        assert!("1.2.3".parse::<Decimal>().is_err());
        assert!("12a".parse::<Decimal>().is_err());
        assert!(".".parse::<Decimal>().is_err());
        assert!("99999999999999999999".parse::<Decimal>().is_err());
    }

    #[test]
    fn test_decimal_parses_full_i64_range() {
        let min: Decimal = "-9223372036854775808".parse().unwrap();
        assert_eq!(min, Decimal::new(i64::MIN, 0));
        assert_eq!(min.to_string(), "-9223372036854775808");

        let max: Decimal = "9223372036854775807".parse().unwrap();
        assert_eq!(max.units(), i64::MAX);

        assert!("-9223372036854775809".parse::<Decimal>().is_err());
        assert!("9223372036854775808".parse::<Decimal>().is_err());
    }

    #[test]
    fn test_decimal_new_truncates_excess_scale() {
        let tiny = Decimal::new(1, 40);
        assert_eq!(tiny.scale(), 18);
        assert_eq!(tiny.to_string(), "0.000000000000000000");

        let truncated = Decimal::new(-123_456, 21);
        assert_eq!(truncated, Decimal::new(-123, 18));
        assert_eq!(truncated.to_string(), "-0.000000000000000123");

        let huge = Decimal::new(i64::MAX, u32::MAX);
        assert_eq!(huge.units(), 0);
        assert_eq!(huge.scale(), 18);
    }

    #[test]
    fn test_decimal_serializes_as_float() {
        let value = AttrValue::from(Decimal::new(1525, 2));
        assert_eq!(serde_json::to_value(&value).unwrap(), json!(15.25));
    }

    #[test]
    fn test_dates_serialize_as_iso8601() {
        let date = NaiveDate::from_ymd_opt(2015, 3, 9).unwrap();
        assert_eq!(
            serde_json::to_string(&AttrValue::from(date)).unwrap(),
            "\"2015-03-09\""
        );

        let instant = DateTime::parse_from_rfc3339("2015-03-09T10:30:00+00:00").unwrap();
        assert_eq!(
            serde_json::to_string(&AttrValue::from(instant)).unwrap(),
            "\"2015-03-09T10:30:00+00:00\""
        );
    }

    #[test]
    fn test_attributes_keep_insertion_order() {
        let attrs = Attributes::new()
            .with("name", "Triblend Android T-Shirt")
            .with("price", Decimal::new(1525, 2))
            .with("position", 1);

        assert_eq!(
            serde_json::to_string(&attrs).unwrap(),
            r#"{"name":"Triblend Android T-Shirt","price":15.25,"position":1}"#
        );
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut attrs = Attributes::new().with("a", 1).with("b", 2);
        attrs.insert("a", 3);
        let keys: Vec<_> = attrs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(attrs.get("a"), Some(&AttrValue::Int(3)));
    }

    #[test]
    fn test_from_json_accepts_scalars() {
        let attrs = Attributes::from_json(json!({
            "id": "P12345",
            "price": 29.2,
            "position": 2,
            "in_stock": true,
            "variant": null
        }))
        .unwrap();

        assert_eq!(attrs.len(), 5);
        assert_eq!(attrs.get("position"), Some(&AttrValue::Int(2)));
        assert_eq!(attrs.get("price"), Some(&AttrValue::Float(29.2)));
        assert_eq!(attrs.get("variant"), Some(&AttrValue::Null));
    }

    #[test]
    fn test_from_json_rejects_nested_values() {
        let err = Attributes::from_json(json!({"tags": ["a", "b"]})).unwrap_err();
        match err {
            TrackerError::UnsupportedSerializationValue { key, kind } => {
                assert_eq!(key, "tags");
                assert_eq!(kind, "array");
            }
            other => panic!("Expected UnsupportedSerializationValue, got {other:?}"),
        }

        assert!(matches!(
            Attributes::from_json(json!({"dims": {"w": 1}})),
            Err(TrackerError::UnsupportedSerializationValue { kind: "object", .. })
        ));
        assert!(Attributes::from_json(json!([1, 2])).is_err());
    }
}
