//! Typed records for the tracked ecommerce events.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::attributes::{AttrValue, Attributes, Decimal};
use crate::domain::errors::TrackerError;

/// Kind of page being rendered, consumed by the client script to decide
/// which actions to send on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Detail,
    Checkout,
    List,
}

impl PageType {
    pub const ALL: [Self; 3] = [Self::Detail, Self::Checkout, Self::List];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Detail => "detail",
            Self::Checkout => "checkout",
            Self::List => "list",
        }
    }
}

impl FromStr for PageType {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|page_type| page_type.as_str() == s)
            .ok_or_else(|| TrackerError::InvalidPageType(s.to_string()))
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The current stage of a checkout funnel.
///
/// Serialized flat as `{"step": n, ...attributes}`. The explicit step always
/// wins over a `step` key smuggled into the attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutStep {
    pub step: u32,
    pub attributes: Attributes,
}

impl CheckoutStep {
    pub fn new(step: u32, mut attributes: Attributes) -> Self {
        attributes.remove("step");
        Self { step, attributes }
    }

    /// Checkout option selected at this step (e.g. a payment method).
    pub fn option(&self) -> Option<&str> {
        self.attributes.get("option").and_then(AttrValue::as_str)
    }

    /// Whether the client should send the checkout action as soon as the page loads.
    pub fn is_immediate(&self) -> bool {
        matches!(self.attributes.get("immediate"), Some(AttrValue::Bool(true)))
    }
}

impl Serialize for CheckoutStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.attributes.len() + 1))?;
        map.serialize_entry("step", &self.step)?;
        for (key, value) in &self.attributes {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A completed purchase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue: Option<AttrValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax: Option<AttrValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping: Option<AttrValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<String>,
    #[serde(flatten)]
    extra: Attributes,
}

impl Transaction {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            affiliation: None,
            revenue: None,
            tax: None,
            shipping: None,
            coupon: None,
            extra: Attributes::new(),
        }
    }

    #[must_use]
    pub fn affiliation(mut self, affiliation: impl Into<String>) -> Self {
        self.affiliation = Some(affiliation.into());
        self
    }

    #[must_use]
    pub fn revenue(mut self, revenue: Decimal) -> Self {
        self.revenue = Some(revenue.into());
        self
    }

    #[must_use]
    pub fn tax(mut self, tax: Decimal) -> Self {
        self.tax = Some(tax.into());
        self
    }

    #[must_use]
    pub fn shipping(mut self, shipping: Decimal) -> Self {
        self.shipping = Some(shipping.into());
        self
    }

    #[must_use]
    pub fn coupon(mut self, coupon: impl Into<String>) -> Self {
        self.coupon = Some(coupon.into());
        self
    }

    /// Adds a field to the transaction.
    ///
    /// Well-known purchase keys (`id`, `affiliation`, `revenue`, `tax`,
    /// `shipping`, `coupon`) set the typed field instead, so each key appears
    /// once in the payload. A null value clears an optional field.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        let key = key.into();
        let value = value.into();
        match key.as_str() {
            "id" => {
                if let Some(id) = into_text(value) {
                    self.id = id;
                }
            }
            "affiliation" => self.affiliation = into_text(value),
            "coupon" => self.coupon = into_text(value),
            "revenue" => self.revenue = non_null(value),
            "tax" => self.tax = non_null(value),
            "shipping" => self.shipping = non_null(value),
            _ => self.extra.insert(key, value),
        }
        self
    }

    /// Fields outside the well-known purchase keys, in insertion order.
    pub fn extra(&self) -> &Attributes {
        &self.extra
    }
}

fn non_null(value: AttrValue) -> Option<AttrValue> {
    match value {
        AttrValue::Null => None,
        other => Some(other),
    }
}

fn into_text(value: AttrValue) -> Option<String> {
    match value {
        AttrValue::Null => None,
        AttrValue::Bool(b) => Some(b.to_string()),
        AttrValue::Int(i) => Some(i.to_string()),
        AttrValue::Float(f) => Some(f.to_string()),
        AttrValue::Text(s) => Some(s),
        AttrValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        AttrValue::DateTime(dt) => Some(dt.to_rfc3339()),
        AttrValue::Decimal(d) => Some(d.to_string()),
    }
}
