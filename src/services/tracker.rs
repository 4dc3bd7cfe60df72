//! Per-request accumulator of enhanced ecommerce events.
//!
//! A [`Tracker`] collects impressions, detail views, the current checkout step
//! and transactions for one request, and renders them as the JSON document
//! the page's analytics script consumes:
//!
//! ```text
//! {
//!   "items": {"<identity>": {...attributes, "brand": "..."}},
//!   "impressions": ["<identity>"],
//!   "details": ["<identity>"],
//!   "checkout": {"step": 1, ...} | {},
//!   "transactions": [{...}],
//!   "type": "detail" | "checkout" | "list" | null,
//!   "currency": "USD",
//!   "debug": false,
//!   "gaID": "UA-XXXX-Y"
//! }
//! ```

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::domain::errors::TrackerResult;
use crate::domain::models::{Attributes, CheckoutStep, PageType, RequestId, Transaction};
use crate::domain::ports::Trackable;

pub use crate::domain::models::TrackerConfig;

/// Tracks ecommerce data for a single request.
///
/// Normally only the request that owns the tracker touches it, but the
/// construction broadcast can reach it from another request's thread, so the
/// state sits behind a mutex. The lock is never held while calling into
/// [`Trackable`] implementations.
pub struct Tracker {
    request_id: RequestId,
    config: TrackerConfig,
    state: Mutex<TrackerState>,
    /// Unix milliseconds of the last tracking call or registry lookup
    last_activity: AtomicI64,
}

#[derive(Default)]
struct TrackerState {
    items: IndexMap<String, Arc<dyn Trackable>>,
    impressions: Vec<String>,
    details: Vec<String>,
    checkout: Option<CheckoutStep>,
    transactions: Vec<Transaction>,
    page_type: Option<PageType>,
    data: Option<Arc<str>>,
}

impl TrackerState {
    fn add_item(&mut self, hash: &str, item: Arc<dyn Trackable>) {
        self.items.insert(hash.to_string(), item);
    }
}

/// Structured form of the tracker payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerSnapshot {
    pub items: IndexMap<String, Attributes>,
    pub impressions: Vec<String>,
    pub details: Vec<String>,
    #[serde(serialize_with = "serialize_checkout")]
    pub checkout: Option<CheckoutStep>,
    pub transactions: Vec<Transaction>,
    #[serde(rename = "type")]
    pub page_type: Option<PageType>,
    pub currency: String,
    pub debug: bool,
    #[serde(rename = "gaID")]
    pub ga_id: String,
}

fn serialize_checkout<S: Serializer>(
    checkout: &Option<CheckoutStep>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match checkout {
        Some(step) => step.serialize(serializer),
        None => serializer.collect_map(std::iter::empty::<(&str, ())>()),
    }
}

impl Tracker {
    pub fn new(request_id: RequestId, config: TrackerConfig) -> Self {
        Self {
            request_id,
            config,
            state: Mutex::new(TrackerState::default()),
            last_activity: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// When the owning request last tracked something or looked the tracker up.
    ///
    /// The registry's idle sweep measures inactivity from this instant.
    pub fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_activity.load(Ordering::Relaxed))
            .unwrap_or_default()
    }

    pub(crate) fn touch(&self) {
        self.touch_at(Utc::now());
    }

    /// Moves the activity mark forward to `at`; never moves it back.
    pub(crate) fn touch_at(&self, at: DateTime<Utc>) {
        self.last_activity
            .fetch_max(at.timestamp_millis(), Ordering::Relaxed);
    }

    /// Records `item` as shown in a list.
    ///
    /// Idempotent. A no-op for the impression list when the item is already
    /// a detail-view subject; the item itself is still re-registered.
    pub fn track_impression(&self, item: Arc<dyn Trackable>) {
        let hash = item.unique_hash();
        self.touch();
        let mut state = self.state.lock();
        state.add_item(&hash, item);

        if state.details.contains(&hash) || state.impressions.contains(&hash) {
            return;
        }

        debug!(request_id = %self.request_id, item = %hash, "Tracked impression");
        state.impressions.push(hash);
    }

    /// Records `item` as the subject of a detail page, removing any
    /// impression of it.
    pub fn track_detail(&self, item: Arc<dyn Trackable>) {
        let hash = item.unique_hash();
        self.touch();
        let mut state = self.state.lock();
        state.add_item(&hash, item);

        if !state.details.contains(&hash) {
            state.details.push(hash.clone());
        }
        state.impressions.retain(|h| h != &hash);

        debug!(request_id = %self.request_id, item = %hash, "Tracked detail view");
    }

    /// Replaces the checkout record wholesale.
    pub fn track_checkout_step(&self, step: u32, attributes: Attributes) {
        debug!(request_id = %self.request_id, step, "Tracked checkout step");
        self.touch();
        self.state.lock().checkout = Some(CheckoutStep::new(step, attributes));
    }

    pub fn track_transaction(&self, transaction: Transaction) {
        debug!(
            request_id = %self.request_id,
            transaction_id = %transaction.id,
            "Tracked transaction"
        );
        self.touch();
        self.state.lock().transactions.push(transaction);
    }

    /// Sets the page type from its tag; an unknown tag leaves the current
    /// page type untouched.
    pub fn set_page_type(&self, tag: &str) -> TrackerResult<()> {
        let page_type = tag.parse::<PageType>()?;
        self.touch();
        self.state.lock().page_type = Some(page_type);
        Ok(())
    }

    pub fn page_type(&self) -> Option<PageType> {
        self.state.lock().page_type
    }

    pub fn impressions(&self) -> Vec<String> {
        self.state.lock().impressions.clone()
    }

    pub fn details(&self) -> Vec<String> {
        self.state.lock().details.clone()
    }

    pub fn checkout(&self) -> Option<CheckoutStep> {
        self.state.lock().checkout.clone()
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.state.lock().transactions.clone()
    }

    pub fn item_count(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Builds the structured payload.
    ///
    /// Items without an ecommerce projection are left out of `items`, and
    /// projections without a `brand` get the configured one.
    pub fn snapshot(&self) -> TrackerSnapshot {
        let (items, impressions, details, checkout, transactions, page_type) = {
            let state = self.state.lock();
            (
                state.items.clone(),
                state.impressions.clone(),
                state.details.clone(),
                state.checkout.clone(),
                state.transactions.clone(),
                state.page_type,
            )
        };

        let items = items
            .into_iter()
            .filter_map(|(hash, item)| {
                let mut projection = item.ecommerce_projection()?;
                if !projection.contains_key("brand") {
                    projection.insert("brand", self.config.brand.as_str());
                }
                Some((hash, projection))
            })
            .collect();

        TrackerSnapshot {
            items,
            impressions,
            details,
            checkout,
            transactions,
            page_type,
            currency: self.config.currency.clone(),
            debug: self.config.debug,
            ga_id: self.config.ga_id.clone(),
        }
    }

    /// Serializes the payload to a JSON string.
    pub fn snapshot_json(&self) -> TrackerResult<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    /// Serialized payload, computed on first read and cached for the
    /// lifetime of the tracker.
    ///
    /// Later mutations are not reflected; callers read this once the view
    /// has finished tracking.
    #[instrument(skip(self), fields(request_id = %self.request_id))]
    pub fn data(&self) -> TrackerResult<Arc<str>> {
        if let Some(data) = self.state.lock().data.clone() {
            return Ok(data);
        }

        let rendered: Arc<str> = Arc::from(self.snapshot_json()?);
        let mut state = self.state.lock();
        // A concurrent first read may have won; keep whichever landed first.
        Ok(state.data.get_or_insert(rendered).clone())
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Tracker")
            .field("request_id", &self.request_id)
            .field("items", &state.items.len())
            .field("impressions", &state.impressions)
            .field("details", &state.details)
            .field("page_type", &state.page_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::TrackerError;
    use crate::domain::models::Decimal;
    use serde_json::json;

    struct Product {
        sku: &'static str,
        projection: Option<Attributes>,
    }

    impl Trackable for Product {
        fn unique_hash(&self) -> String {
            format!("product-{}", self.sku)
        }

        fn ecommerce_projection(&self) -> Option<Attributes> {
            self.projection.clone()
        }
    }

    fn product(sku: &'static str) -> Arc<dyn Trackable> {
        Arc::new(Product {
            sku,
            projection: Some(Attributes::new().with("id", sku).with("name", "Shirt")),
        })
    }

    fn tracker_with_brand(brand: &str) -> Tracker {
        Tracker::new(
            RequestId::new(),
            TrackerConfig {
                brand: brand.to_string(),
                ..TrackerConfig::default()
            },
        )
    }

    #[test]
    fn test_impression_is_idempotent() {
        let tracker = tracker_with_brand("Acme");
        let item = product("A");

        tracker.track_impression(item.clone());
        tracker.track_impression(item);

        assert_eq!(tracker.impressions(), vec!["product-A"]);
        assert_eq!(tracker.item_count(), 1);
    }

    #[test]
    fn test_detail_after_impression_moves_item() {
        let tracker = tracker_with_brand("Acme");
        let item = product("A");

        tracker.track_impression(item.clone());
        tracker.track_detail(item);

        assert!(tracker.impressions().is_empty());
        assert_eq!(tracker.details(), vec!["product-A"]);
    }

    #[test]
    fn test_impression_after_detail_is_ignored() {
        let tracker = tracker_with_brand("Acme");
        let item = product("A");

        tracker.track_detail(item.clone());
        tracker.track_impression(item);

        assert!(tracker.impressions().is_empty());
        assert_eq!(tracker.details(), vec!["product-A"]);
    }

    #[test]
    fn test_detail_is_not_duplicated() {
        let tracker = tracker_with_brand("Acme");
        let item = product("A");

        tracker.track_detail(item.clone());
        tracker.track_detail(item);

        assert_eq!(tracker.details(), vec!["product-A"]);
    }

    #[test]
    fn test_order_of_impressions_is_preserved() {
        let tracker = tracker_with_brand("Acme");
        for sku in ["C", "A", "B"] {
            tracker.track_impression(product(sku));
        }
        assert_eq!(
            tracker.impressions(),
            vec!["product-C", "product-A", "product-B"]
        );
    }

    #[test]
    fn test_checkout_overwrites_instead_of_merging() {
        let tracker = tracker_with_brand("Acme");

        tracker.track_checkout_step(1, Attributes::new().with("a", 1));
        tracker.track_checkout_step(2, Attributes::new().with("b", 2));

        let checkout = tracker.checkout().unwrap();
        assert_eq!(checkout.step, 2);
        assert!(!checkout.attributes.contains_key("a"));
        assert_eq!(
            serde_json::to_value(&checkout).unwrap(),
            json!({"step": 2, "b": 2})
        );
    }

    #[test]
    fn test_transactions_append_without_dedup() {
        let tracker = tracker_with_brand("Acme");
        tracker.track_transaction(Transaction::new("T1"));
        tracker.track_transaction(Transaction::new("T1"));
        assert_eq!(tracker.transactions().len(), 2);
    }

    #[test]
    fn test_invalid_page_type_leaves_previous_value() {
        let tracker = tracker_with_brand("Acme");
        tracker.set_page_type("list").unwrap();

        let result = tracker.set_page_type("bogus");

        assert!(matches!(result, Err(TrackerError::InvalidPageType(ref t)) if t == "bogus"));
        assert_eq!(tracker.page_type(), Some(PageType::List));
    }

    #[test]
    fn test_brand_is_filled_from_config() {
        let tracker = tracker_with_brand("Acme");
        tracker.track_impression(product("A"));

        let snapshot = tracker.snapshot();

        assert_eq!(
            snapshot.items["product-A"].get("brand").and_then(|b| b.as_str()),
            Some("Acme")
        );
    }

    #[test]
    fn test_item_brand_is_not_overridden() {
        let tracker = tracker_with_brand("Acme");
        tracker.track_impression(Arc::new(Product {
            sku: "G",
            projection: Some(Attributes::new().with("brand", "Google")),
        }));

        let snapshot = tracker.snapshot();
        assert_eq!(
            snapshot.items["product-G"].get("brand").and_then(|b| b.as_str()),
            Some("Google")
        );
    }

    #[test]
    fn test_items_without_projection_are_omitted() {
        let tracker = tracker_with_brand("Acme");
        tracker.track_impression(Arc::new(Product {
            sku: "X",
            projection: None,
        }));

        let snapshot = tracker.snapshot();

        assert!(snapshot.items.is_empty());
        assert_eq!(snapshot.impressions, vec!["product-X"]);
    }

    #[test]
    fn test_re_registration_is_last_write_wins() {
        let tracker = tracker_with_brand("Acme");
        tracker.track_impression(Arc::new(Product {
            sku: "A",
            projection: Some(Attributes::new().with("price", Decimal::new(100, 2))),
        }));
        tracker.track_impression(Arc::new(Product {
            sku: "A",
            projection: Some(Attributes::new().with("price", Decimal::new(250, 2))),
        }));

        let value = serde_json::to_value(tracker.snapshot()).unwrap();
        assert_eq!(value["items"]["product-A"]["price"], json!(2.5));
        assert_eq!(tracker.item_count(), 1);
    }

    #[test]
    fn test_empty_snapshot_shape() {
        let tracker = Tracker::new(
            RequestId::new(),
            TrackerConfig {
                debug: true,
                ga_id: "UA-1234-5".to_string(),
                ..TrackerConfig::default()
            },
        );

        let value: serde_json::Value =
            serde_json::from_str(&tracker.snapshot_json().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "items": {},
                "impressions": [],
                "details": [],
                "checkout": {},
                "transactions": [],
                "type": null,
                "currency": "USD",
                "debug": true,
                "gaID": "UA-1234-5"
            })
        );
    }

    #[test]
    fn test_full_snapshot_json() {
        let tracker = tracker_with_brand("Acme");
        tracker.track_impression(product("A"));
        tracker.track_detail(product("B"));
        tracker.track_checkout_step(1, Attributes::new().with("option", "Visa"));
        tracker.track_transaction(Transaction::new("T9").revenue(Decimal::new(1999, 2)));
        tracker.set_page_type("checkout").unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&tracker.snapshot_json().unwrap()).unwrap();

        assert_eq!(value["impressions"], json!(["product-A"]));
        assert_eq!(value["details"], json!(["product-B"]));
        assert_eq!(
            value["items"]["product-B"],
            json!({"id": "B", "name": "Shirt", "brand": "Acme"})
        );
        assert_eq!(value["checkout"], json!({"step": 1, "option": "Visa"}));
        assert_eq!(value["transactions"], json!([{"id": "T9", "revenue": 19.99}]));
        assert_eq!(value["type"], json!("checkout"));
    }

    #[test]
    fn test_data_is_memoized() {
        let tracker = tracker_with_brand("Acme");
        tracker.track_impression(product("A"));

        let first = tracker.data().unwrap();
        tracker.track_impression(product("B"));
        let second = tracker.data().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!second.contains("product-B"));
        assert!(tracker.snapshot_json().unwrap().contains("product-B"));
    }

    #[test]
    fn test_tracking_calls_refresh_last_activity() {
        let tracker = tracker_with_brand("Acme");
        let past = Utc::now() - chrono::Duration::hours(1);
        tracker.last_activity.store(past.timestamp_millis(), Ordering::Relaxed);

        tracker.track_impression(product("A"));
        assert!(tracker.last_activity() > past);

        tracker.last_activity.store(past.timestamp_millis(), Ordering::Relaxed);
        tracker.track_checkout_step(1, Attributes::new());
        assert!(tracker.last_activity() > past);

        tracker.last_activity.store(past.timestamp_millis(), Ordering::Relaxed);
        tracker.set_page_type("list").unwrap();
        assert!(tracker.last_activity() > past);
    }

    #[test]
    fn test_touch_never_moves_activity_back() {
        let tracker = tracker_with_brand("Acme");
        let later = Utc::now() + chrono::Duration::minutes(5);

        tracker.touch_at(later);
        tracker.touch_at(later - chrono::Duration::minutes(10));

        assert_eq!(tracker.last_activity().timestamp_millis(), later.timestamp_millis());
    }
}
