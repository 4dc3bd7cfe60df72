//! Common test utilities for integration tests
//!
//! Provides catalog fixtures and a minimal request context standing in for
//! the host framework.

use std::sync::Arc;

use eecommerce::{Attributes, Decimal, RequestContext, RequestId, Trackable, Tracker};

/// Catalog product used as a tracked item
#[derive(Debug, Clone)]
pub struct Product {
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub brand: Option<String>,
}

impl Product {
    pub fn new(sku: &str) -> Self {
        Self {
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            price: Decimal::new(1525, 2),
            brand: None,
        }
    }

    #[allow(dead_code)]
    pub fn with_brand(mut self, brand: &str) -> Self {
        self.brand = Some(brand.to_string());
        self
    }

    pub fn shared(self) -> Arc<dyn Trackable> {
        Arc::new(self)
    }
}

impl Trackable for Product {
    fn unique_hash(&self) -> String {
        format!("catalog.product:{}", self.sku)
    }

    fn ecommerce_projection(&self) -> Option<Attributes> {
        let mut attrs = Attributes::new()
            .with("id", self.sku.as_str())
            .with("name", self.name.as_str())
            .with("price", self.price);
        if let Some(brand) = &self.brand {
            attrs.insert("brand", brand.as_str());
        }
        Some(attrs)
    }
}

/// Request stand-in carrying request-scoped storage
#[allow(dead_code)]
#[derive(Default)]
pub struct TestRequest {
    pub id: RequestId,
    pub session: bool,
    pub tracker: Option<Arc<Tracker>>,
}

impl TestRequest {
    #[allow(dead_code)]
    pub fn with_session() -> Self {
        Self {
            id: RequestId::new(),
            session: true,
            tracker: None,
        }
    }

    #[allow(dead_code)]
    pub fn without_session() -> Self {
        Self {
            session: false,
            ..Self::with_session()
        }
    }
}

impl RequestContext for TestRequest {
    fn request_id(&self) -> RequestId {
        self.id
    }

    fn has_session(&self) -> bool {
        self.session
    }

    fn tracker(&self) -> Option<Arc<Tracker>> {
        self.tracker.clone()
    }

    fn attach_tracker(&mut self, tracker: Arc<Tracker>) {
        self.tracker = Some(tracker);
    }
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
#[allow(dead_code)]
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
