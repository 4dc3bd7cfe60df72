//! eecommerce - per-request enhanced ecommerce tracking
//!
//! Collects product impressions, detail views, checkout steps and
//! transactions while a web request is handled, and renders them as one JSON
//! document for the page's analytics script.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): tracked data model, errors and the ports the
//!   host framework implements (`Trackable`, `ConstructionObserver`)
//! - **Service Layer** (`services`): the per-request `Tracker`, the
//!   process-wide `TrackerRegistry`, the `InstanceSignals` hub and the
//!   request-lifecycle adapter `TrackerMiddleware`
//! - **Infrastructure Layer** (`infrastructure`): configuration loading and
//!   logging
//!
//! # Example
//!
//! ```ignore
//! use eecommerce::{ConfigLoader, InstanceSignals, TrackerMiddleware, TrackerRegistry};
//!
//! let config = ConfigLoader::load()?;
//! let signals = InstanceSignals::new();
//! let registry = TrackerRegistry::new(config.registry.clone());
//! registry.subscribe_configured(&signals, &config);
//! let middleware = TrackerMiddleware::from_config(registry, &config);
//!
//! // per request
//! let scope = middleware.scope(&mut request)?;
//! if let Some(tracker) = scope.tracker() {
//!     tracker.track_detail(product);
//!     tracker.set_page_type("detail")?;
//! }
//! middleware.process_template_response(&request, response.context_mut());
//! ```

pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    AttrValue, Attributes, CheckoutStep, Config, Decimal, LoggingConfig, MiddlewareConfig,
    ModelType, ObserverId, PageType, RegistryConfig, RequestId, SessionPolicy, TrackerConfig,
    Transaction,
};
pub use domain::ports::{ConstructionObserver, Trackable};
pub use domain::{TrackerError, TrackerResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::logging::{LogConfig, LoggerImpl};
pub use services::{
    InstanceSignals, RenderContext, RequestContext, Tracker, TrackerMiddleware, TrackerRegistry,
    TrackerScope, TrackerSnapshot,
};
