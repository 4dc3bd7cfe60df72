pub mod attributes;
pub mod config;
pub mod events;
pub mod request;

pub use attributes::{AttrValue, Attributes, Decimal};
pub use config::{
    Config, LoggingConfig, MiddlewareConfig, RegistryConfig, SessionPolicy, TrackerConfig,
};
pub use events::{CheckoutStep, PageType, Transaction};
pub use request::{ModelType, ObserverId, RequestId};
