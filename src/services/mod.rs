pub mod instance_signals;
pub mod lifecycle;
pub mod tracker;
pub mod tracker_registry;

pub use instance_signals::InstanceSignals;
pub use lifecycle::{RenderContext, RequestContext, TrackerMiddleware, TrackerScope};
pub use tracker::{Tracker, TrackerSnapshot};
pub use tracker_registry::TrackerRegistry;
