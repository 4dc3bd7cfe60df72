use std::sync::Arc;

use super::models::{Attributes, ModelType, ObserverId};

/// A domain object that can be tracked.
///
/// This is the item adapter: the host's catalog types implement it so the
/// tracker can key them and project their analytics attributes.
pub trait Trackable: Send + Sync {
    /// Stable unique identity used as the key in the payload's `items` map
    fn unique_hash(&self) -> String;

    /// Ecommerce projection (price, brand, category, variant, position,
    /// quantity, list name).
    ///
    /// Returning `None` keeps the identity in the impression/detail lists
    /// but omits the item from the serialized `items` map.
    fn ecommerce_projection(&self) -> Option<Attributes>;
}

/// Listener for "instance constructed" notifications.
///
/// Callbacks run synchronously on the thread that constructed the instance,
/// which may belong to any in-flight request.
pub trait ConstructionObserver: Send + Sync {
    /// Handle used to disconnect the observer again
    fn observer_id(&self) -> ObserverId;

    /// Called once per constructed instance of a connected model type
    fn on_instance_constructed(&self, model_type: &ModelType, instance: &Arc<dyn Trackable>);
}
