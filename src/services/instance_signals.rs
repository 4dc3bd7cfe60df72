//! Explicit publish/subscribe hub for "instance constructed" notifications.
//!
//! The host's domain layer calls [`InstanceSignals::emit`] whenever it
//! constructs an object of a model type; connected observers are called back
//! synchronously on the same thread.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::domain::models::{ModelType, ObserverId};
use crate::domain::ports::{ConstructionObserver, Trackable};

/// Observers connected per model type
#[derive(Default)]
pub struct InstanceSignals {
    observers: RwLock<HashMap<ModelType, Vec<Arc<dyn ConstructionObserver>>>>,
}

impl InstanceSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects `observer` to constructions of `model_type`.
    ///
    /// Returns `false` if an observer with the same id was already connected
    /// for that type.
    pub fn connect(&self, model_type: ModelType, observer: Arc<dyn ConstructionObserver>) -> bool {
        let mut observers = self.observers.write();
        let connected = observers.entry(model_type.clone()).or_default();

        let id = observer.observer_id();
        if connected.iter().any(|o| o.observer_id() == id) {
            return false;
        }

        debug!(model_type = %model_type, observer_id = %id, "Connected construction observer");
        connected.push(observer);
        true
    }

    /// Disconnects the observer `id` from `model_type`; returns whether it was connected.
    pub fn disconnect(&self, model_type: &ModelType, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let Some(connected) = observers.get_mut(model_type) else {
            return false;
        };

        let before = connected.len();
        connected.retain(|o| o.observer_id() != id);
        let removed = connected.len() != before;

        if connected.is_empty() {
            observers.remove(model_type);
        }
        if removed {
            debug!(model_type = %model_type, observer_id = %id, "Disconnected construction observer");
        }
        removed
    }

    /// Notifies every observer of `model_type` and returns how many were called.
    ///
    /// The observer list is copied before dispatch so callbacks may connect
    /// or disconnect without deadlocking.
    pub fn emit(&self, model_type: &ModelType, instance: Arc<dyn Trackable>) -> usize {
        let observers: Vec<_> = match self.observers.read().get(model_type) {
            Some(connected) => connected.clone(),
            None => return 0,
        };

        trace!(
            model_type = %model_type,
            observers = observers.len(),
            "Dispatching instance constructed"
        );
        for observer in &observers {
            observer.on_instance_constructed(model_type, &instance);
        }
        observers.len()
    }

    pub fn observer_count(&self, model_type: &ModelType) -> usize {
        self.observers.read().get(model_type).map_or(0, Vec::len)
    }
}
