//! Process-wide directory of live trackers, keyed by request.
//!
//! Entries are created lazily on the first lookup for a request and removed
//! when that request's response is finalized. The registry also observes
//! construction of configured model types and fans every constructed
//! instance into all live trackers as an impression.
//!
//! With an idle TTL configured, entries whose tracker has seen no activity
//! for longer than the TTL are swept; activity is any tracking call on the
//! tracker or a registry lookup of it.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::domain::models::{
    Config, ModelType, ObserverId, RegistryConfig, RequestId, TrackerConfig,
};
use crate::domain::ports::{ConstructionObserver, Trackable};
use crate::services::instance_signals::InstanceSignals;
use crate::services::tracker::Tracker;

/// Registry mapping request identity to its [`Tracker`].
pub struct TrackerRegistry {
    id: ObserverId,
    config: RegistryConfig,
    by_request: RwLock<HashMap<RequestId, Arc<Tracker>>>,
}

impl TrackerRegistry {
    /// Create a new registry; the host keeps the returned handle for the
    /// process lifetime.
    pub fn new(config: RegistryConfig) -> Arc<Self> {
        Arc::new(Self {
            id: ObserverId::new(),
            config,
            by_request: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the tracker for `request_id`, creating it with `config` if absent.
    ///
    /// `config` only applies at creation; later calls return the existing
    /// instance unchanged.
    pub fn get_or_create(&self, request_id: RequestId, config: TrackerConfig) -> Arc<Tracker> {
        let mut by_request = self.by_request.write();

        let tracker = by_request.entry(request_id).or_insert_with(|| {
            debug!(request_id = %request_id, "Created tracker");
            Arc::new(Tracker::new(request_id, config))
        });
        tracker.touch();
        Arc::clone(tracker)
    }

    /// Returns the tracker for `request_id` without creating one.
    pub fn get(&self, request_id: RequestId) -> Option<Arc<Tracker>> {
        let tracker = Arc::clone(self.by_request.read().get(&request_id)?);
        tracker.touch();
        Some(tracker)
    }

    /// Discards the tracker for `request_id`; returns whether one existed.
    ///
    /// Removing an unknown request is not an error, so double finalization
    /// is harmless.
    pub fn remove(&self, request_id: RequestId) -> bool {
        let removed = self.by_request.write().remove(&request_id).is_some();
        if removed {
            debug!(request_id = %request_id, "Removed tracker");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.by_request.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_request.read().is_empty()
    }

    /// Copies the current set of live trackers.
    pub fn live_trackers(&self) -> Vec<Arc<Tracker>> {
        self.by_request
            .read()
            .values()
            .map(Arc::clone)
            .collect()
    }

    /// Connects this registry to construction notifications of `model_types`.
    #[instrument(skip(self, signals, model_types))]
    pub fn subscribe<I>(self: &Arc<Self>, signals: &InstanceSignals, model_types: I)
    where
        I: IntoIterator<Item = ModelType>,
    {
        for model_type in model_types {
            let observer: Arc<dyn ConstructionObserver> = Arc::clone(self) as _;
            if signals.connect(model_type.clone(), observer) {
                info!(model_type = %model_type, "Tracking constructions as impressions");
            }
        }
    }

    /// Subscribes to every model type listed in `config.models`.
    pub fn subscribe_configured(self: &Arc<Self>, signals: &InstanceSignals, config: &Config) {
        self.subscribe(
            signals,
            config.models.iter().map(|model| ModelType::from(model.as_str())),
        );
    }

    /// Reverses [`subscribe`](Self::subscribe); used at process teardown.
    #[instrument(skip(self, signals, model_types))]
    pub fn unsubscribe<'a, I>(&self, signals: &InstanceSignals, model_types: I)
    where
        I: IntoIterator<Item = &'a ModelType>,
    {
        for model_type in model_types {
            if signals.disconnect(model_type, self.id) {
                info!(model_type = %model_type, "Stopped tracking constructions");
            }
        }
    }

    /// Drops entries idle for longer than the configured TTL.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Utc::now())
    }

    /// Drops entries whose tracker has been inactive for longer than the TTL,
    /// measured at `now`.
    ///
    /// Returns the number of evicted trackers; always 0 without a TTL.
    pub fn evict_idle_at(&self, now: DateTime<Utc>) -> usize {
        let Some(ttl_secs) = self.config.idle_ttl_secs else {
            return 0;
        };
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);

        let mut by_request = self.by_request.write();
        let before = by_request.len();
        by_request.retain(|request_id, tracker| {
            let last_activity = tracker.last_activity();
            let keep = now.signed_duration_since(last_activity) <= ttl;
            if !keep {
                warn!(
                    request_id = %request_id,
                    last_activity = %last_activity,
                    "Evicting tracker of a request that was never finalized"
                );
            }
            keep
        });
        before - by_request.len()
    }
}

impl ConstructionObserver for TrackerRegistry {
    fn observer_id(&self) -> ObserverId {
        self.id
    }

    fn on_instance_constructed(&self, model_type: &ModelType, instance: &Arc<dyn Trackable>) {
        // Snapshot first: trackers may be inserted or removed while we fan out.
        let trackers = self.live_trackers();
        debug!(
            model_type = %model_type,
            trackers = trackers.len(),
            "Broadcasting constructed instance as impression"
        );
        for tracker in trackers {
            tracker.track_impression(Arc::clone(instance));
        }
    }
}
