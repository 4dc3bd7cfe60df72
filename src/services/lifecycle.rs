//! Request-lifecycle adapter binding trackers to the host framework's hooks.
//!
//! The host calls [`TrackerMiddleware::process_request`] when a request
//! enters the pipeline, [`TrackerMiddleware::process_template_response`]
//! once the view has produced a render context, and
//! [`TrackerMiddleware::process_response`] when the response is finalized.
//! Hosts that can wrap request handling in a scope should prefer
//! [`TrackerMiddleware::scope`], whose guard removes the registry entry on
//! every exit path.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::domain::errors::{TrackerError, TrackerResult};
use crate::domain::models::{Config, MiddlewareConfig, RequestId, SessionPolicy, TrackerConfig};
use crate::services::tracker::Tracker;
use crate::services::tracker_registry::TrackerRegistry;

/// The host framework's view of an in-flight request.
pub trait RequestContext {
    fn request_id(&self) -> RequestId;

    /// Whether the request carries session support
    fn has_session(&self) -> bool;

    /// Tracker previously attached to request-scoped storage
    fn tracker(&self) -> Option<Arc<Tracker>>;

    fn attach_tracker(&mut self, tracker: Arc<Tracker>);
}

/// Template context a rendered response exposes.
pub trait RenderContext {
    fn insert_tracker(&mut self, key: &str, tracker: Arc<Tracker>);
}

impl RenderContext for HashMap<String, Arc<Tracker>> {
    fn insert_tracker(&mut self, key: &str, tracker: Arc<Tracker>) {
        self.insert(key.to_string(), tracker);
    }
}

/// Lifecycle hooks wiring requests to their trackers.
pub struct TrackerMiddleware {
    registry: Arc<TrackerRegistry>,
    tracker_config: TrackerConfig,
    config: MiddlewareConfig,
}

impl TrackerMiddleware {
    pub fn new(
        registry: Arc<TrackerRegistry>,
        tracker_config: TrackerConfig,
        config: MiddlewareConfig,
    ) -> Self {
        Self {
            registry,
            tracker_config,
            config,
        }
    }

    pub fn from_config(registry: Arc<TrackerRegistry>, config: &Config) -> Self {
        Self::new(registry, config.tracker.clone(), config.middleware.clone())
    }

    pub fn registry(&self) -> &Arc<TrackerRegistry> {
        &self.registry
    }

    pub fn render_key(&self) -> &str {
        &self.config.render_key
    }

    /// Request-start hook.
    ///
    /// Returns the request's tracker, or `Ok(None)` when the request has no
    /// session and the policy is [`SessionPolicy::Skip`].
    #[instrument(skip_all, fields(request_id = %request.request_id()), err)]
    pub fn process_request<R>(&self, request: &mut R) -> TrackerResult<Option<Arc<Tracker>>>
    where
        R: RequestContext + ?Sized,
    {
        if let Some(tracker) = request.tracker() {
            tracker.touch();
            return Ok(Some(tracker));
        }

        let request_id = request.request_id();
        if !request.has_session() {
            match self.config.session_policy {
                SessionPolicy::Fail => {
                    return Err(TrackerError::MissingSessionCapability { request_id });
                }
                SessionPolicy::Skip => {
                    warn!("Request has no session; proceeding without tracking");
                    return Ok(None);
                }
            }
        }

        let evicted = self.registry.evict_idle();
        if evicted > 0 {
            debug!(evicted, "Swept idle trackers");
        }

        let tracker = self
            .registry
            .get_or_create(request_id, self.tracker_config.clone());
        request.attach_tracker(Arc::clone(&tracker));
        Ok(Some(tracker))
    }

    /// Render hook: exposes the attached tracker to templates under the
    /// configured key. Returns whether anything was injected.
    pub fn process_template_response<R>(
        &self,
        request: &R,
        context: Option<&mut dyn RenderContext>,
    ) -> bool
    where
        R: RequestContext + ?Sized,
    {
        let (Some(context), Some(tracker)) = (context, request.tracker()) else {
            return false;
        };
        context.insert_tracker(&self.config.render_key, tracker);
        true
    }

    /// Response-finalize hook; always safe to call.
    #[instrument(skip_all, fields(request_id = %request.request_id()))]
    pub fn process_response<R>(&self, request: &R) -> bool
    where
        R: RequestContext + ?Sized,
    {
        self.registry.remove(request.request_id())
    }

    /// Runs the request-start hook and returns a guard that finalizes the
    /// request when dropped.
    pub fn scope<R>(&self, request: &mut R) -> TrackerResult<TrackerScope>
    where
        R: RequestContext + ?Sized,
    {
        let tracker = self.process_request(request)?;
        Ok(TrackerScope {
            registry: Arc::clone(&self.registry),
            request_id: request.request_id(),
            tracker,
        })
    }
}

/// Guard tying a registry entry to a lexical scope.
#[must_use = "dropping the scope immediately removes the tracker"]
pub struct TrackerScope {
    registry: Arc<TrackerRegistry>,
    request_id: RequestId,
    tracker: Option<Arc<Tracker>>,
}

impl TrackerScope {
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn tracker(&self) -> Option<&Arc<Tracker>> {
        self.tracker.as_ref()
    }

    /// Finalizes explicitly; equivalent to dropping the guard.
    pub fn finish(self) {}
}

impl Drop for TrackerScope {
    fn drop(&mut self) {
        self.registry.remove(self.request_id);
    }
}
