//! Route lifecycle notifications.
//!
//! Observers are an explicit list attached to the API instance, not a
//! process-wide channel. Delivery is synchronous fan-out with no ordering
//! guarantee among observers. The fault policy is log-and-continue: an
//! observer failure is logged at `warn` and never reaches the request path.

use std::sync::Arc;

use crate::context::RouteContext;

pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Observer of the per-request context lifecycle.
///
/// `context_started` fires once a request passed its checks and its context
/// was built; `context_finished` fires exactly once per run, success or
/// failure, with no payload.
pub trait RouteObserver: Send + Sync {
    fn context_started(&self, _ctx: &RouteContext) -> Result<(), ObserverError> {
        Ok(())
    }

    fn context_finished(&self) -> Result<(), ObserverError> {
        Ok(())
    }
}

#[derive(Clone)]
pub(crate) struct Signals {
    observers: Arc<Vec<Arc<dyn RouteObserver>>>,
}

impl Signals {
    pub(crate) fn new(observers: Vec<Arc<dyn RouteObserver>>) -> Self {
        Self {
            observers: Arc::new(observers),
        }
    }

    pub(crate) fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub(crate) fn emit_started(&self, ctx: &RouteContext) {
        for observer in self.observers.iter() {
            if let Err(e) = observer.context_started(ctx) {
                tracing::warn!(error = %e, "route observer failed on context_started");
            }
        }
    }

    pub(crate) fn emit_finished(&self) {
        for observer in self.observers.iter() {
            if let Err(e) = observer.context_finished() {
                tracing::warn!(error = %e, "route observer failed on context_finished");
            }
        }
    }
}

/// Emits the finished notification when dropped, so teardown is broadcast
/// exactly once on every exit path of a run.
pub(crate) struct FinishedGuard {
    signals: Signals,
}

impl FinishedGuard {
    pub(crate) fn new(signals: Signals) -> Self {
        Self { signals }
    }
}

impl Drop for FinishedGuard {
    fn drop(&mut self) {
        self.signals.emit_finished();
    }
}
