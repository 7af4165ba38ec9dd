//! # Subscription Registry
//!
//! Single source of truth for "is path P observed, and by which handler".
//!
//! ## Policy
//!
//! At most one handler per path. A second `register` for a path that is
//! already registered is rejected with `DuplicateSubscription` and the first
//! handler stays in place. There is no removal short of shutdown.
//!
//! ## Dispatch
//!
//! `install` subscribes every registered path through the client and hands
//! back a `SignalDispatcher`, which drives all handlers from a single loop:
//! handlers never run concurrently with each other, and notifications for
//! one path reach its handler in source order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::watch;
use tokio_stream::{StreamExt, StreamMap};
use tracing::{debug, error, info};

use crate::client::{Subscription, VehicleSignalClient};
use crate::domain::path::SignalPath;
use crate::error::SignalError;
use crate::ports::{SignalHandler, UpdateStream};

/// Path → handler table, filled during startup.
#[derive(Default)]
pub struct SubscriptionRegistry {
    handlers: HashMap<SignalPath, Arc<dyn SignalHandler>>,
    /// Registration order, used for a deterministic install order.
    order: Vec<SignalPath>,
    /// Paths whose subscription the source acknowledged.
    active: HashSet<SignalPath>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `path`.
    pub fn register(
        &mut self,
        path: SignalPath,
        handler: Arc<dyn SignalHandler>,
    ) -> Result<(), SignalError> {
        if let Some(existing) = self.handlers.get(&path) {
            error!(
                path = %path,
                existing = existing.name(),
                rejected = handler.name(),
                "Duplicate subscription rejected"
            );
            return Err(SignalError::DuplicateSubscription { path });
        }

        debug!(path = %path, handler = handler.name(), "Handler registered");
        self.order.push(path.clone());
        self.handlers.insert(path, handler);
        Ok(())
    }

    /// Whether a handler is registered for `path`.
    #[must_use]
    pub fn is_registered(&self, path: &SignalPath) -> bool {
        self.handlers.contains_key(path)
    }

    /// Whether `path` is currently observed: registered and acknowledged by the source.
    #[must_use]
    pub fn is_active(&self, path: &SignalPath) -> bool {
        self.active.contains(path)
    }

    /// The handler bound to `path`.
    #[must_use]
    pub fn handler(&self, path: &SignalPath) -> Option<&Arc<dyn SignalHandler>> {
        self.handlers.get(path)
    }

    /// Registered paths in registration order.
    #[must_use]
    pub fn paths(&self) -> &[SignalPath] {
        &self.order
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Subscribe every registered, not yet active path through `client`.
    ///
    /// A domain error (unknown path) fails the whole call: none of this
    /// call's subscriptions become active and the error is returned.
    /// A transport error only skips its path, which stays registered but
    /// inactive; the remaining paths are still installed.
    pub async fn install(&mut self, client: &VehicleSignalClient) -> Result<SignalDispatcher, SignalError> {
        let mut subscriptions = Vec::new();
        let mut skipped = 0_usize;

        for path in &self.order {
            if self.active.contains(path) {
                continue;
            }
            let Some(handler) = self.handlers.get(path) else {
                continue;
            };

            match client.subscribe(path.clone(), Arc::clone(handler)).await {
                Ok(subscription) => subscriptions.push(subscription),
                Err(e) if e.is_transport() => {
                    error!(path = %path, error = %e, "Subscription not installed, path stays inactive");
                    skipped += 1;
                }
                Err(e) => {
                    error!(path = %path, error = %e, "Failed to install subscription");
                    return Err(e);
                }
            }
        }

        for subscription in &subscriptions {
            self.active.insert(subscription.path().clone());
        }
        info!(count = subscriptions.len(), skipped, "Subscriptions installed");

        Ok(SignalDispatcher::new(subscriptions))
    }
}

/// Counters reported when a dispatcher stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Handler invocations completed.
    pub delivered: u64,
}

/// Drives the handlers of a set of subscriptions from one loop.
pub struct SignalDispatcher {
    streams: StreamMap<SignalPath, UpdateStream>,
    handlers: HashMap<SignalPath, Arc<dyn SignalHandler>>,
}

impl SignalDispatcher {
    pub fn new(subscriptions: Vec<Subscription>) -> Self {
        let mut streams = StreamMap::new();
        let mut handlers = HashMap::new();

        for subscription in subscriptions {
            let (path, handler, updates) = subscription.into_parts();
            streams.insert(path.clone(), updates);
            handlers.insert(path, handler);
        }

        Self { streams, handlers }
    }

    /// Number of subscriptions driven by this dispatcher.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Deliver notifications until shutdown is signalled or every stream ended.
    ///
    /// Shutdown is only observed between handler invocations, so a handler
    /// that already started always runs to completion.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> DispatchStats {
        let mut stats = DispatchStats::default();
        info!(subscriptions = self.len(), "Signal dispatcher started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // Sender gone, nobody can ask us to keep running
                        break;
                    }
                }
                next = self.streams.next() => {
                    let Some((path, snapshot)) = next else {
                        info!("All signal subscriptions closed");
                        break;
                    };
                    if let Some(handler) = self.handlers.get(&path) {
                        debug!(path = %path, entries = snapshot.len(), "Dispatching update");
                        handler.on_update(&snapshot).await;
                        stats.delivered += 1;
                    }
                }
            }
        }

        info!(delivered = stats.delivered, "Signal dispatcher stopped");
        stats
    }
}
