//! # In-Memory Data Broker
//!
//! A catalog-validating signal source living in the same process.
//!
//! Application requests go through `SignalSource`: writes are only accepted
//! for actuators with a value of the declared type. Data providers (which
//! own sensor values) push through `feed`, which checks types but not
//! writability. Every accepted write or feed is broadcast to subscribers as
//! one `UpdateSnapshot`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::domain::catalog::SignalCatalog;
use crate::domain::path::SignalPath;
use crate::domain::snapshot::UpdateSnapshot;
use crate::domain::value::{SignalValue, Value};
use crate::error::SignalError;
use crate::ports::{SignalSource, UpdateStream};

/// Notifications buffered per subscriber before the oldest are dropped.
pub const DEFAULT_UPDATE_CAPACITY: usize = 256;

/// In-process signal broker.
pub struct InMemoryDatabroker {
    catalog: SignalCatalog,
    values: RwLock<HashMap<SignalPath, SignalValue>>,
    /// `None` while disconnected.
    updates: RwLock<Option<broadcast::Sender<UpdateSnapshot>>>,
    capacity: usize,
    writes: AtomicU64,
}

impl InMemoryDatabroker {
    pub fn new(catalog: SignalCatalog) -> Self {
        Self::with_capacity(catalog, DEFAULT_UPDATE_CAPACITY)
    }

    pub fn with_capacity(catalog: SignalCatalog, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            catalog,
            values: RwLock::new(HashMap::new()),
            updates: RwLock::new(Some(sender)),
            capacity,
            writes: AtomicU64::new(0),
        }
    }

    /// Broker over `SignalCatalog::standard()`.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(SignalCatalog::standard())
    }

    #[must_use]
    pub fn catalog(&self) -> &SignalCatalog {
        &self.catalog
    }

    /// Provider-side update of one or more signals.
    ///
    /// The batch is validated as a whole (known paths, declared types) before
    /// anything is stored, then delivered as a single snapshot.
    pub fn feed(&self, entries: Vec<(SignalPath, Value)>) -> Result<UpdateSnapshot, SignalError> {
        let sender = self.sender()?;
        for (path, value) in &entries {
            self.catalog.check_type(path, value)?;
        }

        let snapshot: UpdateSnapshot = entries
            .into_iter()
            .map(|(path, value)| SignalValue::new(path, value))
            .collect();
        self.store_and_notify(&sender, snapshot.clone());
        Ok(snapshot)
    }

    /// Drop the connection: every request fails with `Transport` and open
    /// update streams end.
    pub fn disconnect_now(&self) {
        if self.updates.write().take().is_some() {
            info!("Databroker disconnected");
        }
    }

    /// Accept requests again. Earlier subscriptions stay closed.
    pub fn reconnect(&self) {
        let mut updates = self.updates.write();
        if updates.is_none() {
            let (sender, _) = broadcast::channel(self.capacity);
            *updates = Some(sender);
            info!("Databroker reconnected");
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.updates.read().is_some()
    }

    /// Number of accepted application writes.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Number of open update streams.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.updates
            .read()
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    fn sender(&self) -> Result<broadcast::Sender<UpdateSnapshot>, SignalError> {
        self.updates
            .read()
            .clone()
            .ok_or_else(|| SignalError::Transport("databroker not connected".to_string()))
    }

    fn store_and_notify(&self, sender: &broadcast::Sender<UpdateSnapshot>, snapshot: UpdateSnapshot) {
        {
            let mut values = self.values.write();
            for entry in snapshot.iter() {
                values.insert(entry.path.clone(), entry.clone());
            }
        }

        // No receivers is fine: nobody is subscribed yet
        let receivers = sender.send(snapshot).unwrap_or(0);
        debug!(receivers, "Update broadcast");
    }
}

impl Default for InMemoryDatabroker {
    fn default() -> Self {
        Self::standard()
    }
}

#[async_trait]
impl SignalSource for InMemoryDatabroker {
    async fn get(&self, path: &SignalPath) -> Result<SignalValue, SignalError> {
        self.sender()?;
        let metadata = self.catalog.lookup(path)?;

        let current = self.values.read().get(path).cloned();
        Ok(current.unwrap_or_else(|| {
            SignalValue::new(path.clone(), metadata.data_type.default_value()).with_timestamp(0)
        }))
    }

    async fn set(&self, path: &SignalPath, value: Value) -> Result<(), SignalError> {
        let sender = self.sender()?;
        self.catalog.check_write(path, &value)?;

        self.writes.fetch_add(1, Ordering::Relaxed);
        self.store_and_notify(&sender, UpdateSnapshot::single(SignalValue::new(path.clone(), value)));
        Ok(())
    }

    async fn subscribe(&self, path: &SignalPath) -> Result<UpdateStream, SignalError> {
        let receiver = self.sender()?.subscribe();
        self.catalog.lookup(path)?;

        let watched = path.clone();
        let stream = BroadcastStream::new(receiver).filter_map(move |item| match item {
            Ok(snapshot) if snapshot.contains(&watched) => Some(snapshot),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(path = %watched, skipped, "Subscriber lagged, notifications dropped");
                None
            }
        });

        debug!(path = %path, "Subscription acknowledged");
        Ok(Box::pin(stream))
    }

    async fn disconnect(&self) {
        self.disconnect_now();
    }
}
