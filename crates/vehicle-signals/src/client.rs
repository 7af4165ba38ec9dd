//! # Vehicle Signal Client
//!
//! The one handle the application holds on the signal source. It is built
//! once and passed explicitly to every component that needs it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::domain::path::SignalPath;
use crate::domain::value::{SignalValue, Value};
use crate::error::SignalError;
use crate::ports::{SignalHandler, SignalSource, UpdateStream};

/// Deadline for a single request to the signal source.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Reads, writes and subscribes to signals on a `SignalSource`.
///
/// Every request is bounded by the request timeout; an elapsed deadline is
/// reported as a `Transport` error.
pub struct VehicleSignalClient {
    source: Arc<dyn SignalSource>,
    request_timeout: Duration,
}

impl VehicleSignalClient {
    pub fn new(source: Arc<dyn SignalSource>) -> Self {
        Self {
            source,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Current value of `path`.
    pub async fn get(&self, path: &SignalPath) -> Result<SignalValue, SignalError> {
        self.bounded("get", path, self.source.get(path)).await
    }

    /// Write `value` to `path`.
    pub async fn set(&self, path: &SignalPath, value: Value) -> Result<(), SignalError> {
        self.bounded("set", path, self.source.set(path, value)).await
    }

    /// Register `handler` for every future change notification touching `path`.
    ///
    /// Returns once the source acknowledged the registration. The returned
    /// `Subscription` carries the update stream; nothing is delivered to the
    /// handler until a `SignalDispatcher` drives it.
    pub async fn subscribe(
        &self,
        path: SignalPath,
        handler: Arc<dyn SignalHandler>,
    ) -> Result<Subscription, SignalError> {
        let updates = self
            .bounded("subscribe", &path, self.source.subscribe(&path))
            .await?;
        info!(path = %path, handler = handler.name(), "Subscribed");
        Ok(Subscription {
            path,
            handler,
            updates,
        })
    }

    /// Release the connection to the signal source.
    pub async fn close(&self) {
        self.source.disconnect().await;
        debug!("Signal client closed");
    }

    async fn bounded<T, F>(&self, op: &'static str, path: &SignalPath, request: F) -> Result<T, SignalError>
    where
        F: Future<Output = Result<T, SignalError>>,
    {
        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(SignalError::Transport(format!(
                "{op} {path} timed out after {:?}",
                self.request_timeout
            ))),
        }
    }
}

/// One path bound to one handler, with the stream of its notifications.
pub struct Subscription {
    path: SignalPath,
    handler: Arc<dyn SignalHandler>,
    updates: UpdateStream,
}

impl Subscription {
    #[must_use]
    pub fn path(&self) -> &SignalPath {
        &self.path
    }

    #[must_use]
    pub fn handler(&self) -> &Arc<dyn SignalHandler> {
        &self.handler
    }

    pub(crate) fn into_parts(self) -> (SignalPath, Arc<dyn SignalHandler>, UpdateStream) {
        (self.path, self.handler, self.updates)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .field("handler", &self.handler.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryDatabroker;
    use crate::domain::catalog::paths;
    use crate::domain::snapshot::UpdateSnapshot;
    use async_trait::async_trait;

    struct Ignore;

    #[async_trait]
    impl SignalHandler for Ignore {
        async fn on_update(&self, _snapshot: &UpdateSnapshot) {}
    }

    /// Source that never answers.
    struct Stalled;

    #[async_trait]
    impl SignalSource for Stalled {
        async fn get(&self, _path: &SignalPath) -> Result<SignalValue, SignalError> {
            std::future::pending().await
        }

        async fn set(&self, _path: &SignalPath, _value: Value) -> Result<(), SignalError> {
            std::future::pending().await
        }

        async fn subscribe(&self, _path: &SignalPath) -> Result<UpdateStream, SignalError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_roundtrip_through_source() {
        let client = VehicleSignalClient::new(Arc::new(InMemoryDatabroker::standard()));

        client.set(&paths::brake_light(), Value::Bool(true)).await.unwrap();
        let current = client.get(&paths::brake_light()).await.unwrap();
        assert_eq!(current.value, Value::Bool(true));
    }

    #[tokio::test]
    async fn test_domain_errors_pass_through() {
        let client = VehicleSignalClient::new(Arc::new(InMemoryDatabroker::standard()));

        let err = client.set(&paths::speed(), Value::Float(1.0)).await.unwrap_err();
        assert!(matches!(err, SignalError::NotWritable { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout_is_transport_error() {
        let client =
            VehicleSignalClient::new(Arc::new(Stalled)).with_request_timeout(Duration::from_secs(5));

        let err = client.set(&paths::brake_light(), Value::Bool(true)).await.unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("timed out"));

        let err = client.subscribe(paths::speed(), Arc::new(Ignore)).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_subscribe_carries_handler() {
        let client = VehicleSignalClient::new(Arc::new(InMemoryDatabroker::standard()));
        let subscription = client.subscribe(paths::speed(), Arc::new(Ignore)).await.unwrap();

        assert_eq!(subscription.path(), &paths::speed());
        assert!(subscription.handler().name().contains("Ignore"));
    }

    #[tokio::test]
    async fn test_close_disconnects_source() {
        let broker = Arc::new(InMemoryDatabroker::standard());
        let client = VehicleSignalClient::new(broker.clone());

        client.close().await;
        assert!(!broker.is_connected());
        assert!(client.get(&paths::speed()).await.unwrap_err().is_transport());
    }
}
