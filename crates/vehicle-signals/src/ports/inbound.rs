//! Inbound Ports (Driving Ports)

use async_trait::async_trait;

use crate::domain::snapshot::UpdateSnapshot;

/// Reaction to change notifications of a subscribed signal.
///
/// Handlers deal with their own failures: whatever goes wrong inside
/// `on_update` is logged there and never stops the dispatcher.
#[async_trait]
pub trait SignalHandler: Send + Sync {
    /// Called once per notification, in source order.
    async fn on_update(&self, snapshot: &UpdateSnapshot);

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
