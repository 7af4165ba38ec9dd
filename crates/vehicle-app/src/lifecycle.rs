//! # Application Lifecycle
//!
//! ```text
//! Created ──→ Starting ──→ Running ──→ Stopping ──→ Stopped
//!    │            │                       ↑
//!    └────────────┴───────────────────────┘
//! ```
//!
//! ## Startup Sequence
//!
//! 1. `VehicleApp::on_start` runs the initial actuation and fills the
//!    subscription and command tables
//! 2. Signal subscriptions are installed through the client; a path the
//!    broker cannot subscribe right now is logged and left inactive
//! 3. Command topics are subscribed on the messaging channel
//! 4. Dispatchers are spawned, state becomes `Running`
//!
//! A termination signal during startup abandons whatever step is in
//! progress and goes straight to `Stopping`.
//!
//! ## Shutdown Sequence
//!
//! 1. Signal shutdown to the dispatchers
//! 2. Wait for in-flight handlers (bounded by the shutdown grace)
//! 3. Release the signal source

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use signal_bus::MessageSubscriber;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vehicle_signals::{
    ActuationGateway, SignalError, SignalHandler, SignalPath, SubscriptionRegistry,
    VehicleSignalClient,
};

use crate::commands::{CommandError, CommandHandler, CommandTable};

/// Run state of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl AppState {
    /// Whether the lifecycle may move from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Starting)
                | (Self::Created, Self::Stopping)
                | (Self::Starting, Self::Running)
                | (Self::Starting, Self::Stopping)
                | (Self::Running, Self::Stopping)
                | (Self::Stopping, Self::Stopped)
        )
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Lifecycle errors.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid lifecycle transition {from} -> {to}")]
    InvalidTransition { from: AppState, to: AppState },

    #[error("signal source: {0}")]
    Signal(#[from] SignalError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Application hooks driven by `AppLifecycle`.
#[async_trait]
pub trait VehicleApp: Send + Sync {
    fn name(&self) -> &str;

    /// Perform initial actuation and declare subscriptions.
    ///
    /// Returning an error fails startup.
    async fn on_start(&self, ctx: &mut StartContext<'_>) -> Result<(), LifecycleError>;
}

/// What an application may touch while starting.
pub struct StartContext<'a> {
    gateway: &'a ActuationGateway,
    client: &'a VehicleSignalClient,
    registry: &'a mut SubscriptionRegistry,
    commands: &'a mut CommandTable,
}

impl StartContext<'_> {
    #[must_use]
    pub fn gateway(&self) -> &ActuationGateway {
        self.gateway
    }

    #[must_use]
    pub fn client(&self) -> &VehicleSignalClient {
        self.client
    }

    /// Declare a signal subscription. Installed after `on_start` returns.
    pub fn subscribe(
        &mut self,
        path: SignalPath,
        handler: Arc<dyn SignalHandler>,
    ) -> Result<(), SignalError> {
        self.registry.register(path, handler)
    }

    /// Declare a command topic handler. Installed after `on_start` returns.
    pub fn on_command(
        &mut self,
        topic: impl Into<String>,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<(), CommandError> {
        self.commands.register(topic, handler)
    }
}

/// Drives a `VehicleApp` through its run states.
pub struct AppLifecycle {
    app: Arc<dyn VehicleApp>,
    client: Arc<VehicleSignalClient>,
    commands: Arc<dyn MessageSubscriber>,
    state: watch::Sender<AppState>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
    shutdown_grace: Duration,
}

impl AppLifecycle {
    pub fn new(
        app: Arc<dyn VehicleApp>,
        client: Arc<VehicleSignalClient>,
        commands: Arc<dyn MessageSubscriber>,
    ) -> Self {
        let (state, _) = watch::channel(AppState::Created);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            app,
            client,
            commands,
            state,
            shutdown_tx,
            shutdown_rx,
            tasks: Vec::new(),
            shutdown_grace: Duration::from_secs(2),
        }
    }

    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    #[must_use]
    pub fn state(&self) -> AppState {
        *self.state.borrow()
    }

    /// Follow state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<AppState> {
        self.state.subscribe()
    }

    /// Flips to `true` when shutdown begins. For background tasks that
    /// live as long as the application.
    #[must_use]
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Start, run until `termination` completes, then shut down.
    ///
    /// A startup failure still shuts down cleanly before the error is
    /// returned.
    pub async fn run<F>(&mut self, termination: F) -> Result<(), LifecycleError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(termination);

        let startup = tokio::select! {
            biased;
            () = &mut termination => None,
            result = self.start() => Some(result),
        };

        match startup {
            None => {
                warn!(state = %self.state(), "Termination requested during startup");
                self.shutdown().await;
                Ok(())
            }
            Some(Err(e)) => {
                error!(error = %e, "Startup failed");
                self.shutdown().await;
                Err(e)
            }
            Some(Ok(())) => {
                info!(app = self.app.name(), "Vehicle app running");
                termination.await;
                info!("Termination signal received");
                self.shutdown().await;
                Ok(())
            }
        }
    }

    /// `Created → Starting → Running`.
    pub async fn start(&mut self) -> Result<(), LifecycleError> {
        self.transition(AppState::Starting)?;
        info!(app = self.app.name(), "Starting vehicle app");

        let gateway = ActuationGateway::new(Arc::clone(&self.client));
        let mut registry = SubscriptionRegistry::new();
        let mut commands = CommandTable::new();
        {
            let mut ctx = StartContext {
                gateway: &gateway,
                client: &self.client,
                registry: &mut registry,
                commands: &mut commands,
            };
            self.app.on_start(&mut ctx).await?;
        }

        let signals = registry.install(&self.client).await?;
        let commands = commands.install(self.commands.as_ref())?;

        if !signals.is_empty() {
            let shutdown = self.shutdown_rx.clone();
            self.tasks.push(tokio::spawn(async move {
                signals.run(shutdown).await;
            }));
        }
        if !commands.is_empty() {
            let shutdown = self.shutdown_rx.clone();
            self.tasks.push(tokio::spawn(async move {
                commands.run(shutdown).await;
            }));
        }

        self.transition(AppState::Running)
    }

    /// `→ Stopping → Stopped`. Does nothing if already stopping or stopped.
    pub async fn shutdown(&mut self) {
        if matches!(self.state(), AppState::Stopping | AppState::Stopped) {
            return;
        }
        if let Err(e) = self.transition(AppState::Stopping) {
            error!(error = %e, "Failed to enter stopping state");
            return;
        }

        info!("Initiating graceful shutdown...");
        self.shutdown_tx.send_replace(true);

        let handles = std::mem::take(&mut self.tasks);
        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        let drain = async {
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Dispatcher task failed");
                }
            }
        };

        if tokio::time::timeout(self.shutdown_grace, drain).await.is_err() {
            warn!(grace = ?self.shutdown_grace, "Handlers still busy after grace period, aborting");
            for abort in aborts {
                abort.abort();
            }
        } else {
            debug!("Dispatchers drained");
        }

        self.client.close().await;

        if let Err(e) = self.transition(AppState::Stopped) {
            error!(error = %e, "Failed to enter stopped state");
        }
    }

    fn transition(&self, next: AppState) -> Result<(), LifecycleError> {
        let current = self.state();
        if !current.can_transition_to(next) {
            return Err(LifecycleError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        self.state.send_replace(next);
        info!(from = %current, to = %next, "Lifecycle transition");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_bus::InMemoryMessageBus;
    use vehicle_signals::{paths, InMemoryDatabroker, UpdateSnapshot};

    struct Noop;

    #[async_trait]
    impl SignalHandler for Noop {
        async fn on_update(&self, _snapshot: &UpdateSnapshot) {}
    }

    /// Subscribes speed, optionally twice.
    struct SpeedOnly {
        twice: bool,
    }

    #[async_trait]
    impl VehicleApp for SpeedOnly {
        fn name(&self) -> &str {
            "speed-only"
        }

        async fn on_start(&self, ctx: &mut StartContext<'_>) -> Result<(), LifecycleError> {
            ctx.subscribe(paths::speed(), Arc::new(Noop))?;
            if self.twice {
                ctx.subscribe(paths::speed(), Arc::new(Noop))?;
            }
            Ok(())
        }
    }

    fn lifecycle(twice: bool) -> (AppLifecycle, Arc<InMemoryDatabroker>) {
        let broker = Arc::new(InMemoryDatabroker::standard());
        let client = Arc::new(VehicleSignalClient::new(broker.clone()));
        let lifecycle = AppLifecycle::new(
            Arc::new(SpeedOnly { twice }),
            client,
            Arc::new(InMemoryMessageBus::new()),
        );
        (lifecycle, broker)
    }

    #[test]
    fn test_transitions() {
        use AppState::*;

        assert!(Created.can_transition_to(Starting));
        assert!(Starting.can_transition_to(Running));
        assert!(Starting.can_transition_to(Stopping));
        assert!(Running.can_transition_to(Stopping));
        assert!(Stopping.can_transition_to(Stopped));

        assert!(!Stopping.can_transition_to(Running));
        assert!(!Stopped.can_transition_to(Starting));
        assert!(!Created.can_transition_to(Running));
        assert!(!Running.can_transition_to(Starting));
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let (mut lifecycle, broker) = lifecycle(false);
        assert_eq!(lifecycle.state(), AppState::Created);

        lifecycle.start().await.unwrap();
        assert_eq!(lifecycle.state(), AppState::Running);
        assert_eq!(broker.subscriber_count(), 1);

        lifecycle.shutdown().await;
        assert_eq!(lifecycle.state(), AppState::Stopped);
        assert!(!broker.is_connected());
        assert!(*lifecycle.shutdown_signal().borrow());
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let (mut lifecycle, _broker) = lifecycle(false);
        lifecycle.start().await.unwrap();

        let err = lifecycle.start().await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition {
                from: AppState::Running,
                to: AppState::Starting
            }
        ));
        lifecycle.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_subscription_fails_startup() {
        let (mut lifecycle, broker) = lifecycle(true);

        let err = lifecycle.run(std::future::pending()).await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Signal(SignalError::DuplicateSubscription { .. })
        ));
        assert_eq!(lifecycle.state(), AppState::Stopped);
        assert_eq!(broker.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_before_start() {
        let (mut lifecycle, _broker) = lifecycle(false);
        lifecycle.run(async {}).await.unwrap();
        assert_eq!(lifecycle.state(), AppState::Stopped);
    }
}
