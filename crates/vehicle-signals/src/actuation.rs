//! # Actuation Gateway
//!
//! Validated writes to actuators.
//!
//! A rejected request (wrong type, read-only path, unknown path) is logged
//! and reported as `ActuationOutcome::Rejected`; the caller carries on.
//! A `Transport` error is returned as `Err` and aborts the operation in
//! progress. No retries.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::client::VehicleSignalClient;
use crate::domain::path::SignalPath;
use crate::domain::value::Value;
use crate::error::SignalError;

/// A write request for one signal. Created per call, not retained.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuationRequest {
    pub path: SignalPath,
    pub value: Value,
}

impl ActuationRequest {
    pub fn new(path: SignalPath, value: impl Into<Value>) -> Self {
        Self {
            path,
            value: value.into(),
        }
    }
}

/// Result of a request that reached the signal source.
#[derive(Debug, Clone, PartialEq)]
pub enum ActuationOutcome {
    /// The source accepted the write.
    Applied,
    /// The source refused the request; the error is a domain error.
    Rejected(SignalError),
}

impl ActuationOutcome {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// One step of a timed sequence: write `value`, then hold for `hold`.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceStep {
    pub value: Value,
    pub hold: Duration,
}

/// An ordered list of values applied to one actuator, each held for a
/// fixed time before the next one is written.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedSequence {
    path: SignalPath,
    steps: Vec<SequenceStep>,
}

impl TimedSequence {
    pub fn new(path: SignalPath) -> Self {
        Self {
            path,
            steps: Vec::new(),
        }
    }

    /// Append a step, builder style.
    #[must_use]
    pub fn step(mut self, value: impl Into<Value>, hold: Duration) -> Self {
        self.steps.push(SequenceStep {
            value: value.into(),
            hold,
        });
        self
    }

    /// Boolean toggle sequence with the same hold after every state.
    pub fn toggle(path: SignalPath, states: impl IntoIterator<Item = bool>, hold: Duration) -> Self {
        states
            .into_iter()
            .fold(Self::new(path), |seq, state| seq.step(state, hold))
    }

    #[must_use]
    pub fn path(&self) -> &SignalPath {
        &self.path
    }

    #[must_use]
    pub fn steps(&self) -> &[SequenceStep] {
        &self.steps
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// What happened to a sequence that ran to its end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceReport {
    /// Steps the source accepted.
    pub applied: usize,
    /// Rejected steps by index, with the reason.
    pub rejected: Vec<(usize, SignalError)>,
}

impl SequenceReport {
    /// Total steps attempted.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.applied + self.rejected.len()
    }
}

/// Executes actuation requests and timed sequences against the client.
pub struct ActuationGateway {
    client: Arc<VehicleSignalClient>,
}

impl ActuationGateway {
    pub fn new(client: Arc<VehicleSignalClient>) -> Self {
        Self { client }
    }

    /// Write one value.
    ///
    /// Domain errors come back as `Ok(ActuationOutcome::Rejected(_))`;
    /// only `Transport` errors are returned as `Err`.
    pub async fn actuate(&self, request: ActuationRequest) -> Result<ActuationOutcome, SignalError> {
        let ActuationRequest { path, value } = request;

        match self.client.set(&path, value.clone()).await {
            Ok(()) => {
                info!(path = %path, value = %value, "Actuation applied");
                Ok(ActuationOutcome::Applied)
            }
            Err(e) if e.is_transport() => {
                error!(path = %path, value = %value, error = %e, "Actuation failed");
                Err(e)
            }
            Err(e) => {
                warn!(path = %path, value = %value, error = %e, "Actuation rejected");
                Ok(ActuationOutcome::Rejected(e))
            }
        }
    }

    /// Apply every step of `sequence` in order, holding after each one.
    ///
    /// Rejected steps do not stop the sequence and their hold still applies.
    /// A `Transport` error stops it: the actuator keeps whatever the last
    /// accepted step wrote, and the error is returned.
    pub async fn run_sequence(&self, sequence: &TimedSequence) -> Result<SequenceReport, SignalError> {
        let total = sequence.len();
        let mut report = SequenceReport::default();
        info!(path = %sequence.path(), steps = total, "Actuation sequence started");

        for (index, step) in sequence.steps().iter().enumerate() {
            info!(
                path = %sequence.path(),
                step = index + 1,
                total,
                value = %step.value,
                "Applying sequence step"
            );

            let request = ActuationRequest::new(sequence.path().clone(), step.value.clone());
            match self.actuate(request).await {
                Ok(ActuationOutcome::Applied) => report.applied += 1,
                Ok(ActuationOutcome::Rejected(e)) => report.rejected.push((index, e)),
                Err(e) => {
                    warn!(
                        path = %sequence.path(),
                        step = index + 1,
                        total,
                        "Actuation sequence interrupted"
                    );
                    return Err(e);
                }
            }

            tokio::time::sleep(step.hold).await;
        }

        info!(
            path = %sequence.path(),
            applied = report.applied,
            rejected = report.rejected.len(),
            "Actuation sequence finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryDatabroker;
    use crate::domain::catalog::paths;
    use crate::domain::value::{DataType, SignalValue};
    use crate::ports::{SignalSource, UpdateStream};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::time::Instant;

    const HOLD: Duration = Duration::from_secs(2);

    /// Source that records every `set` with the (virtual) time it arrived.
    ///
    /// Writes listed in `fail_transport_at` fail with a transport error;
    /// everything else is validated by an in-memory broker.
    struct RecordingSource {
        inner: InMemoryDatabroker,
        calls: Mutex<Vec<(Instant, Value)>>,
        fail_transport_at: Vec<usize>,
    }

    impl RecordingSource {
        fn new() -> Self {
            Self::failing_at(Vec::new())
        }

        fn failing_at(fail_transport_at: Vec<usize>) -> Self {
            Self {
                inner: InMemoryDatabroker::standard(),
                calls: Mutex::new(Vec::new()),
                fail_transport_at,
            }
        }

        fn values(&self) -> Vec<Value> {
            self.calls.lock().iter().map(|(_, v)| v.clone()).collect()
        }

        fn instants(&self) -> Vec<Instant> {
            self.calls.lock().iter().map(|(t, _)| *t).collect()
        }
    }

    #[async_trait]
    impl SignalSource for RecordingSource {
        async fn get(&self, path: &SignalPath) -> Result<SignalValue, SignalError> {
            self.inner.get(path).await
        }

        async fn set(&self, path: &SignalPath, value: Value) -> Result<(), SignalError> {
            let index = {
                let mut calls = self.calls.lock();
                calls.push((Instant::now(), value.clone()));
                calls.len() - 1
            };
            if self.fail_transport_at.contains(&index) {
                return Err(SignalError::Transport("connection reset".into()));
            }
            self.inner.set(path, value).await
        }

        async fn subscribe(&self, path: &SignalPath) -> Result<UpdateStream, SignalError> {
            self.inner.subscribe(path).await
        }
    }

    fn gateway_over(source: &Arc<RecordingSource>) -> ActuationGateway {
        let client = VehicleSignalClient::new(Arc::clone(source) as Arc<dyn SignalSource>);
        ActuationGateway::new(Arc::new(client))
    }

    #[tokio::test]
    async fn test_actuate_applied() {
        let source = Arc::new(RecordingSource::new());
        let gateway = gateway_over(&source);

        let outcome = gateway
            .actuate(ActuationRequest::new(paths::brake_light(), true))
            .await
            .unwrap();
        assert!(outcome.is_applied());
        assert_eq!(
            source.inner.get(&paths::brake_light()).await.unwrap().value,
            Value::Bool(true)
        );
    }

    #[tokio::test]
    async fn test_type_mismatch_does_not_escape_gateway() {
        let source = Arc::new(RecordingSource::new());
        let gateway = gateway_over(&source);

        let outcome = gateway
            .actuate(ActuationRequest::new(paths::brake_light(), 1.5_f32))
            .await
            .expect("domain errors are not returned as Err");

        match outcome {
            ActuationOutcome::Rejected(SignalError::TypeMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, DataType::Boolean);
                assert_eq!(actual, DataType::Float);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_only_path_is_rejected() {
        let source = Arc::new(RecordingSource::new());
        let gateway = gateway_over(&source);

        let outcome = gateway
            .actuate(ActuationRequest::new(paths::latitude(), 48.1_f64))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            ActuationOutcome::Rejected(SignalError::NotWritable { .. })
        ));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let source = Arc::new(RecordingSource::failing_at(vec![0]));
        let gateway = gateway_over(&source);

        let err = gateway
            .actuate(ActuationRequest::new(paths::brake_light(), true))
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test(start_paused = true)]
    async fn test_brake_light_toggle_sequence() {
        let source = Arc::new(RecordingSource::new());
        let gateway = gateway_over(&source);
        let sequence = TimedSequence::toggle(paths::brake_light(), [true, false, true], HOLD);

        let started = Instant::now();
        let report = gateway.run_sequence(&sequence).await.unwrap();

        assert_eq!(report.applied, 3);
        assert!(report.rejected.is_empty());
        assert_eq!(
            source.values(),
            vec![Value::Bool(true), Value::Bool(false), Value::Bool(true)]
        );

        let at = source.instants();
        assert!(at[1] - at[0] >= HOLD);
        assert!(at[2] - at[1] >= HOLD);
        // The last state is held too
        assert!(started.elapsed() >= HOLD * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_step_does_not_skip_the_rest() {
        let source = Arc::new(RecordingSource::new());
        let gateway = gateway_over(&source);
        let sequence = TimedSequence::new(paths::brake_light())
            .step(true, HOLD)
            .step(0.5_f32, Duration::from_secs(1))
            .step(false, HOLD)
            .step("on", HOLD)
            .step(true, HOLD);

        let report = gateway.run_sequence(&sequence).await.unwrap();

        // Exactly one call per step, in declared order
        assert_eq!(source.values().len(), 5);
        assert_eq!(
            source.values(),
            sequence.steps().iter().map(|s| s.value.clone()).collect::<Vec<_>>()
        );
        assert_eq!(report.applied, 3);
        assert_eq!(
            report.rejected.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(report.attempted(), 5);

        let at = source.instants();
        for (i, step) in sequence.steps().iter().enumerate().take(4) {
            assert!(at[i + 1] - at[i] >= step.hold);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_interrupts_sequence() {
        let source = Arc::new(RecordingSource::failing_at(vec![1]));
        let gateway = gateway_over(&source);
        let sequence = TimedSequence::toggle(paths::brake_light(), [true, false, true], HOLD);

        let err = gateway.run_sequence(&sequence).await.unwrap_err();
        assert!(err.is_transport());

        // Third step never ran; the light stays in the state of the first step
        assert_eq!(source.values(), vec![Value::Bool(true), Value::Bool(false)]);
        assert_eq!(
            source.inner.get(&paths::brake_light()).await.unwrap().value,
            Value::Bool(true)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_between_steps() {
        let source = Arc::new(RecordingSource::new());
        let gateway = gateway_over(&source);
        let sequence = TimedSequence::toggle(paths::brake_light(), [true, false, true], HOLD);

        // Cancelled during the second hold
        let cancelled = tokio::time::timeout(Duration::from_secs(3), gateway.run_sequence(&sequence)).await;
        assert!(cancelled.is_err());
        assert_eq!(source.values(), vec![Value::Bool(true), Value::Bool(false)]);
    }

    #[test]
    fn test_toggle_builder() {
        let seq = TimedSequence::toggle(paths::brake_light(), [true, false], HOLD);
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.steps()[1].value, Value::Bool(false));
        assert!(TimedSequence::new(paths::brake_light()).is_empty());
    }
}
