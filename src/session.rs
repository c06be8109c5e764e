//! Real-time coordination session
//!
//! Wraps a [`Coordinator`] with the pieces that need a runtime: the
//! activation backend, the live transport subscription and a tick task
//! driven by `tokio::time::interval`.
//!
//! The coordinator sits behind a `std::sync::Mutex` that is only held for
//! synchronous engine calls, never across an `.await`. Lifecycle calls
//! (`start` / `reset`) are serialized by an async mutex around the driver
//! handle, and `start` always finishes a full reset first: the previous
//! tick task is cancelled and joined, its subscription dropped, and its run
//! discarded before the new activation is requested.
//!
//! Subscribing to the live transport is given [`SUBSCRIBE_WAIT`] inside
//! `start`. A transport still connecting after that is handed to the driver
//! as a pending future, so a silent event endpoint never holds up ticks,
//! the fallback simulator or a reset.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::activation::{ActivationBackend, ActivationRequest};
use crate::engine::{Coordinator, LiveOutcome, ResetReport, RunId, RunState, Snapshot};
use crate::error::{ActivationError, TransportError};
use crate::observability::events::{Event, EventEmitter};
use crate::observability::metrics;
use crate::transport::{LiveEvent, LiveSubscription, LiveTransport, TransportType};

/// How long `start` waits for the live subscription before leaving it to the
/// driver.
pub const SUBSCRIBE_WAIT: Duration = Duration::from_secs(2);

type PendingSubscription =
    Pin<Box<dyn Future<Output = crate::transport::Result<LiveSubscription>> + Send>>;

/// Lifecycle of the session's current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// No run
    Idle,
    /// Run in progress
    Running(RunId),
    /// Run reached `complete`; state stays readable until reset
    Complete(RunId),
}

struct Driver {
    run_id: RunId,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// One coordinator plus its real-time driver.
pub struct CoordinationSession {
    coordinator: Arc<Mutex<Coordinator>>,
    backend: Arc<dyn ActivationBackend>,
    transport: Arc<dyn LiveTransport>,
    emitter: Arc<EventEmitter>,
    tick_interval: Duration,
    driver: tokio::sync::Mutex<Option<Driver>>,
    status: Arc<watch::Sender<SessionStatus>>,
}

impl std::fmt::Debug for CoordinationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinationSession")
            .field("backend", &self.backend.name())
            .field("transport", &self.transport.transport_type())
            .field("tick_interval", &self.tick_interval)
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

impl CoordinationSession {
    /// Creates an idle session. The tick interval comes from the scenario's
    /// `clock` section.
    #[must_use]
    pub fn new(
        coordinator: Coordinator,
        backend: Arc<dyn ActivationBackend>,
        transport: Arc<dyn LiveTransport>,
        emitter: Arc<EventEmitter>,
    ) -> Self {
        let tick_interval = coordinator
            .scenario()
            .clock
            .tick_interval
            .max(Duration::from_millis(1));
        let (status, _) = watch::channel(SessionStatus::Idle);
        Self {
            coordinator: Arc::new(Mutex::new(coordinator)),
            backend,
            transport,
            emitter,
            tick_interval,
            driver: tokio::sync::Mutex::new(None),
            status: Arc::new(status),
        }
    }

    /// Starts a new run, resetting any current one first.
    ///
    /// A transport that cannot subscribe is logged and the run proceeds on
    /// the fallback simulator alone. Returns after at most
    /// [`SUBSCRIBE_WAIT`] plus the backend call.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError`] if the backend refuses the activation.
    /// The session is left idle; nothing retries.
    pub async fn start(&self) -> Result<RunState, ActivationError> {
        let mut driver = self.driver.lock().await;
        self.reset_locked(&mut driver).await;

        let request = ActivationRequest::from_scenario(self.lock().scenario());
        let activation = self.backend.start_activation(&request).await.inspect_err(|e| {
            warn!(backend = self.backend.name(), error = %e, "activation failed");
        })?;

        let (state, scenario_name) = {
            let mut coordinator = self.lock();
            let state = coordinator.start(activation).clone();
            (state, coordinator.scenario().scenario.name.clone())
        };
        let run_id = state.run_id.clone();
        let started = Instant::now();

        self.emitter.emit(Event::RunStarted {
            timestamp: chrono::Utc::now(),
            run_id: run_id.clone(),
            scenario: scenario_name,
            total_members: state.total_members,
            target_seconds: state.target_completion.as_secs(),
            backend: self.backend.name().to_string(),
        });
        self.status.send_replace(SessionStatus::Running(run_id.clone()));

        let transport_type = self.transport.transport_type();
        let mut connecting: PendingSubscription = {
            let transport = Arc::clone(&self.transport);
            let run_id = run_id.clone();
            Box::pin(async move { transport.subscribe(&run_id).await })
        };
        let live = match tokio::time::timeout(SUBSCRIBE_WAIT, &mut connecting).await {
            Ok(result) => LiveLink::settle(result, &run_id, transport_type),
            Err(_) => {
                debug!(
                    run_id = %run_id,
                    transport = %transport_type,
                    "live transport still connecting; driver takes over"
                );
                LiveLink::Connecting(connecting)
            }
        };

        let cancel = CancellationToken::new();
        let task = DriverTask {
            coordinator: Arc::clone(&self.coordinator),
            emitter: Arc::clone(&self.emitter),
            status: Arc::clone(&self.status),
            run_id: run_id.clone(),
            transport_type,
            tick_interval: self.tick_interval,
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(task.run(started, live));

        *driver = Some(Driver {
            run_id,
            cancel,
            handle,
        });
        Ok(state)
    }

    /// Cancels the tick task, drops the transport subscription and discards
    /// the run. Returns `None` when there was nothing to reset.
    pub async fn reset(&self) -> Option<ResetReport> {
        let mut driver = self.driver.lock().await;
        self.reset_locked(&mut driver).await
    }

    async fn reset_locked(&self, driver: &mut Option<Driver>) -> Option<ResetReport> {
        if let Some(active) = driver.take() {
            active.cancel.cancel();
            if let Err(e) = active.handle.await {
                warn!(run_id = %active.run_id, error = %e, "driver task ended abnormally");
            }
        }

        let report = self.lock().reset();
        if let Some(report) = &report {
            self.emitter.emit(Event::RunReset {
                timestamp: chrono::Utc::now(),
                run_id: report.run_id.clone(),
                cancelled_timers: report.cancelled_timers,
            });
        }
        self.status.send_replace(SessionStatus::Idle);
        report
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot()
    }

    /// Id of the active run, if any.
    #[must_use]
    pub fn active_run(&self) -> Option<RunId> {
        self.lock().active_run().cloned()
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every status change.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Waits until the current run leaves `Running`. Returns the run id if
    /// it completed, `None` if it was reset or no run was active.
    pub async fn wait_for_completion(&self) -> Option<RunId> {
        let mut rx = self.status.subscribe();
        let status = rx
            .wait_for(|s| !matches!(s, SessionStatus::Running(_)))
            .await
            .ok()?;
        match &*status {
            SessionStatus::Complete(run_id) => Some(run_id.clone()),
            SessionStatus::Idle | SessionStatus::Running(_) => None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Coordinator> {
        lock(&self.coordinator)
    }
}

impl Drop for CoordinationSession {
    fn drop(&mut self) {
        if let Some(active) = self.driver.get_mut().take() {
            active.cancel.cancel();
        }
    }
}

fn lock(coordinator: &Mutex<Coordinator>) -> MutexGuard<'_, Coordinator> {
    coordinator.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Tick task
// ============================================================================

struct DriverTask {
    coordinator: Arc<Mutex<Coordinator>>,
    emitter: Arc<EventEmitter>,
    status: Arc<watch::Sender<SessionStatus>>,
    run_id: RunId,
    transport_type: TransportType,
    tick_interval: Duration,
    cancel: CancellationToken,
}

/// The driver's side of the live transport.
enum LiveLink {
    Connecting(PendingSubscription),
    Subscribed(LiveSubscription),
    Detached,
}

enum LiveStep {
    Settled(crate::transport::Result<LiveSubscription>),
    Event(Option<Result<LiveEvent, TransportError>>),
}

impl LiveLink {
    fn settle(
        result: crate::transport::Result<LiveSubscription>,
        run_id: &RunId,
        transport_type: TransportType,
    ) -> Self {
        match result {
            Ok(subscription) => {
                debug!(run_id = %run_id, transport = %transport_type, "live transport subscribed");
                Self::Subscribed(subscription)
            }
            Err(e) => {
                warn!(
                    run_id = %run_id,
                    transport = %transport_type,
                    error = %e,
                    "live transport unavailable; relying on simulation"
                );
                metrics::record_transport_error(transport_type.as_str());
                Self::Detached
            }
        }
    }

    /// Resolves when the link has something to report. Never resolves once
    /// detached.
    async fn next(&mut self) -> LiveStep {
        match self {
            Self::Connecting(pending) => LiveStep::Settled(pending.await),
            Self::Subscribed(subscription) => LiveStep::Event(subscription.next().await),
            Self::Detached => std::future::pending().await,
        }
    }
}

impl DriverTask {
    /// Ticks until cancelled. After completion the live link is dropped but
    /// ticking continues so elapsed time and the task timeline stay current
    /// until reset.
    async fn run(self, started: Instant, mut live: LiveLink) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    debug!(run_id = %self.run_id, "driver cancelled");
                    break;
                }
                step = live.next() => match step {
                    LiveStep::Settled(result) => {
                        live = LiveLink::settle(result, &self.run_id, self.transport_type);
                    }
                    LiveStep::Event(Some(Ok(event))) => match self.apply_live(&event) {
                        Flow::Continue => {}
                        Flow::Completed => live = LiveLink::Detached,
                        Flow::Stop => break,
                    },
                    LiveStep::Event(Some(Err(e))) => {
                        warn!(run_id = %self.run_id, error = %e, "live transport error; continuing");
                        metrics::record_transport_error(self.transport_type.as_str());
                    }
                    LiveStep::Event(None) => {
                        warn!(run_id = %self.run_id, "live transport closed; continuing on simulation");
                        live = LiveLink::Detached;
                    }
                },
                _ = interval.tick() => match self.tick(started.elapsed()) {
                    Flow::Continue => {}
                    Flow::Completed => live = LiveLink::Detached,
                    Flow::Stop => break,
                },
            }
        }
    }

    fn tick(&self, elapsed: Duration) -> Flow {
        let (report, final_snapshot) = {
            let mut coordinator = lock(&self.coordinator);
            let report = coordinator.tick(elapsed);
            let snapshot = report.completed().then(|| coordinator.snapshot());
            (report, snapshot)
        };

        if report.run_id.as_ref() != Some(&self.run_id) {
            debug!(run_id = %self.run_id, "run replaced; driver stopping");
            return Flow::Stop;
        }

        self.emitter.emit_tick(&report);
        if let Some(snapshot) = final_snapshot {
            self.finish(&snapshot);
            return Flow::Completed;
        }
        Flow::Continue
    }

    fn apply_live(&self, event: &LiveEvent) -> Flow {
        let (outcome, snapshot) = {
            let mut coordinator = lock(&self.coordinator);
            let outcome = coordinator.apply_live(&self.run_id, event);
            let snapshot = matches!(outcome, Ok(LiveOutcome::Completed { .. }))
                .then(|| coordinator.snapshot());
            (outcome, snapshot)
        };

        match outcome {
            Ok(LiveOutcome::Accepted(record)) => {
                self.emitter.emit(Event::MemberAcknowledged {
                    timestamp: chrono::Utc::now(),
                    run_id: self.run_id.clone(),
                    member_id: record.member.to_string(),
                    origin: record.origin,
                    response_time_seconds: record.response_time_seconds,
                });
                Flow::Continue
            }
            Ok(LiveOutcome::Completed { transition, .. }) => {
                if let Some(snapshot) = snapshot {
                    self.emitter.emit(Event::PhaseEntered {
                        timestamp: chrono::Utc::now(),
                        run_id: self.run_id.clone(),
                        from: transition.from,
                        phase: transition.to,
                        reason: transition.reason,
                        elapsed_seconds: snapshot.elapsed_seconds,
                        ratio: snapshot.ratio,
                    });
                    self.finish(&snapshot);
                }
                Flow::Completed
            }
            Ok(LiveOutcome::Duplicate(member)) => {
                debug!(run_id = %self.run_id, %member, "duplicate acknowledgment ignored");
                Flow::Continue
            }
            Ok(LiveOutcome::UnknownMember | LiveOutcome::Ignored) => Flow::Continue,
            Err(e) => {
                debug!(run_id = %self.run_id, error = %e, "live event not applied");
                Flow::Stop
            }
        }
    }

    fn finish(&self, snapshot: &Snapshot) {
        let (live, simulated) = snapshot.origin_counts();
        info!(
            run_id = %self.run_id,
            elapsed_secs = snapshot.elapsed_seconds,
            acknowledged = snapshot.acknowledged,
            total = snapshot.total_members,
            live,
            simulated,
            "run complete"
        );
        if let Some(event) = Event::completed(snapshot) {
            self.emitter.emit(event);
        }
        self.status
            .send_replace(SessionStatus::Complete(self.run_id.clone()));
    }
}

/// What the driver loop does after one step.
enum Flow {
    Continue,
    /// Run just completed; keep ticking without the live link
    Completed,
    /// Run is gone; exit the loop
    Stop,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::LocalActivationBackend;
    use crate::config::ConfigLoader;
    use crate::engine::{Origin, Phase};
    use crate::scenarios;
    use crate::transport::ChannelHub;

    fn coordinator(name: &str) -> Coordinator {
        let config = scenarios::resolve(name, &ConfigLoader::with_defaults())
            .unwrap()
            .config;
        Coordinator::new(config)
    }

    fn session(name: &str, hub: &ChannelHub) -> CoordinationSession {
        CoordinationSession::new(
            coordinator(name),
            Arc::new(LocalActivationBackend),
            Arc::new(hub.clone()),
            Arc::new(EventEmitter::noop()),
        )
    }

    fn ack(id: &str) -> LiveEvent {
        LiveEvent::MemberAcknowledged {
            member_id: Some(id.to_string()),
            member_name: None,
            member_role: None,
            acknowledged_at: None,
            total_stakeholders: None,
        }
    }

    struct RejectingBackend;

    #[async_trait::async_trait]
    impl ActivationBackend for RejectingBackend {
        async fn start_activation(
            &self,
            _request: &ActivationRequest,
        ) -> Result<crate::engine::Activation, ActivationError> {
            Err(ActivationError::StartFailed {
                status: 500,
                message: "boom".to_string(),
            })
        }

        fn name(&self) -> &'static str {
            "rejecting"
        }
    }

    struct SilentTransport;

    #[async_trait::async_trait]
    impl LiveTransport for SilentTransport {
        async fn subscribe(&self, _run_id: &RunId) -> crate::transport::Result<LiveSubscription> {
            std::future::pending().await
        }

        fn transport_type(&self) -> TransportType {
            TransportType::Http
        }
    }

    struct UnreachableTransport;

    #[async_trait::async_trait]
    impl LiveTransport for UnreachableTransport {
        async fn subscribe(&self, _run_id: &RunId) -> crate::transport::Result<LiveSubscription> {
            Err(TransportError::ConnectionFailed("refused".to_string()))
        }

        fn transport_type(&self) -> TransportType {
            TransportType::Http
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_click_completes_on_simulation_alone() {
        let hub = ChannelHub::default();
        let session = session("one-click", &hub);
        session.start().await.unwrap();

        let completed = tokio::time::timeout(
            Duration::from_secs(14),
            session.wait_for_completion(),
        )
        .await
        .expect("run should complete within 14s");
        assert!(completed.is_some());

        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, Some(Phase::Complete));
        assert_eq!(snapshot.acknowledged, 8);
        assert_eq!(snapshot.origin_counts(), (0, 8));
        assert!(snapshot.task_execution_set.contains(&"contain".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_events_complete_run() {
        let hub = ChannelHub::default();
        let session = session("one-click", &hub);
        let run = session.start().await.unwrap().run_id;

        for id in ["ic", "ciso", "cio", "gc", "comms", "soc", "infra", "hr"] {
            assert_eq!(hub.publish(&run, ack(id)), 1);
        }
        // Late duplicate is harmless.
        hub.publish(&run, ack("ic"));

        tokio::time::sleep(Duration::from_secs(1)).await;
        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, Some(Phase::Completing));
        assert_eq!(session.status(), SessionStatus::Running(run.clone()));

        // Full roster still waits for the target window.
        let completed = tokio::time::timeout(Duration::from_secs(13), session.wait_for_completion())
            .await
            .unwrap();
        assert_eq!(completed, Some(run.clone()));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.acknowledged, 8);
        assert!(snapshot.elapsed_seconds >= 12);
        assert!(snapshot.ledger_snapshot.iter().all(|e| e.origin == Origin::Live));
        // Driver stopped and dropped its subscription.
        tokio::task::yield_now().await;
        assert_eq!(hub.subscriber_count(&run), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_complete_event() {
        let hub = ChannelHub::default();
        let session = session("live-activation", &hub);
        let run = session.start().await.unwrap().run_id;
        hub.publish(&run, LiveEvent::RunComplete {
            total_stakeholders: Some(30),
        });
        let completed = tokio::time::timeout(Duration::from_secs(1), session.wait_for_completion())
            .await
            .unwrap();
        assert_eq!(completed, Some(run));
        assert_eq!(session.snapshot().phase, Some(Phase::Complete));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_unsubscribes_and_discards() {
        let hub = ChannelHub::default();
        let session = session("live-activation", &hub);
        let run = session.start().await.unwrap().run_id;
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(hub.subscriber_count(&run), 1);
        assert!(session.snapshot().pending_simulated > 0);

        let report = session.reset().await.unwrap();
        assert_eq!(report.run_id, run);
        assert!(report.cancelled_timers > 0);
        assert_eq!(hub.subscriber_count(&run), 0);
        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(!session.snapshot().is_active());
        assert!(session.reset().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_keeps_new_ledger_clean() {
        let hub = ChannelHub::default();
        let session = session("live-activation", &hub);
        let first = session.start().await.unwrap().run_id;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(session.snapshot().acknowledged > 0);

        let second = session.start().await.unwrap().run_id;
        assert_ne!(first, second);
        assert_eq!(hub.subscriber_count(&first), 0);

        // A full poll interval of the new run passes without a single record.
        tokio::time::sleep(Duration::from_secs(10)).await;
        let snapshot = session.snapshot();
        assert_eq!(snapshot.run_id, Some(second));
        assert_eq!(snapshot.acknowledged, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_failure_leaves_session_idle() {
        let session = CoordinationSession::new(
            coordinator("one-click"),
            Arc::new(RejectingBackend),
            Arc::new(ChannelHub::default()),
            Arc::new(EventEmitter::noop()),
        );
        let err = session.start().await.unwrap_err();
        assert!(err.to_string().contains("failed to start activation"));
        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(session.active_run().is_none());
        assert!(session.wait_for_completion().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_transport_falls_back_to_simulation() {
        let session = CoordinationSession::new(
            coordinator("one-click"),
            Arc::new(LocalActivationBackend),
            Arc::new(UnreachableTransport),
            Arc::new(EventEmitter::noop()),
        );
        session.start().await.unwrap();
        let completed =
            tokio::time::timeout(Duration::from_secs(14), session.wait_for_completion())
                .await
                .unwrap();
        assert!(completed.is_some());
        assert_eq!(session.snapshot().acknowledged, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_closed_mid_run() {
        let hub = ChannelHub::default();
        let session = session("one-click", &hub);
        let run = session.start().await.unwrap().run_id;
        tokio::time::sleep(Duration::from_millis(500)).await;
        hub.close(&run);

        let completed =
            tokio::time::timeout(Duration::from_secs(14), session.wait_for_completion())
                .await
                .unwrap();
        assert_eq!(completed, Some(run));
        assert_eq!(session.snapshot().origin_counts(), (0, 8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_transport_does_not_block_the_run() {
        let session = CoordinationSession::new(
            coordinator("one-click"),
            Arc::new(LocalActivationBackend),
            Arc::new(SilentTransport),
            Arc::new(EventEmitter::noop()),
        );
        tokio::time::timeout(SUBSCRIBE_WAIT + Duration::from_secs(1), session.start())
            .await
            .expect("start must not wait on the transport")
            .unwrap();

        let completed =
            tokio::time::timeout(Duration::from_secs(14), session.wait_for_completion())
                .await
                .expect("simulation carries the run");
        assert!(completed.is_some());
        assert_eq!(session.snapshot().origin_counts(), (0, 8));

        tokio::time::timeout(Duration::from_secs(1), session.reset())
            .await
            .expect("reset must not wait on the transport")
            .unwrap();
        assert_eq!(session.status(), SessionStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeline_advances_after_completion() {
        let yaml = r"
scenario:
  name: debrief
  target_completion: 10s
roster:
  - { id: a, name: Ada, role: Lead }
  - { id: b, name: Bo, role: Comms }
  - { id: c, name: Cy, role: Legal }
  - { id: d, name: Di, role: Ops }
tasks:
  - { id: open, title: Open bridge, offset_seconds: 0 }
  - { id: debrief, title: Debrief, offset_seconds: 30 }
simulator:
  cold_start_grace: 1s
  poll_interval: 2s
clock:
  tick_interval: 250ms
";
        let config = ConfigLoader::with_defaults()
            .load_str("debrief", yaml)
            .unwrap()
            .config;
        let hub = ChannelHub::default();
        let session = CoordinationSession::new(
            Coordinator::with_seed(config, 7),
            Arc::new(LocalActivationBackend),
            Arc::new(hub.clone()),
            Arc::new(EventEmitter::noop()),
        );
        let run = session.start().await.unwrap().run_id;

        let completed =
            tokio::time::timeout(Duration::from_secs(15), session.wait_for_completion())
                .await
                .unwrap();
        assert_eq!(completed, Some(run.clone()));
        let at_completion = session.snapshot();
        assert!(!at_completion.task_execution_set.contains(&"debrief".to_string()));

        tokio::time::sleep(Duration::from_secs(25)).await;
        let later = session.snapshot();
        assert_eq!(later.phase, Some(Phase::Complete));
        assert!(later.elapsed_seconds >= 30);
        assert!(later.task_execution_set.contains(&"debrief".to_string()));
        assert_eq!(later.acknowledged, at_completion.acknowledged);
        assert_eq!(session.status(), SessionStatus::Complete(run.clone()));
        assert_eq!(hub.subscriber_count(&run), 0);
    }
}
