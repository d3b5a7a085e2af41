// Connectivity monitor - Heartbeat probe against the live endpoint
use crate::application::backend::TelemetryBackend;
use crate::application::clock::Clock;
use crate::application::last_seen::LastSeenStore;
use crate::application::poll_task::PollHandle;
use crate::domain::connection::{ConnectionState, ConnectionStatus};
use crate::domain::tag::TelemetrySnapshot;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings {
    pub period: Duration,
    pub timeout: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
            timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Online(DateTime<Utc>),
    Offline,
    /// Another probe was still in flight; nothing was sent.
    Skipped,
}

/// Read-only view of the connection status for components that must not call the
/// backend during an outage.
#[derive(Debug, Clone)]
pub struct ConnectivityGate(watch::Receiver<ConnectionStatus>);

impl ConnectivityGate {
    pub fn new(status: watch::Receiver<ConnectionStatus>) -> Self {
        Self(status)
    }

    pub fn is_offline(&self) -> bool {
        self.0.borrow().is_offline()
    }
}

/// Clears the in-flight flag however the probe ends, including cancellation.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct ConnectivityMonitor {
    backend: Arc<dyn TelemetryBackend>,
    store: Arc<dyn LastSeenStore>,
    clock: Arc<dyn Clock>,
    settings: ProbeSettings,
    in_flight: Arc<AtomicBool>,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    snapshot_tx: Arc<watch::Sender<TelemetrySnapshot>>,
}

impl ConnectivityMonitor {
    /// `restored_last_seen` seeds the status until the first probe completes.
    pub fn new(
        backend: Arc<dyn TelemetryBackend>,
        store: Arc<dyn LastSeenStore>,
        clock: Arc<dyn Clock>,
        settings: ProbeSettings,
        restored_last_seen: Option<DateTime<Utc>>,
    ) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::connecting(restored_last_seen));
        let (snapshot_tx, _) = watch::channel(TelemetrySnapshot::default());
        Self {
            backend,
            store,
            clock,
            settings,
            in_flight: Arc::new(AtomicBool::new(false)),
            status_tx: Arc::new(status_tx),
            snapshot_tx: Arc::new(snapshot_tx),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    pub fn gate(&self) -> ConnectivityGate {
        ConnectivityGate::new(self.subscribe_status())
    }

    /// Run one heartbeat. A single failure flips the status to offline; there is no
    /// failure counting.
    pub async fn probe(&self) -> ProbeOutcome {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            tracing::debug!("Heartbeat skipped, previous probe still in flight");
            return ProbeOutcome::Skipped;
        }
        let _in_flight = InFlight(self.in_flight.clone());

        let result = tokio::time::timeout(self.settings.timeout, self.backend.fetch_live()).await;

        match result {
            Ok(Ok(snapshot)) => {
                let now = self.clock.now();
                self.snapshot_tx.send_replace(snapshot);
                let previous = self.status_tx.send_replace(ConnectionStatus::online(now));
                if previous.state != ConnectionState::Online {
                    tracing::info!("Backend reachable");
                }
                if let Err(e) = self.store.save(now).await {
                    tracing::warn!("Failed to persist last-seen instant: {}", e);
                }
                ProbeOutcome::Online(now)
            }
            Ok(Err(e)) => {
                self.mark_offline(&e.to_string());
                ProbeOutcome::Offline
            }
            Err(_) => {
                self.mark_offline("probe timed out");
                ProbeOutcome::Offline
            }
        }
    }

    fn mark_offline(&self, reason: &str) {
        let previous = self.status();
        self.status_tx.send_replace(previous.offline());
        if previous.state != ConnectionState::Offline {
            tracing::warn!("Backend unreachable: {}", reason);
        } else {
            tracing::debug!("Backend still unreachable: {}", reason);
        }
    }

    /// Start the fixed-cadence heartbeat. Each cycle spawns its probe so a slow
    /// response never delays the schedule; overlapping cycles are skipped by the
    /// in-flight flag.
    pub fn spawn(&self) -> PollHandle {
        let monitor = self.clone();
        PollHandle::spawn("connectivity", move |token| async move {
            let mut interval = tokio::time::interval(monitor.settings.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let monitor = monitor.clone();
                        let token = token.clone();
                        tokio::spawn(async move {
                            tokio::select! {
                                biased;
                                _ = token.cancelled() => {}
                                _ = monitor.probe() => {}
                            }
                        });
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::backend::BackendError;
    use crate::application::test_support::{ManualClock, MemoryLastSeenStore, ScriptedBackend, t0};
    use crate::domain::tag::{ControllerLink, TagName, TagValue};
    use chrono::Duration as ChronoDuration;

    struct Fixture {
        backend: Arc<ScriptedBackend>,
        store: Arc<MemoryLastSeenStore>,
        clock: Arc<ManualClock>,
        monitor: ConnectivityMonitor,
    }

    fn fixture(settings: ProbeSettings, restored: Option<DateTime<Utc>>) -> Fixture {
        let backend = Arc::new(ScriptedBackend::new());
        let store = Arc::new(MemoryLastSeenStore::default());
        let clock = Arc::new(ManualClock::new(t0()));
        let monitor = ConnectivityMonitor::new(
            backend.clone(),
            store.clone(),
            clock.clone(),
            settings,
            restored,
        );
        Fixture {
            backend,
            store,
            clock,
            monitor,
        }
    }

    fn snapshot_with_speed(speed: f64) -> TelemetrySnapshot {
        let mut snapshot = TelemetrySnapshot {
            link: ControllerLink::Connected,
            ..Default::default()
        };
        snapshot
            .tags
            .insert(TagName::new("A25_Speed").unwrap(), TagValue::Numeric(speed));
        snapshot
    }

    #[tokio::test]
    async fn test_starts_connecting_with_restored_last_seen() {
        let restored = t0() - ChronoDuration::hours(3);
        let f = fixture(ProbeSettings::default(), Some(restored));
        let status = f.monitor.status();
        assert_eq!(status.state, ConnectionState::Connecting);
        assert_eq!(status.last_seen, Some(restored));
        assert!(!f.monitor.gate().is_offline());
    }

    #[tokio::test]
    async fn test_online_offline_online_sequence() {
        let f = fixture(ProbeSettings::default(), None);
        let t1 = t0();
        let t3 = t0() + ChronoDuration::seconds(2);

        f.backend.push_live(Ok(snapshot_with_speed(4200.0)));
        f.backend.push_live(Err(BackendError::Timeout));
        f.backend.push_live(Ok(snapshot_with_speed(4300.0)));

        assert_eq!(f.monitor.probe().await, ProbeOutcome::Online(t1));
        assert_eq!(f.monitor.status(), ConnectionStatus::online(t1));
        assert_eq!(*f.store.saved.lock().unwrap(), Some(t1));

        f.clock.advance(ChronoDuration::seconds(1));
        assert_eq!(f.monitor.probe().await, ProbeOutcome::Offline);
        let status = f.monitor.status();
        assert_eq!(status.state, ConnectionState::Offline);
        assert_eq!(status.last_seen, Some(t1));
        assert_eq!(*f.store.saved.lock().unwrap(), Some(t1));
        assert!(f.monitor.gate().is_offline());

        f.clock.set(t3);
        assert_eq!(f.monitor.probe().await, ProbeOutcome::Online(t3));
        assert_eq!(f.monitor.status(), ConnectionStatus::online(t3));
        assert_eq!(*f.store.saved.lock().unwrap(), Some(t3));

        let speed = TagName::new("A25_Speed").unwrap();
        assert_eq!(f.monitor.snapshot().numeric(&speed), Some(4300.0));
    }

    #[tokio::test]
    async fn test_slow_probe_times_out_and_keeps_snapshot() {
        let settings = ProbeSettings {
            period: Duration::from_millis(10),
            timeout: Duration::from_millis(20),
        };
        let f = fixture(settings, None);
        f.backend.set_live_delay(Duration::from_millis(200));
        f.backend.push_live(Ok(snapshot_with_speed(1.0)));

        assert_eq!(f.monitor.probe().await, ProbeOutcome::Offline);
        assert_eq!(f.monitor.status().last_seen, None);
        assert!(f.monitor.snapshot().tags.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_counts_as_failure() {
        let f = fixture(ProbeSettings::default(), None);
        f.backend.push_live(Ok(snapshot_with_speed(1.0)));
        f.backend.push_live(Err(BackendError::Unauthorized));

        f.monitor.probe().await;
        assert_eq!(f.monitor.probe().await, ProbeOutcome::Offline);
        assert_eq!(f.monitor.status().last_seen, Some(t0()));
    }

    #[tokio::test]
    async fn test_overlapping_probe_is_skipped() {
        let f = fixture(ProbeSettings::default(), None);
        f.backend.set_live_delay(Duration::from_millis(100));
        f.backend.push_live(Ok(snapshot_with_speed(1.0)));

        let first = {
            let monitor = f.monitor.clone();
            tokio::spawn(async move { monitor.probe().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(f.monitor.probe().await, ProbeOutcome::Skipped);
        assert_eq!(first.await.unwrap(), ProbeOutcome::Online(t0()));
        assert_eq!(f.backend.live_calls.load(Ordering::SeqCst), 1);

        // The flag is released once the first probe finishes.
        f.backend.set_live_delay(Duration::from_millis(0));
        assert_eq!(f.monitor.probe().await, ProbeOutcome::Offline);
    }

    #[tokio::test]
    async fn test_spawned_heartbeat_publishes_status() {
        let settings = ProbeSettings {
            period: Duration::from_millis(10),
            timeout: Duration::from_millis(50),
        };
        let f = fixture(settings, None);
        for _ in 0..100 {
            f.backend.push_live(Ok(snapshot_with_speed(7.0)));
        }
        let mut status_rx = f.monitor.subscribe_status();

        let handle = f.monitor.spawn();
        let changed = tokio::time::timeout(Duration::from_secs(1), status_rx.changed()).await;
        assert!(changed.is_ok());
        assert_eq!(f.monitor.status().state, ConnectionState::Online);

        handle.shutdown().await;
        let calls = f.backend.live_calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(f.backend.live_calls.load(Ordering::SeqCst), calls);
    }
}
