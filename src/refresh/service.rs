//! The refresh loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::changes::ChangePoller;
use crate::metadata::AuditLogId;
use crate::observability::{log_event, log_event_with_fields, Event, MetricsRegistry};
use crate::routes::{ApplySummary, RouteManager};

use super::errors::RefreshResult;

/// What one successful tick saw and did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TickOutcome {
    /// Watermark committed at the end of the tick.
    pub watermark: AuditLogId,
    /// Audit events consumed by the poll.
    pub events_seen: usize,
    /// Route-table changes the batch produced.
    pub summary: ApplySummary,
}

/// Periodic poll-and-apply driver.
///
/// The poller lives behind a mutex; `tick` holds it across the whole
/// poll / apply / commit sequence, so two ticks can never interleave
/// no matter how they are triggered. The async loop in [`Refresher::run`]
/// additionally awaits each tick before sleeping again, so a slow
/// apply stretches the cycle instead of stacking up.
pub struct Refresher {
    poller: Mutex<ChangePoller>,
    manager: Arc<RouteManager>,
    interval: Duration,
    metrics: Option<Arc<MetricsRegistry>>,
    shutdown: broadcast::Sender<()>,
}

impl Refresher {
    pub fn new(poller: ChangePoller, manager: Arc<RouteManager>, interval: Duration) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            poller: Mutex::new(poller),
            manager,
            interval,
            metrics: None,
            shutdown,
        }
    }

    /// Count ticks and failures in `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Watermark the poller will resume from.
    pub fn watermark(&self) -> AuditLogId {
        self.poller
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .watermark()
    }

    /// Runs one refresh cycle: poll, apply, commit.
    ///
    /// On error nothing is committed; the same audit window is read
    /// again next time. Callable directly (tests, admin triggers) or
    /// from the loop in [`Refresher::run`].
    pub fn tick(&self) -> RefreshResult<TickOutcome> {
        let mut poller = self.poller.lock().unwrap_or_else(|p| p.into_inner());
        log_event(Event::RefreshTickBegin);

        let outcome = self.cycle(&mut poller);
        match &outcome {
            Ok(tick) => {
                let created = tick.summary.created.to_string();
                let events = tick.events_seen.to_string();
                let removed = tick.summary.removed.to_string();
                let updated = tick.summary.updated.to_string();
                let watermark = tick.watermark.to_string();
                log_event_with_fields(
                    Event::RefreshTickComplete,
                    &[
                        ("created", created.as_str()),
                        ("events", events.as_str()),
                        ("removed", removed.as_str()),
                        ("updated", updated.as_str()),
                        ("watermark", watermark.as_str()),
                    ],
                );
                if let Some(metrics) = &self.metrics {
                    metrics.increment_refresh_ticks();
                }
            }
            Err(err) => {
                let error = err.to_string();
                log_event_with_fields(
                    Event::RefreshTickFailed,
                    &[("code", err.code()), ("error", error.as_str())],
                );
                if let Some(metrics) = &self.metrics {
                    metrics.increment_refresh_failures();
                }
            }
        }
        outcome
    }

    fn cycle(&self, poller: &mut ChangePoller) -> RefreshResult<TickOutcome> {
        let batch = poller.poll()?;
        let summary = self.manager.apply(&batch)?;
        poller.commit(batch.watermark);
        Ok(TickOutcome {
            watermark: batch.watermark,
            events_seen: batch.events_seen,
            summary,
        })
    }

    /// Runs ticks on the configured interval until [`Refresher::shutdown`].
    ///
    /// The first tick fires immediately, so the route table is filled
    /// at startup rather than one interval later. Ticks run on the
    /// blocking pool; the timer uses delay semantics, so a tick that
    /// overruns the interval pushes the schedule back instead of
    /// bursting to catch up.
    pub async fn run(self: Arc<Self>) {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown_rx = self.shutdown.subscribe();
        log_event(Event::RefresherStarted);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let me = Arc::clone(&self);
                    if tokio::task::spawn_blocking(move || me.tick()).await.is_err() {
                        log_event_with_fields(
                            Event::RefreshTickFailed,
                            &[("error", "tick task panicked")],
                        );
                    }
                }

                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }

        log_event(Event::RefresherStopped);
    }

    /// Stops a running loop. A tick already in progress finishes first.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }
}
