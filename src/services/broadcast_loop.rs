//! Self-correcting `serverstate` broadcaster.
//!
//! The loop owns the only copy of the last published [`Snapshot`]. A ticker task
//! posts [`SessionCommand::Tick`] into the session actor at a fixed period; the
//! actor builds a fresh snapshot and hands it to [`BroadcastLoop::publish`], which
//! only touches the network when the snapshot differs by value.

use std::time::Duration;

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, sleep},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    dto::{snapshot::Snapshot, ws::OutboundMessage},
    error::TransportError,
    services::session_service::SessionCommand,
    state::hub::Transport,
};

/// Drift-compensating schedule anchored to an advancing ideal target.
///
/// `delay = max(0, period - (now - target))`, then the target moves to
/// `now + delay`. While ticks keep up the target advances by exactly one period;
/// after an overrun longer than a period it resynchronises instead of bursting.
#[derive(Debug, Clone)]
pub struct DriftSchedule {
    period: Duration,
    target: Instant,
}

impl DriftSchedule {
    /// Start a schedule whose first target is `start`.
    pub fn new(period: Duration, start: Instant) -> Self {
        Self {
            period,
            target: start,
        }
    }

    /// Delay until the next tick, advancing the target.
    pub fn next_delay(&mut self, now: Instant) -> Duration {
        let late_by = now.saturating_duration_since(self.target);
        let delay = self.period.saturating_sub(late_by);
        self.target = now + delay;
        delay
    }

    /// Instant the next tick is aimed at.
    pub fn target(&self) -> Instant {
        self.target
    }
}

/// Result of handing a snapshot to the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Same as the last published snapshot; nothing sent.
    Unchanged,
    /// Broadcast to everybody and retained.
    Broadcast,
    /// Broadcast reached only some peers. The snapshot is still retained:
    /// delivery is never retried, so unchanged state stays quiet.
    Partial,
    /// Nothing could be sent (the snapshot failed to encode); the previous
    /// snapshot is kept and the next tick tries again.
    Failed,
}

struct Ticker {
    generation: u64,
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Start/stop logic plus change detection for the `serverstate` broadcast.
pub struct BroadcastLoop {
    period: Duration,
    ticks: mpsc::UnboundedSender<SessionCommand>,
    ticker: Option<Ticker>,
    generation: u64,
    previous: Option<Snapshot>,
}

impl BroadcastLoop {
    /// Build an idle loop that will post ticks to `ticks` once started.
    pub fn new(period: Duration, ticks: mpsc::UnboundedSender<SessionCommand>) -> Self {
        Self {
            period,
            ticks,
            ticker: None,
            generation: 0,
            previous: None,
        }
    }

    /// Configured tick period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether a ticker is currently scheduled.
    pub fn is_scheduled(&self) -> bool {
        self.ticker.is_some()
    }

    /// Start when somebody is connected, stop when nobody is. Idempotent.
    pub fn check(&mut self, participant_count: usize) {
        match (participant_count > 0, self.is_scheduled()) {
            (true, false) => self.start(),
            (false, true) => self.stop(),
            _ => {}
        }
    }

    /// Whether a tick stamped with `generation` comes from the live ticker.
    pub fn is_live(&self, generation: u64) -> bool {
        self.ticker
            .as_ref()
            .is_some_and(|ticker| ticker.generation == generation)
    }

    /// Last snapshot that was successfully broadcast.
    pub fn previous(&self) -> Option<&Snapshot> {
        self.previous.as_ref()
    }

    /// Broadcast `snapshot` if it differs from the retained one.
    pub fn publish<T: Transport + ?Sized>(
        &mut self,
        snapshot: Snapshot,
        transport: &T,
    ) -> TickOutcome {
        if self.previous.as_ref() == Some(&snapshot) {
            trace!("serverstate unchanged; skipping broadcast");
            return TickOutcome::Unchanged;
        }

        let message = OutboundMessage::ServerState(snapshot);
        let outcome = match transport.broadcast(&message) {
            Ok(()) => {
                debug!("serverstate changed; broadcast sent");
                TickOutcome::Broadcast
            }
            Err(err @ TransportError::Serialization(_)) => {
                warn!(error = %err, "serverstate broadcast failed; will resend next tick");
                return TickOutcome::Failed;
            }
            Err(err) => {
                warn!(error = %err, "serverstate broadcast partially delivered");
                TickOutcome::Partial
            }
        };

        if let OutboundMessage::ServerState(snapshot) = message {
            self.previous = Some(snapshot);
        }
        outcome
    }

    fn start(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let token = CancellationToken::new();
        let task = spawn_ticker(self.period, generation, self.ticks.clone(), token.clone());

        info!(generation, period_ms = self.period.as_millis() as u64, "broadcast loop started");
        self.ticker = Some(Ticker {
            generation,
            token,
            task,
        });
    }

    fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.token.cancel();
            info!(generation = ticker.generation, "broadcast loop stopped");
        }
    }
}

impl Drop for BroadcastLoop {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.token.cancel();
            ticker.task.abort();
        }
    }
}

fn spawn_ticker(
    period: Duration,
    generation: u64,
    ticks: mpsc::UnboundedSender<SessionCommand>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut schedule = DriftSchedule::new(period, Instant::now());

        loop {
            let delay = schedule.next_delay(Instant::now());
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = sleep(delay) => {}
            }

            if ticks.send(SessionCommand::Tick { generation }).is_err() {
                // session actor is gone
                break;
            }
        }
    })
}
