//! Momentum driver.
//!
//! After a gesture ends with residual velocity, a background task applies
//! fixed-interval friction ticks until the navigator settles. Each tick
//! carries the [`MomentumToken`] issued at release, so cancelling, starting a
//! new gesture or resetting the session makes the task's remaining ticks
//! inert and the task exits.

use history_core::{MomentumToken, TickOutcome};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::session::DesignSession;

/// Handle to a running momentum task.
#[derive(Debug)]
pub struct MomentumHandle {
    handle: JoinHandle<TickOutcome>,
    token: MomentumToken,
}

impl MomentumHandle {
    /// The token this task ticks with.
    #[must_use]
    pub const fn token(&self) -> MomentumToken {
        self.token
    }

    /// Whether the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to exit and return its final tick outcome.
    ///
    /// An aborted task reports [`TickOutcome::Stale`].
    pub async fn join(self) -> TickOutcome {
        self.handle.await.unwrap_or(TickOutcome::Stale)
    }

    /// Stop the task without touching the navigator.
    pub fn abort(self) {
        self.handle.abort();
    }
}

/// Spawn a task that ticks `token` on the session's tick interval.
///
/// Must be called from within a tokio runtime.
#[must_use]
pub fn spawn_momentum(session: DesignSession, token: MomentumToken) -> MomentumHandle {
    let period = session.tick_interval();
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Don't fire immediately on start
        ticker.tick().await;

        let mut ticks: u32 = 0;
        loop {
            ticker.tick().await;
            ticks += 1;
            match session.tick(token) {
                TickOutcome::Continue { .. } => {}
                outcome => {
                    tracing::debug!(ticks, ?outcome, "Momentum finished");
                    return outcome;
                }
            }
        }
    });
    MomentumHandle { handle, token }
}

/// End the session's gesture and start momentum if any velocity remains.
#[must_use]
pub fn release_gesture(session: &DesignSession) -> Option<MomentumHandle> {
    let token = session.on_gesture_end()?;
    Some(spawn_momentum(session.clone(), token))
}
