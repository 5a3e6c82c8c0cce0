//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the state of one live progress
//! feed.

use crate::config::Config;
use panchakarma_core::{Actor, TherapyWorkflow};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub workflow: TherapyWorkflow,
    pub config: Arc<Config>,
}

//=========================================================================================
// FeedState (Specific to One WebSocket Connection)
//=========================================================================================

/// The state for a single progress feed.
///
/// Every poll takes a generation number when it starts. A result is only
/// pushed if no newer poll has started in the meantime, so a slow response
/// can never overwrite a fresher one.
pub struct FeedState {
    pub actor: Actor,
    pub patient_id: Option<Uuid>,
    pub paused: bool,
    /// Cancels the polling loop on pause or disconnect.
    pub cancellation_token: CancellationToken,
    generation: u64,
}

impl FeedState {
    pub fn new(actor: Actor, patient_id: Option<Uuid>) -> Self {
        Self {
            actor,
            patient_id,
            paused: false,
            cancellation_token: CancellationToken::new(),
            generation: 0,
        }
    }

    /// Starts a new poll, superseding any poll still in flight.
    pub fn begin_poll(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Stops the polling loop and supersedes any poll still in flight, so
    /// nothing started before the pause reaches the client after it.
    pub fn pause(&mut self) {
        self.cancellation_token.cancel();
        self.paused = true;
        self.begin_poll();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_poll_supersedes_older_one() {
        let mut feed = FeedState::new(Actor::patient(Uuid::new_v4()), None);
        let first = feed.begin_poll();
        let second = feed.begin_poll();
        assert!(second > first);
        assert!(!feed.is_current(first));
        assert!(feed.is_current(second));
    }

    #[test]
    fn pause_cancels_polling_and_supersedes_in_flight_poll() {
        let mut feed = FeedState::new(Actor::patient(Uuid::new_v4()), None);
        let in_flight = feed.begin_poll();
        feed.pause();
        assert!(feed.paused);
        assert!(feed.cancellation_token.is_cancelled());
        assert!(!feed.is_current(in_flight));
    }
}
