use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

#[derive(Debug, Default)]
struct ThrottleState {
    last_run: Option<Instant>,
    /// Bumped by every call; only the latest waiting call gets to run.
    ticket: u64,
}

/// Runs a call at once when the previous run is at least `interval` old.
/// Otherwise the call waits until `interval` after that run, and only the
/// most recent of the waiting calls runs. The others are told to give up.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    state: Mutex<ThrottleState>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Mutex::new(ThrottleState::default()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for this caller's turn. Returns `false` when a later call took
    /// the turn instead.
    pub async fn ready(&self) -> bool {
        let (ticket, at) = {
            let mut state = self.state.lock();
            state.ticket += 1;
            let now = Instant::now();
            match state.last_run.map(|last_run| last_run + self.interval) {
                Some(at) if at > now => (state.ticket, at),
                _ => {
                    state.last_run = Some(now);
                    return true;
                }
            }
        };

        sleep_until(at).await;

        let mut state = self.state.lock();
        if state.ticket != ticket {
            return false;
        }
        state.last_run = Some(Instant::now());
        true
    }
}
