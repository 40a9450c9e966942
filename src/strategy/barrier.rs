use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::population::Generation;

#[derive(Debug, Default)]
struct BarrierState {
    start: bool,
    kill: bool,
    finished: usize,
    participants: usize,
    /// Incremented by every `start`.
    round: u64,
    /// Last round every participant arrived for.
    completed: u64,
    generation: Option<Arc<Generation>>,
}

/// Two-phase rendezvous between the orchestrating thread and its workers.
///
/// The orchestrator publishes the frozen generation with [`start`], mates its
/// own range and then [`arrive`]s like any worker. The last participant to
/// arrive closes the round and releases everybody waiting on it, so the
/// orchestrator only reads results once every range is complete. Rounds are
/// numbered, which keeps a fast worker from slipping into the next generation
/// or missing a wakeup.
///
/// [`start`]: GenerationBarrier::start
/// [`arrive`]: GenerationBarrier::arrive
#[derive(Debug, Default)]
pub(crate) struct GenerationBarrier {
    state: Mutex<BarrierState>,
    start_signal: Condvar,
    finished_signal: Condvar,
}

impl GenerationBarrier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Sets the number of threads taking part in each round, orchestrator included.
    pub(crate) fn set_participants(&self, participants: usize) {
        self.lock().participants = participants;
    }

    /// Opens a new round over `generation` and wakes every worker.
    pub(crate) fn start(&self, generation: Arc<Generation>) {
        let mut state = self.lock();
        state.start = true;
        state.round += 1;
        state.generation = Some(generation);
        self.start_signal.notify_all();
    }

    /// Blocks a worker until a round newer than `last_round` opens.
    ///
    /// Returns `None` once the pool has been killed; the kill flag is checked
    /// after every wakeup.
    pub(crate) fn wait_start(&self, last_round: &mut u64) -> Option<Arc<Generation>> {
        let mut state = self.lock();
        loop {
            if state.kill {
                return None;
            }
            if state.start && state.round != *last_round {
                *last_round = state.round;
                return state.generation.clone();
            }
            state = self
                .start_signal
                .wait(state)
                .unwrap_or_else(|poisoned| recover(poisoned, "start"));
        }
    }

    /// Marks the caller's range as finished and blocks until the round closes.
    pub(crate) fn arrive(&self) {
        let mut state = self.lock();
        let round = state.round;
        state.finished += 1;

        if state.finished >= state.participants {
            state.start = false;
            state.finished = 0;
            state.completed = round;
            state.generation = None;
            self.finished_signal.notify_all();
            return;
        }

        while state.completed < round && !state.kill {
            state = self
                .finished_signal
                .wait(state)
                .unwrap_or_else(|poisoned| recover(poisoned, "finished"));
        }
    }

    /// Stops the pool: every waiting or future `wait_start` returns `None`.
    pub(crate) fn kill(&self) {
        let mut state = self.lock();
        state.kill = true;
        self.start_signal.notify_all();
        self.finished_signal.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, BarrierState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| recover(poisoned, "state"))
    }
}

fn recover<T>(poisoned: PoisonError<T>, what: &str) -> T {
    warn!(what, "Generation barrier lock was poisoned, continuing with its state");
    poisoned.into_inner()
}
