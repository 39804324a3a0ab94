use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    Fired,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Pending,
    Fired,
    Cancelled,
}

/// One-shot gate shared by a timer thread and whoever cancels it. The
/// first transition out of `Pending` wins; the callback runs exactly once.
struct Gate {
    state: Mutex<GateState>,
    wake: Condvar,
}

impl Gate {
    fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Pending),
            wake: Condvar::new(),
        }
    }

    fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        if *state != GateState::Pending {
            return false;
        }
        *state = GateState::Cancelled;
        self.wake.notify_all();
        true
    }

    fn wait(&self, deadline: Instant) -> TimerOutcome {
        let mut state = self.state.lock();
        loop {
            match *state {
                GateState::Cancelled => return TimerOutcome::Cancelled,
                GateState::Fired => return TimerOutcome::Fired,
                GateState::Pending => {}
            }
            if Instant::now() >= deadline {
                *state = GateState::Fired;
                return TimerOutcome::Fired;
            }
            self.wake.wait_until(&mut state, deadline);
        }
    }
}

/// At most one pending timer per provider; arming a new one cancels the old.
#[derive(Default)]
pub struct DebounceTable {
    timers: Arc<Mutex<HashMap<String, Arc<Gate>>>>,
}

impl DebounceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `on_resolve` once, on a timer thread, with `Fired` after `delay`
    /// or with `Cancelled` as soon as the timer is superseded.
    pub fn arm<F>(&self, provider_id: &str, delay: Duration, on_resolve: F)
    where
        F: FnOnce(TimerOutcome) + Send + 'static,
    {
        let gate = Arc::new(Gate::new());
        let previous = self
            .timers
            .lock()
            .insert(provider_id.to_string(), Arc::clone(&gate));
        if let Some(previous) = previous {
            if previous.cancel() {
                debug!(provider_id, "replaced pending debounce timer");
            }
        }

        let timers = Arc::clone(&self.timers);
        let provider_id = provider_id.to_string();
        let deadline = Instant::now() + delay;
        thread::spawn(move || {
            let outcome = gate.wait(deadline);
            {
                let mut timers = timers.lock();
                if timers
                    .get(&provider_id)
                    .is_some_and(|current| Arc::ptr_eq(current, &gate))
                {
                    timers.remove(&provider_id);
                }
            }
            trace!(provider_id = %provider_id, ?outcome, "debounce timer resolved");
            on_resolve(outcome);
        });
    }

    pub fn cancel(&self, provider_id: &str) -> bool {
        let gate = self.timers.lock().remove(provider_id);
        gate.is_some_and(|gate| gate.cancel())
    }

    /// Cancels every pending timer and returns how many were still pending.
    pub fn cancel_all(&self) -> usize {
        let gates: Vec<_> = self.timers.lock().drain().map(|(_, gate)| gate).collect();
        gates.iter().filter(|gate| gate.cancel()).count()
    }

    pub fn pending(&self) -> usize {
        self.timers.lock().len()
    }
}
