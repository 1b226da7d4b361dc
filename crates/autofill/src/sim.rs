//! Deterministic driver on a virtual clock.
//!
//! Interprets engine effects without sleeping: scheduled timers go into an
//! ordered heap and fire when the clock is advanced past them. Timers due at
//! the same instant fire in scheduling order. Used by the tests and by the
//! `simulate` command.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{trace, warn};

use crate::effects::{BatchSignal, Effect, Pulse, Timer};
use crate::engine::StepEngine;
use crate::prefill::Prefill;
use crate::store::StepStore;
use crate::values::FieldValue;

/// Upper bound on timers fired by one [`Simulation::run_until_idle`].
pub const MAX_FIRED: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    at: Duration,
    seq: u64,
    timer: Timer,
}

impl Ord for Pending {
    // Reversed: BinaryHeap is a max-heap, the earliest timer must pop first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A focus pulse together with the virtual time it was shown at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusEvent {
    pub at: Duration,
    pub pulse: Pulse,
}

pub struct Simulation {
    engine: StepEngine,
    store: Arc<dyn StepStore>,
    now: Duration,
    seq: u64,
    timers: BinaryHeap<Pending>,
    focus_log: Vec<FocusEvent>,
    signals: Vec<BatchSignal>,
    persisted: usize,
}

impl Simulation {
    pub fn new(engine: StepEngine, store: Arc<dyn StepStore>) -> Self {
        Self {
            engine,
            store,
            now: Duration::ZERO,
            seq: 0,
            timers: BinaryHeap::new(),
            focus_log: Vec::new(),
            signals: Vec::new(),
            persisted: 0,
        }
    }

    pub fn engine(&self) -> &StepEngine {
        &self.engine
    }

    pub fn into_engine(self) -> StepEngine {
        self.engine
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    pub fn focus_log(&self) -> &[FocusEvent] {
        &self.focus_log
    }

    /// Question indices in the order they were pulsed.
    pub fn pulsed_questions(&self) -> Vec<usize> {
        self.focus_log.iter().map(|f| f.pulse.question).collect()
    }

    pub fn signals(&self) -> &[BatchSignal] {
        &self.signals
    }

    /// Number of durable writes issued so far.
    pub fn persisted(&self) -> usize {
        self.persisted
    }

    pub fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Schedule { after, timer } => {
                    self.seq += 1;
                    self.timers.push(Pending {
                        at: self.now + after,
                        seq: self.seq,
                        timer,
                    });
                }
                Effect::Focus(pulse) => self.focus_log.push(FocusEvent { at: self.now, pulse }),
                Effect::Persist(values) => {
                    self.persisted += 1;
                    if let Err(e) = self.store.save(self.engine.step(), &values) {
                        warn!(error = %e, "failed to persist step");
                    }
                }
                Effect::BatchComplete(signal) => self.signals.push(signal),
            }
        }
    }

    pub fn seed_from_store(&mut self) {
        match self.store.load(self.engine.step()) {
            Ok(stored) => {
                let effects = self.engine.seed(stored);
                self.apply(effects);
            }
            Err(e) => warn!(error = %e, "failed to load step"),
        }
    }

    pub fn write(&mut self, key: &str, value: impl Into<FieldValue>) {
        let effects = self.engine.write(key, value);
        self.apply(effects);
    }

    pub fn begin_autofill(&mut self, prefill: Prefill) {
        let effects = self.engine.begin_autofill(prefill);
        self.apply(effects);
    }

    pub fn reset(&mut self) {
        self.engine.reset();
    }

    /// Move the clock forward by `by`, firing every timer that comes due.
    pub fn advance(&mut self, by: Duration) {
        let until = self.now + by;
        while self.timers.peek().is_some_and(|p| p.at <= until) {
            if let Some(next) = self.timers.pop() {
                self.fire(next);
            }
        }
        self.now = until;
    }

    /// Fire timers until none are left. Returns how many fired.
    pub fn run_until_idle(&mut self) -> usize {
        let mut fired = 0;
        while let Some(next) = self.timers.pop() {
            self.fire(next);
            fired += 1;
            if fired >= MAX_FIRED {
                warn!(fired, "simulation did not settle");
                break;
            }
        }
        fired
    }

    fn fire(&mut self, pending: Pending) {
        self.now = self.now.max(pending.at);
        trace!(at = ?self.now, timer = %pending.timer.kind, "timer fired");
        let effects = self.engine.fire(pending.timer);
        self.apply(effects);
    }
}
