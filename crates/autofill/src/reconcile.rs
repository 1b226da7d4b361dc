//! Reconciliation / resume engine.
//!
//! When an autofill run is triggered the engine takes a snapshot of what the
//! form is supposed to end up holding. After manual edits (and when a batch
//! drains) the snapshot is diffed against the live map: keys that had a
//! meaningful value in the snapshot but are now empty or missing, and whose
//! question is inside the revealed range, are queued again.
//!
//! Overwriting an autofilled value with another answer is left alone; only
//! values that were blanked come back.

use tracing::debug;

use crate::config::EngineConfig;
use crate::effects::{Effect, TimerKind};
use crate::queue::QueueEntry;
use crate::schema::Schema;
use crate::values::FieldValueMap;

/// Entries for every key of `original` that lost its value in `current`.
///
/// Only keys owned by a question with index `< visible_bound` are returned.
pub fn find_missing(
    schema: &Schema,
    original: &FieldValueMap,
    current: &FieldValueMap,
    visible_bound: usize,
    placeholder: &str,
) -> Vec<QueueEntry> {
    original
        .iter()
        .filter(|(_, value)| value.is_meaningful(placeholder))
        .filter(|(key, _)| !current.is_meaningful(key, placeholder))
        .filter_map(|(key, value)| {
            let question = schema.owner_of(key)?;
            (question < visible_bound).then(|| QueueEntry::new(key.clone(), value.clone(), question))
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    original: Option<FieldValueMap>,
    check_seq: u64,
    rounds: u32,
}

impl Reconciler {
    /// Replace the snapshot (new autofill trigger).
    pub fn take_snapshot(&mut self, snapshot: FieldValueMap) {
        debug!(keys = snapshot.len(), "autofill snapshot taken");
        self.original = Some(snapshot);
        self.rounds = 0;
    }

    pub fn has_snapshot(&self) -> bool {
        self.original.is_some()
    }

    /// Resumption complete; nothing left to recover.
    pub fn clear(&mut self) {
        if self.original.take().is_some() {
            debug!("autofill snapshot cleared");
        }
        self.rounds = 0;
    }

    /// Diff the snapshot against `current`. Empty when there is no snapshot.
    pub fn missing(
        &self,
        schema: &Schema,
        current: &FieldValueMap,
        visible_bound: usize,
        placeholder: &str,
    ) -> Vec<QueueEntry> {
        match &self.original {
            Some(original) => find_missing(schema, original, current, visible_bound, placeholder),
            None => Vec::new(),
        }
    }

    /// Debounced check after a manual write. Supersedes earlier checks.
    pub fn schedule_check(&mut self, config: &EngineConfig, epoch: u64) -> Effect {
        self.check_seq += 1;
        self.rounds = 0;
        Effect::schedule(
            config.resume_debounce(),
            epoch,
            TimerKind::ResumeCheck {
                seq: self.check_seq,
            },
        )
    }

    /// True for the most recently scheduled check only.
    pub fn is_latest_check(&self, seq: u64) -> bool {
        seq == self.check_seq
    }

    /// Count one drain-triggered resume round. False once the cap is reached.
    pub fn take_round(&mut self, max_rounds: u32) -> bool {
        if self.rounds >= max_rounds {
            return false;
        }
        self.rounds += 1;
        true
    }
}
