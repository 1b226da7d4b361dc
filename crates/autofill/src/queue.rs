//! Autofill queue processor.
//!
//! Plays a list of `(key, value, question)` assignments into the form one
//! question at a time:
//!
//! ```text
//!   Idle ──start──▶ Playing ──(groups exhausted)──▶ Idle
//!                      │
//!                      └─ per group: Apply ─▶ Validate ─▶ Advance | Retry | Skip
//! ```
//!
//! Entries sharing a `question_index` form one group and are written together,
//! so a multi-part select fills in a single visual step. Groups run in
//! ascending question order. A group that still fails validation after
//! `max_retries` re-applications is skipped; it never stalls the batch.
//!
//! This module only tracks the cursor and retry counter. The engine performs
//! the writes, owns the timers and evaluates the answer predicate against the
//! latest map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::values::FieldValue;

/// One concrete field assignment, tagged with its owning question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub key: String,
    pub value: FieldValue,
    pub question_index: usize,
}

impl QueueEntry {
    pub fn new(key: impl Into<String>, value: impl Into<FieldValue>, question_index: usize) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            question_index,
        }
    }
}

/// All entries of one question, applied atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub question: usize,
    pub entries: Vec<QueueEntry>,
}

/// Group entries by question, ascending, keeping entry order inside a group.
pub fn group_entries(entries: Vec<QueueEntry>) -> Vec<Group> {
    let mut by_question: BTreeMap<usize, Vec<QueueEntry>> = BTreeMap::new();
    for entry in entries {
        by_question.entry(entry.question_index).or_default().push(entry);
    }
    by_question
        .into_iter()
        .map(|(question, entries)| Group { question, entries })
        .collect()
}

/// Result of validating the current group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Question answered; cursor moved on.
    Accepted,
    /// Not answered yet; re-apply. Carries the retry number (1-based).
    Retry(u32),
    /// Retry budget exhausted; cursor moved on anyway.
    Skipped,
}

#[derive(Debug, Clone, Default)]
enum QueueState {
    #[default]
    Idle,
    Playing {
        groups: Vec<Group>,
        cursor: usize,
        retries: u32,
    },
}

#[derive(Debug, Clone, Default)]
pub struct QueueProcessor {
    state: QueueState,
    /// Id of the most recently started batch.
    batch: u64,
}

impl QueueProcessor {
    /// Start a new batch, replacing any batch in flight. Returns the batch id.
    ///
    /// An empty entry list still allocates a batch id (so the caller can run
    /// the drain step) but leaves the processor idle.
    pub fn start(&mut self, entries: Vec<QueueEntry>) -> u64 {
        self.batch += 1;
        let groups = group_entries(entries);
        if groups.is_empty() {
            self.state = QueueState::Idle;
            debug!(batch = self.batch, "empty batch; nothing to play");
        } else {
            info!(batch = self.batch, groups = groups.len(), "autofill batch started");
            self.state = QueueState::Playing {
                groups,
                cursor: 0,
                retries: 0,
            };
        }
        self.batch
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, QueueState::Playing { .. })
    }

    /// Id of the most recently started batch.
    pub fn batch(&self) -> u64 {
        self.batch
    }

    /// True when `batch` is the batch currently playing.
    pub fn is_current(&self, batch: u64) -> bool {
        self.is_playing() && self.batch == batch
    }

    /// Group under the cursor, or `None` once the batch is exhausted.
    pub fn current_group(&self) -> Option<&Group> {
        match &self.state {
            QueueState::Playing { groups, cursor, .. } => groups.get(*cursor),
            QueueState::Idle => None,
        }
    }

    pub fn retries(&self) -> u32 {
        match &self.state {
            QueueState::Playing { retries, .. } => *retries,
            QueueState::Idle => 0,
        }
    }

    /// `(groups done, groups total)` of the playing batch.
    pub fn progress(&self) -> Option<(usize, usize)> {
        match &self.state {
            QueueState::Playing { groups, cursor, .. } => Some((*cursor, groups.len())),
            QueueState::Idle => None,
        }
    }

    /// Record the validation outcome of the current group.
    pub fn judge(&mut self, answered: bool, max_retries: u32) -> Verdict {
        let QueueState::Playing {
            groups,
            cursor,
            retries,
        } = &mut self.state
        else {
            return Verdict::Skipped;
        };
        let question = groups.get(*cursor).map(|g| g.question);
        if answered {
            *cursor += 1;
            *retries = 0;
            Verdict::Accepted
        } else if *retries < max_retries {
            *retries += 1;
            debug!(?question, attempt = *retries, max_retries, "group not answered yet; retrying");
            Verdict::Retry(*retries)
        } else {
            warn!(?question, max_retries, "group failed validation; skipping");
            *cursor += 1;
            *retries = 0;
            Verdict::Skipped
        }
    }

    /// Leave the playing state after the last group.
    pub fn finish(&mut self) {
        if self.is_playing() {
            info!(batch = self.batch, "autofill batch exhausted");
        }
        self.state = QueueState::Idle;
    }

    /// Drop the batch in flight. Timers of the old batch become stale.
    pub fn cancel(&mut self) {
        self.state = QueueState::Idle;
        self.batch += 1;
    }
}
