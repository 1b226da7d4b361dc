//! Step engine: composes the predicate, visibility controller, rule engine,
//! queue processor, reconciler and highlight overlay for one mounted step.
//!
//! Every input mutates the engine and returns the effects a driver must carry
//! out (see [`crate::effects`]). The engine keeps two maps:
//!   * `values`: the live map the form renders from
//!   * `durable`: what may be written to the store. Manual writes land here
//!     immediately; queue writes only once their question validates.
//!
//! ```
//! use autofill::prelude::*;
//!
//! let schema = Schema::new(vec![Question::new("Insured before?").radio("prior", &["yes", "no"])]);
//! let mut engine = StepEngine::new(0, schema, RuleTable::default(), EngineConfig::default(), FillMode::Manual);
//! let effects = engine.write("prior", "yes");
//! assert!(effects.iter().any(|e| matches!(e, Effect::Persist(_))));
//! assert_eq!(engine.current_field_index(), 2);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, trace};

use crate::answer::{first_unanswered, is_answered};
use crate::config::EngineConfig;
use crate::effects::{BatchSignal, Effect, Pulse, PulseStyle, Timer, TimerKind};
use crate::highlight::HighlightOverlay;
use crate::prefill::Prefill;
use crate::queue::{QueueEntry, QueueProcessor, Verdict};
use crate::reconcile::Reconciler;
use crate::rules::{RuleTable, VisibilityOverrides};
use crate::schema::Schema;
use crate::values::{FieldValue, FieldValueMap};
use crate::visibility::{FillMode, PulseTracker, VisibilityController};

/// Who produced a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOrigin {
    Manual,
    Autofill,
}

/// Everything the presentation layer needs to render the step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Presentation {
    pub step: usize,
    pub current_field_index: usize,
    pub total: usize,
    pub values: FieldValueMap,
    pub pulse: Option<Pulse>,
    pub highlighted: BTreeSet<String>,
    pub overrides: BTreeMap<String, bool>,
    pub playing: bool,
    /// `(groups done, groups total)` of the batch being played.
    pub progress: Option<(usize, usize)>,
    pub mode: FillMode,
    pub answered: usize,
}

impl Presentation {
    /// Questions currently rendered (never more than the schema holds).
    pub fn revealed_count(&self) -> usize {
        self.current_field_index.min(self.total)
    }

    /// Questions answered under the live map.
    pub fn answered_count(&self) -> usize {
        self.answered
    }

    /// Whether question `index` is inside the reveal boundary.
    pub fn is_revealed(&self, index: usize) -> bool {
        index < self.current_field_index
    }
}

pub struct StepEngine {
    step: usize,
    schema: Arc<Schema>,
    rules: RuleTable,
    config: EngineConfig,
    values: FieldValueMap,
    durable: FieldValueMap,
    visibility: VisibilityController,
    overrides: VisibilityOverrides,
    pulse: PulseTracker,
    queue: QueueProcessor,
    reconciler: Reconciler,
    highlight: HighlightOverlay,
    epoch: u64,
}

impl StepEngine {
    pub fn new(
        step: usize,
        schema: impl Into<Arc<Schema>>,
        rules: RuleTable,
        config: EngineConfig,
        mode: FillMode,
    ) -> Self {
        Self {
            step,
            schema: schema.into(),
            rules,
            config,
            values: FieldValueMap::new(),
            durable: FieldValueMap::new(),
            visibility: VisibilityController::new(mode),
            overrides: VisibilityOverrides::default(),
            pulse: PulseTracker::default(),
            queue: QueueProcessor::default(),
            reconciler: Reconciler::default(),
            highlight: HighlightOverlay::default(),
            epoch: 0,
        }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn values(&self) -> &FieldValueMap {
        &self.values
    }

    pub fn durable(&self) -> &FieldValueMap {
        &self.durable
    }

    pub fn mode(&self) -> FillMode {
        self.visibility.mode()
    }

    pub fn current_field_index(&self) -> usize {
        self.visibility.current_field_index()
    }

    pub fn pulse(&self) -> Option<Pulse> {
        self.pulse.current()
    }

    pub fn is_playing(&self) -> bool {
        self.queue.is_playing()
    }

    pub fn highlighted(&self) -> &BTreeSet<String> {
        self.highlight.keys()
    }

    pub fn overrides(&self) -> &VisibilityOverrides {
        &self.overrides
    }

    pub fn has_snapshot(&self) -> bool {
        self.reconciler.has_snapshot()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Is question `index` answered under the live map?
    pub fn is_answered(&self, index: usize) -> bool {
        self.schema
            .get(index)
            .is_some_and(|q| is_answered(q, &self.values, &self.config.placeholder))
    }

    /// Indices of every unanswered question.
    pub fn unanswered(&self) -> Vec<usize> {
        (0..self.schema.len()).filter(|i| !self.is_answered(*i)).collect()
    }

    pub fn presentation(&self) -> Presentation {
        Presentation {
            step: self.step,
            current_field_index: self.current_field_index(),
            total: self.schema.len(),
            values: self.values.clone(),
            pulse: self.pulse.current(),
            highlighted: self.highlight.keys().clone(),
            overrides: self.overrides.as_map().clone(),
            playing: self.queue.is_playing(),
            progress: self.queue.progress(),
            mode: self.mode(),
            answered: self.schema.len() - self.unanswered().len(),
        }
    }

    /// Mount-time seeding from the durable store.
    pub fn seed(&mut self, stored: FieldValueMap) -> Vec<Effect> {
        for (key, value) in stored.iter() {
            let patch = self.rules.apply(key, value);
            self.overrides.merge(patch);
        }
        self.durable = stored.clone();
        self.values = stored;
        self.refresh_visibility()
    }

    /// A manual write from the user.
    pub fn write(&mut self, key: &str, value: impl Into<FieldValue>) -> Vec<Effect> {
        self.apply_write(key, value.into(), WriteOrigin::Manual)
    }

    /// Toggle one label of a checkbox group stored as a label list.
    pub fn toggle_checkbox_label(&mut self, name: &str, label: &str, checked: bool) -> Vec<Effect> {
        let mut scratch = self.values.clone();
        scratch.toggle_checkbox_label(name, label, checked);
        let value = scratch
            .get(name)
            .cloned()
            .unwrap_or(FieldValue::List(Vec::new()));
        self.apply_write(name, value, WriteOrigin::Manual)
    }

    /// Autofill triggered by the user with an extraction result.
    ///
    /// Values the user already holds win over extracted ones; the snapshot is
    /// the live map overlaid with the remaining extracted values.
    pub fn begin_autofill(&mut self, prefill: Prefill) -> Vec<Effect> {
        self.visibility.set_mode(FillMode::AssistedAutofill);
        let mut snapshot = self.values.clone();
        let taken: BTreeSet<String> = snapshot
            .merge_missing(&prefill.seed, &self.config.placeholder)
            .into_iter()
            .collect();
        self.reconciler.take_snapshot(snapshot);
        let entries: Vec<QueueEntry> = prefill
            .entries
            .into_iter()
            .filter(|e| taken.contains(&e.key))
            .collect();
        info!(step = self.step, entries = entries.len(), "autofill requested");
        self.start_batch(entries)
    }

    /// Start playing `entries`. Replaces any batch in flight.
    pub fn start_batch(&mut self, entries: Vec<QueueEntry>) -> Vec<Effect> {
        let len = self.schema.len();
        let entries: Vec<QueueEntry> = entries
            .into_iter()
            .filter(|e| {
                let known = e.question_index < len;
                if !known {
                    debug!(key = %e.key, question = e.question_index, "entry outside schema dropped");
                }
                known
            })
            .collect();
        let batch = self.queue.start(entries);
        if self.queue.is_playing() {
            vec![Effect::schedule(
                self.config.batch_start(),
                self.epoch,
                TimerKind::ApplyGroup { batch },
            )]
        } else {
            vec![Effect::schedule(
                self.config.drain(),
                self.epoch,
                TimerKind::Drain { batch },
            )]
        }
    }

    /// A timer scheduled by an earlier effect came due.
    pub fn fire(&mut self, timer: Timer) -> Vec<Effect> {
        if timer.epoch != self.epoch {
            trace!(%timer.kind, "stale timer dropped");
            return Vec::new();
        }
        match timer.kind {
            TimerKind::FocusSettle { question } => {
                match self.visibility.settle(question, self.queue.is_playing()) {
                    Some(pulse) => self.pulse.show(pulse, &self.config, self.epoch),
                    None => Vec::new(),
                }
            }
            TimerKind::PulseExpired { seq } => {
                self.pulse.expire(seq);
                Vec::new()
            }
            TimerKind::ApplyGroup { batch } => self.apply_group(batch),
            TimerKind::ValidateGroup { batch } => self.validate_group(batch),
            TimerKind::Drain { batch } => self.drain(batch),
            TimerKind::ResumeCheck { seq } => self.resume_check(seq),
        }
    }

    /// Cancel everything in flight: queue, pulse, snapshot, highlight.
    /// Timers already scheduled become stale. Values are kept.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.queue.cancel();
        self.pulse.clear();
        self.reconciler.clear();
        self.highlight.clear();
        self.visibility.reset();
        debug!(step = self.step, epoch = self.epoch, "engine reset");
    }

    fn apply_write(&mut self, key: &str, value: FieldValue, origin: WriteOrigin) -> Vec<Effect> {
        trace!(key, %value, ?origin, "field write");
        let patch = self.rules.apply(key, &value);
        self.overrides.merge(patch);
        self.values.set(key, value.clone());
        self.highlight.clear();

        let mut effects = Vec::new();
        if origin == WriteOrigin::Manual {
            self.durable.set(key, value);
            effects.push(Effect::Persist(self.durable.clone()));
        }
        effects.extend(self.refresh_visibility());
        if origin == WriteOrigin::Manual && self.reconciler.has_snapshot() {
            effects.push(self.reconciler.schedule_check(&self.config, self.epoch));
        }
        effects
    }

    fn refresh_visibility(&mut self) -> Vec<Effect> {
        self.visibility.update_visible_index(
            &self.schema,
            &self.values,
            self.queue.is_playing(),
            &self.config,
            self.epoch,
        )
    }

    fn apply_group(&mut self, batch: u64) -> Vec<Effect> {
        if !self.queue.is_current(batch) {
            return Vec::new();
        }
        let Some(group) = self.queue.current_group().cloned() else {
            self.queue.finish();
            self.pulse.clear();
            return vec![Effect::schedule(
                self.config.drain(),
                self.epoch,
                TimerKind::Drain { batch },
            )];
        };
        debug!(
            question = group.question,
            entries = group.entries.len(),
            attempt = self.queue.retries(),
            "applying autofill group"
        );
        let mut effects = self.pulse.show(
            Pulse {
                question: group.question,
                style: PulseStyle::Autofill,
            },
            &self.config,
            self.epoch,
        );
        for entry in group.entries {
            effects.extend(self.apply_write(&entry.key, entry.value, WriteOrigin::Autofill));
        }
        effects.push(Effect::schedule(
            self.config.apply_settle(),
            self.epoch,
            TimerKind::ValidateGroup { batch },
        ));
        effects
    }

    fn validate_group(&mut self, batch: u64) -> Vec<Effect> {
        if !self.queue.is_current(batch) {
            return Vec::new();
        }
        let Some(group) = self.queue.current_group().cloned() else {
            return Vec::new();
        };
        let answered = self.is_answered(group.question);
        let mut effects = Vec::new();
        match self.queue.judge(answered, self.config.max_retries) {
            Verdict::Accepted => {
                // Live value: a manual overwrite since apply wins over the entry.
                for entry in &group.entries {
                    if let Some(value) = self.values.get(&entry.key) {
                        self.durable.set(&entry.key, value.clone());
                    }
                }
                effects.push(Effect::Persist(self.durable.clone()));
                self.pulse.clear();
                effects.push(Effect::schedule(
                    self.config.advance(),
                    self.epoch,
                    TimerKind::ApplyGroup { batch },
                ));
            }
            Verdict::Retry(_) => effects.push(Effect::schedule(
                self.config.retry(),
                self.epoch,
                TimerKind::ApplyGroup { batch },
            )),
            Verdict::Skipped => effects.push(Effect::schedule(
                self.config.advance(),
                self.epoch,
                TimerKind::ApplyGroup { batch },
            )),
        }
        effects
    }

    fn drain(&mut self, batch: u64) -> Vec<Effect> {
        if self.queue.is_playing() || self.queue.batch() != batch {
            return Vec::new();
        }
        let bound = self.current_field_index();
        let missing = self
            .reconciler
            .missing(&self.schema, &self.values, bound, &self.config.placeholder);
        if !missing.is_empty() && self.reconciler.take_round(self.config.max_resume_rounds) {
            info!(step = self.step, missing = missing.len(), "resuming autofill for blanked fields");
            return self.start_batch(missing);
        }

        self.highlight
            .recompute(&self.schema, &self.values, &self.config.placeholder);
        let next = first_unanswered(self.schema.questions(), &self.values, &self.config.placeholder);
        if next < self.schema.len() {
            debug!(question = next, "autofill pass done; prompting manual input");
            return self.pulse.show(
                Pulse {
                    question: next,
                    style: PulseStyle::Manual,
                },
                &self.config,
                self.epoch,
            );
        }
        info!(step = self.step, "autofill pass complete");
        self.reconciler.clear();
        vec![Effect::BatchComplete(BatchSignal {
            step: self.step,
            focus_next: self.mode() == FillMode::AssistedAutofill,
        })]
    }

    fn resume_check(&mut self, seq: u64) -> Vec<Effect> {
        if !self.reconciler.is_latest_check(seq) || self.queue.is_playing() {
            return Vec::new();
        }
        if !self.reconciler.has_snapshot() {
            return Vec::new();
        }
        let bound = self.current_field_index();
        let missing = self
            .reconciler
            .missing(&self.schema, &self.values, bound, &self.config.placeholder);
        if missing.is_empty() {
            debug!(step = self.step, "nothing to resume");
            self.reconciler.clear();
            return Vec::new();
        }
        info!(step = self.step, missing = missing.len(), "resuming autofill after manual edit");
        self.start_batch(missing)
    }
}
