//! Visibility / focus controller.
//!
//! Tracks the reveal boundary (`current_field_index`) and, in assisted
//! autofill mode, asks for a focus pulse on the first unanswered question.
//! Pulses themselves are owned by [`PulseTracker`]: exactly one question is
//! pulsed at a time and every pulse expires after the configured dwell time.
//!
//! The controller never emits a focus while a batch is playing; the queue
//! processor moves the pulse itself and two focus writers would fight.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use crate::answer::first_unanswered;
use crate::config::EngineConfig;
use crate::effects::{Effect, Pulse, PulseStyle, TimerKind};
use crate::schema::Schema;
use crate::values::FieldValueMap;

/// How the step is being filled. Passed in explicitly; there is no ambient
/// session flag.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    /// Plain manual entry; no focus chasing.
    #[default]
    Manual,
    /// The user asked for bulk autofill; the engine chases the next
    /// unanswered question.
    AssistedAutofill,
}

#[derive(Debug, Clone, Default)]
pub struct VisibilityController {
    mode: FillMode,
    current_field_index: usize,
    /// Question whose focus pulse was already requested for the current
    /// boundary. Keeps repeated updates with the same values to one pulse.
    focus_target: Option<usize>,
}

impl VisibilityController {
    pub fn new(mode: FillMode) -> Self {
        Self {
            mode,
            current_field_index: 0,
            focus_target: None,
        }
    }

    pub fn mode(&self) -> FillMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: FillMode) {
        self.mode = mode;
    }

    /// Number of rendered questions: the answered prefix plus the first
    /// unanswered one.
    pub fn current_field_index(&self) -> usize {
        self.current_field_index
    }

    /// Recompute the reveal boundary for `values`.
    ///
    /// Returns a scheduled focus when assisted mode is on, no batch is
    /// playing and the first unanswered question has not been requested yet.
    pub fn update_visible_index(
        &mut self,
        schema: &Schema,
        values: &FieldValueMap,
        playing: bool,
        config: &EngineConfig,
        epoch: u64,
    ) -> Vec<Effect> {
        let u = first_unanswered(schema.questions(), values, &config.placeholder);
        self.current_field_index = u + 1;

        if self.focus_target.is_some_and(|t| t != u) {
            self.focus_target = None;
        }
        if self.mode == FillMode::Manual || playing || u >= schema.len() {
            return Vec::new();
        }
        if self.focus_target == Some(u) {
            return Vec::new();
        }
        self.focus_target = Some(u);
        debug!(question = u, "scheduling focus on first unanswered question");
        vec![Effect::schedule(
            config.focus_settle(),
            epoch,
            TimerKind::FocusSettle { question: u },
        )]
    }

    /// Settle delay elapsed for `question`. Yields the pulse to show, unless a
    /// batch started meanwhile or the boundary moved on.
    pub fn settle(&self, question: usize, playing: bool) -> Option<Pulse> {
        if playing || self.mode == FillMode::Manual {
            return None;
        }
        if question + 1 != self.current_field_index {
            return None;
        }
        Some(Pulse {
            question,
            style: PulseStyle::Manual,
        })
    }

    pub fn reset(&mut self) {
        self.focus_target = None;
    }
}

/// Owner of the single active pulse.
#[derive(Debug, Clone, Default)]
pub struct PulseTracker {
    current: Option<Pulse>,
    seq: u64,
}

impl PulseTracker {
    pub fn current(&self) -> Option<Pulse> {
        self.current
    }

    /// Replace the active pulse and schedule its expiry.
    ///
    /// Returns the focus effect plus the expiry timer.
    pub fn show(&mut self, pulse: Pulse, config: &EngineConfig, epoch: u64) -> Vec<Effect> {
        self.seq += 1;
        self.current = Some(pulse);
        vec![
            Effect::Focus(pulse),
            Effect::schedule(
                config.pulse_dwell(),
                epoch,
                TimerKind::PulseExpired { seq: self.seq },
            ),
        ]
    }

    /// Expiry of pulse `seq`; ignored if a newer pulse superseded it.
    pub fn expire(&mut self, seq: u64) {
        if seq == self.seq {
            self.current = None;
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}
