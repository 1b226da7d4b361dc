//! Tunable pacing parameters of the engine.
//!
//! None of the delays are load-bearing for correctness; they only shape the
//! perceived rhythm of the playback. `max_retries` bounds how long a single
//! group may stall a batch.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PLACEHOLDER: &str = "please select";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Delay between a reveal-boundary change and the focus pulse.
    pub focus_settle_ms: u64,
    /// How long a pulse stays on a question before it clears by itself.
    pub pulse_dwell_ms: u64,
    /// Delay between `start_batch` and the first group.
    pub batch_start_ms: u64,
    /// Delay between writing a group and validating it.
    pub apply_settle_ms: u64,
    /// Delay before the next group after a successful or skipped group.
    pub advance_ms: u64,
    /// Delay before re-applying a group that failed validation.
    pub retry_ms: u64,
    /// Retries per group before it is skipped.
    pub max_retries: u32,
    /// Delay between queue exhaustion and the drain step.
    pub drain_ms: u64,
    /// Debounce between a manual write and the resume check.
    pub resume_debounce_ms: u64,
    /// Consecutive drain-triggered resume rounds allowed without a manual write.
    pub max_resume_rounds: u32,
    /// Select sentinel that does not count as a choice.
    pub placeholder: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            focus_settle_ms: 500,
            pulse_dwell_ms: 3000,
            batch_start_ms: 500,
            apply_settle_ms: 500,
            advance_ms: 200,
            retry_ms: 500,
            max_retries: 3,
            drain_ms: 1000,
            resume_debounce_ms: 1000,
            max_resume_rounds: 3,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn focus_settle(&self) -> Duration {
        Duration::from_millis(self.focus_settle_ms)
    }

    pub fn pulse_dwell(&self) -> Duration {
        Duration::from_millis(self.pulse_dwell_ms)
    }

    pub fn batch_start(&self) -> Duration {
        Duration::from_millis(self.batch_start_ms)
    }

    pub fn apply_settle(&self) -> Duration {
        Duration::from_millis(self.apply_settle_ms)
    }

    pub fn advance(&self) -> Duration {
        Duration::from_millis(self.advance_ms)
    }

    pub fn retry(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }

    pub fn drain(&self) -> Duration {
        Duration::from_millis(self.drain_ms)
    }

    pub fn resume_debounce(&self) -> Duration {
        Duration::from_millis(self.resume_debounce_ms)
    }
}
