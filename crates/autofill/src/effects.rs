/*!
Effect and timer model of the engine.

The engine never sleeps and never touches I/O. Every input returns a
`Vec<Effect>` which a driver interprets:

- `Effect::Schedule` asks the driver to hand the `Timer` back through
  `StepEngine::fire` once `after` has elapsed
- `Effect::Focus` asks the presentation layer to scroll to and focus a question
- `Effect::Persist` carries the durable view of the step's answers
- `Effect::BatchComplete` is the completion signal for sibling steps

Timers carry the engine epoch they were scheduled in. A reset bumps the epoch,
so timers that were already in flight are dropped on arrival instead of
mutating a form that is no longer displayed.
*/

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use strum::{Display, EnumString};

use crate::values::FieldValueMap;

/// Declarative instruction emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Hand `timer` back to the engine after `after`.
    Schedule { after: Duration, timer: Timer },
    /// Scroll the question into view and focus it.
    Focus(Pulse),
    /// Write the step's durable record.
    Persist(FieldValueMap),
    /// Autofill pass finished with nothing left to fill.
    BatchComplete(BatchSignal),
}

impl Effect {
    pub fn schedule(after: Duration, epoch: u64, kind: TimerKind) -> Self {
        Effect::Schedule {
            after,
            timer: Timer { epoch, kind },
        }
    }
}

/// A scheduled callback, tagged with the epoch it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timer {
    pub epoch: u64,
    pub kind: TimerKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Settle delay elapsed; pulse the first unanswered question.
    FocusSettle { question: usize },
    /// Dwell time of pulse `seq` elapsed.
    PulseExpired { seq: u64 },
    /// Apply the current group of batch `batch`.
    ApplyGroup { batch: u64 },
    /// Validate the current group of batch `batch`.
    ValidateGroup { batch: u64 },
    /// Post-exhaustion step of batch `batch`.
    Drain { batch: u64 },
    /// Debounced resume check after a manual write.
    ResumeCheck { seq: u64 },
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerKind::FocusSettle { question } => write!(f, "FocusSettle(q={question})"),
            TimerKind::PulseExpired { seq } => write!(f, "PulseExpired(seq={seq})"),
            TimerKind::ApplyGroup { batch } => write!(f, "ApplyGroup(batch={batch})"),
            TimerKind::ValidateGroup { batch } => write!(f, "ValidateGroup(batch={batch})"),
            TimerKind::Drain { batch } => write!(f, "Drain(batch={batch})"),
            TimerKind::ResumeCheck { seq } => write!(f, "ResumeCheck(seq={seq})"),
        }
    }
}

/// Visual flavour of a pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PulseStyle {
    /// The queue processor is writing this question.
    Autofill,
    /// The user is expected to answer this question.
    Manual,
}

/// Transient emphasis on one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pulse {
    pub question: usize,
    pub style: PulseStyle,
}

/// Completion notice for the composing caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSignal {
    pub step: usize,
    /// Only true when the user explicitly asked for bulk autofill.
    pub focus_next: bool,
}
