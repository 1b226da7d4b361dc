//! Progressive-disclosure and autofill-reconciliation engine for multi-step
//! data-entry wizards.
//!
//! Modules, leaves first:
//! - `values`, `schema`: field values and the question model
//! - `answer`: the "is this question answered" predicate
//! - `visibility`: reveal boundary and focus pulses
//! - `rules`: conditional show/hide rules
//! - `queue`: plays extracted values into the form one question at a time
//! - `reconcile`: re-queues autofilled values that were blanked afterwards
//! - `highlight`: marks what still needs manual input
//! - `engine`: composes all of the above for one mounted step
//! - `sim`, `runtime`: drivers (virtual clock / tokio)
//! - `store`, `source`, `wizard`: persistence, inputs and the multi-step shell

pub mod answer;
pub mod config;
pub mod effects;
pub mod engine;
pub mod error;
pub mod highlight;
pub mod prefill;
pub mod queue;
pub mod reconcile;
pub mod rules;
pub mod runtime;
pub mod schema;
pub mod sim;
pub mod source;
pub mod store;
pub mod values;
pub mod visibility;
pub mod wizard;

pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::effects::{BatchSignal, Effect, Pulse, PulseStyle, Timer, TimerKind};
    pub use crate::engine::{Presentation, StepEngine};
    pub use crate::error::{AutofillError, SourceError, StoreError, WizardError};
    pub use crate::prefill::{flatten, Prefill, PrefillRecord};
    pub use crate::queue::QueueEntry;
    pub use crate::rules::{ConditionalRule, RuleTable, ValueMatch};
    pub use crate::schema::{Question, Schema};
    pub use crate::sim::Simulation;
    pub use crate::source::{BulkSource, JsonFileSource, SchemaSource, StepDefinition};
    pub use crate::store::{JsonFileStore, MemoryStore, StepStore};
    pub use crate::values::{FieldValue, FieldValueMap};
    pub use crate::visibility::FillMode;
    pub use crate::wizard::{AdvancePolicy, Navigation, Wizard};
}
