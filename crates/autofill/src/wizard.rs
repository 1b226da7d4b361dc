//! Multi-step shell around [`StepEngine`].
//!
//! Holds the ordered step definitions, the session fill mode and the durable
//! store. Exactly one step is mounted at a time; changing steps cancels the
//! mounted engine (its timers become stale) and seeds a fresh one from the
//! store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::effects::Effect;
use crate::engine::StepEngine;
use crate::error::{AutofillError, Result, StoreError, WizardError};
use crate::prefill::flatten;
use crate::rules::RuleTable;
use crate::schema::Schema;
use crate::source::{BulkSource, StepDefinition};
use crate::store::StepStore;
use crate::values::FieldValueMap;
use crate::visibility::FillMode;

/// When a step may be left with `next`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdvancePolicy {
    /// At least one meaningful value entered.
    AnyAnswered,
    #[default]
    AllAnswered,
}

/// Outcome of [`Wizard::next`].
#[derive(Debug)]
pub enum Navigation {
    Moved { step: usize, effects: Vec<Effect> },
    Finished,
}

pub struct Wizard {
    steps: Vec<StepDefinition>,
    schemas: Vec<Arc<Schema>>,
    config: EngineConfig,
    mode: FillMode,
    store: Arc<dyn StepStore>,
    current: usize,
    engine: Option<StepEngine>,
}

impl Wizard {
    pub fn new(
        steps: Vec<StepDefinition>,
        config: EngineConfig,
        mode: FillMode,
        store: Arc<dyn StepStore>,
    ) -> Result<Self> {
        if steps.is_empty() {
            return Err(WizardError::Empty.into());
        }
        let schemas = steps.iter().map(|s| Arc::new(s.schema())).collect();
        Ok(Self {
            steps,
            schemas,
            config,
            mode,
            store,
            current: 0,
            engine: None,
        })
    }

    pub fn current_step(&self) -> usize {
        self.current
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn definition(&self) -> &StepDefinition {
        &self.steps[self.current]
    }

    pub fn mode(&self) -> FillMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: FillMode) {
        self.mode = mode;
    }

    pub fn store(&self) -> &Arc<dyn StepStore> {
        &self.store
    }

    pub fn engine(&self) -> Option<&StepEngine> {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut StepEngine> {
        self.engine.as_mut()
    }

    /// Hand the mounted engine to a driver. The step stays selected.
    pub fn take_engine(&mut self) -> Option<StepEngine> {
        self.engine.take()
    }

    /// Take back an engine handed out by [`take_engine`](Self::take_engine).
    /// An engine of another step is dropped.
    pub fn attach(&mut self, engine: StepEngine) {
        if engine.step() == self.current {
            self.engine = Some(engine);
        } else {
            warn!(step = engine.step(), current = self.current, "engine of another step dropped");
        }
    }

    /// Build the engine for the current step and seed it from the store.
    pub fn mount(&mut self) -> Result<Vec<Effect>> {
        if let Some(engine) = self.engine.as_mut() {
            engine.reset();
        }
        let def = &self.steps[self.current];
        let mut engine = StepEngine::new(
            self.current,
            Arc::clone(&self.schemas[self.current]),
            RuleTable::new(def.rules.clone()),
            self.config.clone(),
            self.mode,
        );
        let stored = self.store.load(self.current)?;
        info!(step = self.current, title = %def.title, stored = stored.len(), "step mounted");
        let effects = engine.seed(stored);
        self.engine = Some(engine);
        Ok(effects)
    }

    /// Write the durable record of the mounted step.
    pub fn persist(&self, values: &FieldValueMap) -> Result<(), StoreError> {
        self.store.save(self.current, values)
    }

    /// Unanswered questions that keep the current step from advancing.
    pub fn blockers(&self) -> Result<Vec<usize>> {
        let engine = self.engine.as_ref().ok_or(WizardError::NotMounted)?;
        let blockers = match self.steps[self.current].policy {
            AdvancePolicy::AllAnswered => engine.unanswered(),
            AdvancePolicy::AnyAnswered => {
                if engine.values().meaningful_count(&self.config.placeholder) > 0 {
                    Vec::new()
                } else {
                    engine.unanswered()
                }
            }
        };
        Ok(blockers)
    }

    pub fn can_advance(&self) -> bool {
        self.blockers().is_ok_and(|b| b.is_empty())
    }

    /// Leave the current step if its policy allows it.
    pub fn next(&mut self) -> Result<Navigation> {
        let unanswered = self.blockers()?;
        if !unanswered.is_empty() {
            return Err(WizardError::Incomplete {
                step: self.current,
                unanswered,
            }
            .into());
        }
        if self.current + 1 >= self.steps.len() {
            info!("wizard finished");
            return Ok(Navigation::Finished);
        }
        let step = self.current + 1;
        let effects = self.go_to(step)?;
        Ok(Navigation::Moved { step, effects })
    }

    /// Previous step; stays on step 0.
    pub fn back(&mut self) -> Result<Vec<Effect>> {
        self.go_to(self.current.saturating_sub(1))
    }

    pub fn go_to(&mut self, step: usize) -> Result<Vec<Effect>> {
        if step >= self.steps.len() {
            return Err(WizardError::UnknownStep(step).into());
        }
        self.current = step;
        self.mount()
    }

    /// Drop every stored answer and start over at step 0.
    pub fn reset(&mut self) -> Result<Vec<Effect>> {
        self.store.clear()?;
        info!("wizard reset");
        self.go_to(0)
    }

    /// Fetch an extraction for the current step and start playing it.
    ///
    /// A failed fetch is returned as is; the engine is left untouched.
    pub async fn autofill<B: BulkSource>(&mut self, source: &B) -> Result<Vec<Effect>> {
        if self.engine.is_none() {
            return Err(WizardError::NotMounted.into());
        }
        let records = source.extract(self.current).await.map_err(|e| {
            warn!(step = self.current, error = %e, "extraction failed; nothing seeded");
            AutofillError::from(e)
        })?;
        let prefill = flatten(&self.schemas[self.current], &records, &self.config.placeholder);
        self.mode = FillMode::AssistedAutofill;
        let engine = self.engine.as_mut().ok_or(WizardError::NotMounted)?;
        Ok(engine.begin_autofill(prefill))
    }
}
