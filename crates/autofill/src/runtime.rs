/*!
Tokio driver for one mounted step.

The engine lives inside a single worker task. Callers talk to it through a
cheap, cloneable [`RuntimeHandle`] that only wraps an unbounded command
sender; the worker publishes a fresh [`Presentation`] on a `watch` channel
after every command or timer, and forwards batch completion signals on an
mpsc channel.

Timers are kept in a `tokio_util::time::DelayQueue`. A reset clears the
queue as well as bumping the engine epoch, so nothing from before the reset
can fire into the new state.

Shutdown: `RuntimeHandle::shutdown` (or dropping every handle) stops the
worker; the engine is returned through the join handle.
*/

use std::future::poll_fn;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::time::DelayQueue;
use tracing::{debug, trace, warn};

use crate::effects::{BatchSignal, Effect, Timer};
use crate::engine::{Presentation, StepEngine};
use crate::error::AutofillError;
use crate::prefill::Prefill;
use crate::queue::QueueEntry;
use crate::store::StepStore;
use crate::values::FieldValue;

#[derive(Debug)]
enum Command {
    Write { key: String, value: FieldValue },
    ToggleLabel { name: String, label: String, checked: bool },
    Autofill(Prefill),
    Play(Vec<QueueEntry>),
    Reset,
    Shutdown,
}

/// Handle for feeding inputs into a running step.
#[derive(Clone, Debug)]
pub struct RuntimeHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl RuntimeHandle {
    fn send(&self, command: Command) -> Result<(), AutofillError> {
        self.tx.send(command).map_err(|_| AutofillError::RuntimeStopped)
    }

    pub fn write(&self, key: impl Into<String>, value: impl Into<FieldValue>) -> Result<(), AutofillError> {
        self.send(Command::Write {
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn toggle_checkbox_label(
        &self,
        name: impl Into<String>,
        label: impl Into<String>,
        checked: bool,
    ) -> Result<(), AutofillError> {
        self.send(Command::ToggleLabel {
            name: name.into(),
            label: label.into(),
            checked,
        })
    }

    pub fn autofill(&self, prefill: Prefill) -> Result<(), AutofillError> {
        self.send(Command::Autofill(prefill))
    }

    pub fn play(&self, entries: Vec<QueueEntry>) -> Result<(), AutofillError> {
        self.send(Command::Play(entries))
    }

    pub fn reset(&self) -> Result<(), AutofillError> {
        self.send(Command::Reset)
    }

    pub fn shutdown(&self) -> Result<(), AutofillError> {
        self.send(Command::Shutdown)
    }
}

/// A running step: the handle plus the output channels of its worker.
pub struct StepRuntime {
    pub handle: RuntimeHandle,
    pub presentation: watch::Receiver<Presentation>,
    pub signals: mpsc::UnboundedReceiver<BatchSignal>,
    pub join: JoinHandle<StepEngine>,
}

impl StepRuntime {
    /// Spawn the worker for `engine`. Requires a tokio runtime.
    ///
    /// `initial` are effects already produced for the engine (e.g. by
    /// seeding it), interpreted before the first command.
    pub fn spawn(engine: StepEngine, store: Arc<dyn StepStore>, initial: Vec<Effect>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (presentation_tx, presentation) = watch::channel(engine.presentation());
        let (signal_tx, signals) = mpsc::unbounded_channel();
        let worker = Worker {
            engine,
            store,
            rx,
            timers: DelayQueue::new(),
            presentation_tx,
            signal_tx,
        };
        let join = tokio::spawn(worker.run(initial));
        Self {
            handle: RuntimeHandle { tx },
            presentation,
            signals,
            join,
        }
    }
}

struct Worker {
    engine: StepEngine,
    store: Arc<dyn StepStore>,
    rx: mpsc::UnboundedReceiver<Command>,
    timers: DelayQueue<Timer>,
    presentation_tx: watch::Sender<Presentation>,
    signal_tx: mpsc::UnboundedSender<BatchSignal>,
}

impl Worker {
    async fn run(mut self, initial: Vec<Effect>) -> StepEngine {
        self.interpret(initial);
        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                Some(expired) = poll_fn(|cx| self.timers.poll_expired(cx)), if !self.timers.is_empty() => {
                    let timer = expired.into_inner();
                    trace!(timer = %timer.kind, "timer expired");
                    let effects = self.engine.fire(timer);
                    self.interpret(effects);
                }
            }
        }
        // Pending timers die with the queue; an engine left mid-pass would
        // stay playing forever once driven again.
        if self.engine.is_playing() || self.engine.has_snapshot() {
            debug!(step = self.engine.step(), "abandoning in-flight autofill pass");
        }
        self.engine.reset();
        debug!(step = self.engine.step(), "step runtime stopped");
        self.engine
    }

    fn handle(&mut self, command: Command) {
        let effects = match command {
            Command::Write { key, value } => self.engine.write(&key, value),
            Command::ToggleLabel {
                name,
                label,
                checked,
            } => self.engine.toggle_checkbox_label(&name, &label, checked),
            Command::Autofill(prefill) => self.engine.begin_autofill(prefill),
            Command::Play(entries) => self.engine.start_batch(entries),
            Command::Reset => {
                self.engine.reset();
                self.timers.clear();
                Vec::new()
            }
            Command::Shutdown => Vec::new(),
        };
        self.interpret(effects);
    }

    fn interpret(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Schedule { after, timer } => {
                    self.timers.insert(timer, after);
                }
                Effect::Focus(pulse) => {
                    debug!(question = pulse.question, style = %pulse.style, "focus")
                }
                Effect::Persist(values) => {
                    if let Err(e) = self.store.save(self.engine.step(), &values) {
                        warn!(error = %e, "failed to persist step");
                    }
                }
                Effect::BatchComplete(signal) => {
                    if self.signal_tx.send(signal).is_err() {
                        trace!("no listener for batch completion");
                    }
                }
            }
        }
        self.presentation_tx.send_replace(self.engine.presentation());
    }
}
