use std::collections::BTreeMap;
use std::sync::Arc;

use autofill::prelude::*;
use autofill::runtime::StepRuntime;
use autofill::sim::FocusEvent;
use color_eyre::eyre::{bail, eyre};
use color_eyre::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::cli::{parse_value, Cmd, Input, ScriptedWrite};
use crate::config::Config;

pub async fn dispatch(cmd: Cmd, config: Config) -> Result<()> {
    match cmd {
        Cmd::Simulate {
            input,
            step,
            writes,
            json,
        } => simulate(&config, input, step, writes, json).await,
        Cmd::Run { input } => run(&config, input).await,
        Cmd::Check { steps } => check(JsonFileSource::new(steps)).await,
    }
}

fn source(input: &Input) -> JsonFileSource {
    let source = JsonFileSource::new(&input.steps);
    match &input.prefill {
        Some(prefill) => source.with_prefill(prefill),
        None => source,
    }
}

fn store(config: &Config, input: &Input) -> Arc<dyn StepStore> {
    let path = config.session_path(input.store.clone());
    info!(session = %path.display(), "using session file");
    Arc::new(JsonFileStore::new(path))
}

async fn simulate(
    config: &Config,
    input: Input,
    step: usize,
    mut writes: Vec<ScriptedWrite>,
    json: bool,
) -> Result<()> {
    let source = source(&input);
    let steps = source.steps().await?;
    let store = store(config, &input);
    let mut wizard = Wizard::new(steps, config.engine.clone(), FillMode::Manual, store.clone())?;
    let mut effects = wizard.go_to(step)?;
    if input.prefill.is_some() {
        effects.extend(wizard.autofill(&source).await?);
    }
    let engine = wizard
        .take_engine()
        .ok_or_else(|| eyre!("step {step} did not mount"))?;

    let mut sim = Simulation::new(engine, store);
    sim.apply(effects);
    writes.sort_by_key(|w| w.at);
    for write in writes {
        sim.advance(write.at.saturating_sub(sim.now()));
        info!(key = %write.key, value = %write.value, at = ?write.at, "scripted write");
        sim.write(&write.key, write.value);
    }
    sim.run_until_idle();

    if json {
        println!("{}", serde_json::to_string_pretty(&sim.engine().presentation())?);
    } else {
        print_report(&sim);
    }
    Ok(())
}

fn print_report(sim: &Simulation) {
    println!("timeline:");
    for FocusEvent { at, pulse } in sim.focus_log() {
        println!("  {:>6}ms  focus q{} ({})", at.as_millis(), pulse.question, pulse.style);
    }
    for signal in sim.signals() {
        println!("  step {} complete (focus next: {})", signal.step, signal.focus_next);
    }
    print_presentation(&sim.engine().presentation());
    println!("finished after {}ms", sim.now().as_millis());
}

fn print_presentation(view: &Presentation) {
    println!(
        "step {}: answered {} item(s), showing {} / {}",
        view.step,
        view.answered_count(),
        view.revealed_count(),
        view.total
    );
    for (key, value) in view.values.iter() {
        let mark = if view.highlighted.contains(key) { "!" } else { " " };
        println!("  {mark} {key} = {value}");
    }
    if !view.highlighted.is_empty() {
        let keys: Vec<&str> = view.highlighted.iter().map(String::as_str).collect();
        println!("  needs input: {}", keys.join(", "));
    }
}

const HELP: &str = "commands: set <key> <value> | tick <name> <label> on|off | autofill | show | next | back | reset | quit";

async fn run(config: &Config, input: Input) -> Result<()> {
    let source = source(&input);
    let steps = source.steps().await?;
    let store = store(config, &input);
    let mut wizard = Wizard::new(steps, config.engine.clone(), FillMode::Manual, store.clone())?;
    let effects = wizard.mount()?;
    let mut runtime = spawn(&mut wizard, store.clone(), effects)?;

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(signal) = runtime.signals.recv() => {
                println!("step {} complete", signal.step);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let words: Vec<&str> = line.split_whitespace().collect();
                match words.as_slice() {
                    [] => {}
                    ["set", key, value] => runtime.handle.write(*key, parse_value(value))?,
                    ["set", key] => runtime.handle.write(*key, "")?,
                    ["tick", name, label, state] => {
                        runtime.handle.toggle_checkbox_label(*name, *label, *state == "on")?
                    }
                    ["autofill"] => match source.extract(wizard.current_step()).await {
                        Ok(records) => {
                            let schema = wizard.definition().schema();
                            let prefill = flatten(&schema, &records, &config.engine.placeholder);
                            wizard.set_mode(FillMode::AssistedAutofill);
                            runtime.handle.autofill(prefill)?;
                        }
                        Err(e) => {
                            warn!(error = %e, "extraction failed");
                            println!("autofill unavailable: {e}");
                        }
                    },
                    ["show"] => print_presentation(&runtime.presentation.borrow()),
                    ["next"] | ["back"] | ["reset"] => {
                        runtime.handle.shutdown()?;
                        wizard.attach(runtime.join.await?);
                        let moved = match words[0] {
                            "next" => navigate_next(&mut wizard),
                            "back" => wizard.back().map(Some).map_err(Into::into),
                            _ => wizard.reset().map(Some).map_err(Into::into),
                        };
                        let effects = match moved {
                            Ok(Some(effects)) => effects,
                            Ok(None) => {
                                println!("all steps done");
                                return Ok(());
                            }
                            Err(e) => {
                                println!("{e}");
                                Vec::new()
                            }
                        };
                        runtime = spawn(&mut wizard, store.clone(), effects)?;
                    }
                    ["quit"] | ["exit"] => break,
                    _ => println!("{HELP}"),
                }
            }
        }
    }
    runtime.handle.shutdown().ok();
    Ok(())
}

fn navigate_next(wizard: &mut Wizard) -> Result<Option<Vec<Effect>>> {
    match wizard.next()? {
        Navigation::Moved { step, effects } => {
            println!("step {step}: {}", wizard.definition().title);
            Ok(Some(effects))
        }
        Navigation::Finished => Ok(None),
    }
}

fn spawn(
    wizard: &mut Wizard,
    store: Arc<dyn StepStore>,
    effects: Vec<Effect>,
) -> Result<StepRuntime> {
    let engine = wizard
        .take_engine()
        .ok_or_else(|| eyre!("no step mounted"))?;
    Ok(StepRuntime::spawn(engine, store, effects))
}

async fn check(source: JsonFileSource) -> Result<()> {
    let steps = source.steps().await?;
    if steps.is_empty() {
        bail!("no steps defined");
    }
    let mut problems = 0;
    for (index, step) in steps.iter().enumerate() {
        println!(
            "step {index} `{}`: {} question(s), policy {}, {} rule(s)",
            step.title,
            step.questions.len(),
            step.policy,
            step.rules.len()
        );
        for (key, owners) in duplicate_keys(step) {
            problems += 1;
            println!("  key `{key}` is owned by questions {owners:?}; the first one wins");
        }
        let schema = step.schema();
        for rule in &step.rules {
            if schema.owner_of(&rule.trigger).is_none() {
                problems += 1;
                println!("  rule trigger `{}` is not a field of this step", rule.trigger);
            }
        }
    }
    if problems > 0 {
        bail!("{problems} problem(s) found");
    }
    println!("ok");
    Ok(())
}

fn duplicate_keys(step: &StepDefinition) -> Vec<(String, Vec<usize>)> {
    let mut owners: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (index, question) in step.questions.iter().enumerate() {
        for key in question.field_keys() {
            owners.entry(key).or_default().push(index);
        }
    }
    owners.into_iter().filter(|(_, o)| o.len() > 1).collect()
}
