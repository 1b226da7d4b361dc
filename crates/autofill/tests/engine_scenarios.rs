use std::sync::Arc;
use std::time::Duration;

use autofill::prelude::*;
use autofill::sim::FocusEvent;
use pretty_assertions::assert_eq;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn vehicle_schema() -> Schema {
    Schema::new(vec![
        Question::new("Insured before?").radio("prior", &["yes", "no"]),
        Question::new("Contract expiry")
            .select("exp-y", &["2025", "2026"])
            .select("exp-m", &["1", "2", "3", "4"]),
        Question::new("Extras").checkbox("extras", &["glass", "towing"]),
        Question::new("Claims in the last 5 years?").radio("claims", &["yes", "no"]),
    ])
}

fn vehicle_prefill(schema: &Schema) -> Prefill {
    let records: Vec<PrefillRecord> = serde_json::from_str(
        r#"[
          {"radio": {"name": "prior", "value": "yes"}},
          {"select": {"selects": [{"name": "exp-y", "value": "2025"}, {"name": "exp-m", "value": "4"}]}},
          {"checkbox": {"name": "extras", "values": ["towing"]}}
        ]"#,
    )
    .unwrap();
    flatten(schema, &records, "please select")
}

fn simulation(schema: Schema, mode: FillMode, store: Arc<MemoryStore>) -> Simulation {
    let engine = StepEngine::new(0, schema, RuleTable::default(), EngineConfig::default(), mode);
    Simulation::new(engine, store)
}

fn styles(log: &[FocusEvent]) -> Vec<(usize, PulseStyle)> {
    log.iter().map(|f| (f.pulse.question, f.pulse.style)).collect()
}

#[test]
fn autofill_pass_plays_groups_in_order_then_prompts_for_the_rest() {
    let store = Arc::new(MemoryStore::new());
    let schema = vehicle_schema();
    let prefill = vehicle_prefill(&schema);
    let mut sim = simulation(schema, FillMode::Manual, store.clone());

    sim.begin_autofill(prefill);
    sim.run_until_idle();

    assert_eq!(
        styles(sim.focus_log()),
        vec![
            (0, PulseStyle::Autofill),
            (1, PulseStyle::Autofill),
            (2, PulseStyle::Autofill),
            (3, PulseStyle::Manual),
        ]
    );
    assert_eq!(sim.engine().mode(), FillMode::AssistedAutofill);
    assert_eq!(sim.engine().current_field_index(), 4);
    assert!(sim.signals().is_empty());
    assert_eq!(
        sim.engine().highlighted().iter().cloned().collect::<Vec<_>>(),
        vec!["claims".to_string()]
    );

    let stored = store.load(0).unwrap();
    assert_eq!(stored.text("prior"), Some("yes"));
    assert_eq!(stored.text("exp-m"), Some("4"));
    assert!(stored.flag("extras-1"));
    assert_eq!(sim.persisted(), 3);
}

#[test]
fn overwrite_between_apply_and_validation_is_what_gets_stored() {
    let store = Arc::new(MemoryStore::new());
    let schema = vehicle_schema();
    let prefill = vehicle_prefill(&schema);
    let mut sim = simulation(schema, FillMode::Manual, store.clone());

    sim.begin_autofill(prefill);
    // "prior" is applied at 500ms and validated at 1000ms.
    sim.advance(ms(600));
    assert_eq!(sim.engine().values().text("prior"), Some("yes"));
    sim.write("prior", "no");
    sim.run_until_idle();

    assert_eq!(sim.engine().values().text("prior"), Some("no"));
    assert_eq!(sim.engine().durable().text("prior"), Some("no"));
    assert_eq!(store.load(0).unwrap().text("prior"), Some("no"));
    assert_eq!(store.load(0).unwrap().text("exp-m"), Some("4"));
}

#[test]
fn finishing_the_step_manually_clears_highlight_and_snapshot() {
    let store = Arc::new(MemoryStore::new());
    let schema = vehicle_schema();
    let prefill = vehicle_prefill(&schema);
    let mut sim = simulation(schema, FillMode::Manual, store.clone());
    sim.begin_autofill(prefill);
    sim.run_until_idle();

    sim.write("claims", "no");
    assert!(sim.engine().highlighted().is_empty());
    assert!(sim.engine().has_snapshot());
    sim.run_until_idle();

    assert!(!sim.engine().has_snapshot());
    assert_eq!(sim.engine().current_field_index(), 5);
    assert_eq!(store.load(0).unwrap().text("claims"), Some("no"));
}

#[test]
fn complete_pass_signals_batch_complete() {
    let schema = Schema::new(vec![
        Question::new("a").radio("radioA", &["yes", "no"]),
        Question::new("b").radio("radioB", &["x"]),
    ]);
    let prefill: Prefill = Prefill {
        seed: [("radioA", "yes"), ("radioB", "x")].into_iter().collect(),
        entries: vec![QueueEntry::new("radioA", "yes", 0), QueueEntry::new("radioB", "x", 1)],
    };
    let mut sim = simulation(schema, FillMode::Manual, Arc::new(MemoryStore::new()));
    sim.begin_autofill(prefill);
    sim.run_until_idle();

    assert_eq!(
        sim.signals(),
        &[BatchSignal {
            step: 0,
            focus_next: true
        }]
    );
    assert!(!sim.engine().has_snapshot());
    assert_eq!(sim.engine().pulse(), None);
}

#[test]
fn value_blanked_during_playback_is_resumed() {
    let store = Arc::new(MemoryStore::new());
    let schema = Schema::new(vec![
        Question::new("a").radio("radioA", &["yes", "no"]),
        Question::new("b").radio("radioB", &["x"]),
    ]);
    let prefill = Prefill {
        seed: [("radioA", "yes"), ("radioB", "x")].into_iter().collect(),
        entries: vec![QueueEntry::new("radioA", "yes", 0), QueueEntry::new("radioB", "x", 1)],
    };
    let mut sim = simulation(schema, FillMode::Manual, store.clone());
    sim.begin_autofill(prefill);

    // group 0 validated at 1000ms, group 1 applies at 1200ms
    sim.advance(ms(1100));
    assert_eq!(sim.engine().values().text("radioA"), Some("yes"));
    sim.write("radioA", "");
    assert_eq!(store.load(0).unwrap().text("radioA"), Some(""));

    sim.run_until_idle();

    assert_eq!(sim.engine().values().text("radioA"), Some("yes"));
    assert_eq!(sim.engine().values().text("radioB"), Some("x"));
    assert_eq!(store.load(0).unwrap().text("radioA"), Some("yes"));
    assert_eq!(sim.signals().len(), 1);
    assert!(!sim.engine().has_snapshot());
    assert_eq!(sim.pulsed_questions(), vec![0, 1, 0]);
}

#[test]
fn overwritten_autofill_value_is_not_resumed() {
    let schema = Schema::new(vec![
        Question::new("a").radio("radioA", &["yes", "no"]),
        Question::new("b").radio("radioB", &["x"]),
    ]);
    let prefill = Prefill {
        seed: [("radioA", "yes"), ("radioB", "x")].into_iter().collect(),
        entries: vec![QueueEntry::new("radioA", "yes", 0), QueueEntry::new("radioB", "x", 1)],
    };
    let mut sim = simulation(schema, FillMode::Manual, Arc::new(MemoryStore::new()));
    sim.begin_autofill(prefill);
    sim.advance(ms(1100));
    sim.write("radioA", "no");
    sim.run_until_idle();

    assert_eq!(sim.engine().values().text("radioA"), Some("no"));
    assert_eq!(sim.pulsed_questions(), vec![0, 1]);
}

#[test]
fn unanswerable_group_is_skipped_after_three_retries() {
    let store = Arc::new(MemoryStore::new());
    let schema = Schema::new(vec![
        Question::new("expiry")
            .select("exp-y", &["2025"])
            .select("exp-m", &["4"]),
        Question::new("b").radio("b", &["1"]),
    ]);
    let mut engine = StepEngine::new(
        0,
        schema,
        RuleTable::default(),
        EngineConfig::default(),
        FillMode::AssistedAutofill,
    );
    let effects = engine.start_batch(vec![
        QueueEntry::new("exp-y", "2025", 0),
        QueueEntry::new("b", "1", 1),
    ]);
    let mut sim = Simulation::new(engine, store.clone());
    sim.apply(effects);
    sim.run_until_idle();

    let autofill: Vec<usize> = sim
        .focus_log()
        .iter()
        .filter(|f| f.pulse.style == PulseStyle::Autofill)
        .map(|f| f.pulse.question)
        .collect();
    assert_eq!(autofill, vec![0, 0, 0, 0, 1]);

    let stored = store.load(0).unwrap();
    assert_eq!(stored.text("b"), Some("1"));
    assert_eq!(stored.get("exp-y"), None);

    assert!(sim.engine().highlighted().contains("exp-m"));
    assert_eq!(
        sim.focus_log().last().map(|f| (f.pulse.question, f.pulse.style)),
        Some((0, PulseStyle::Manual))
    );
}

#[test]
fn user_answers_win_over_extracted_values() {
    let schema = vehicle_schema();
    let prefill = vehicle_prefill(&schema);
    let mut sim = simulation(schema, FillMode::Manual, Arc::new(MemoryStore::new()));
    sim.write("prior", "no");
    sim.begin_autofill(prefill);
    sim.run_until_idle();

    assert_eq!(sim.engine().values().text("prior"), Some("no"));
    assert!(!sim.pulsed_questions().contains(&0));
}

#[test]
fn no_visibility_focus_while_a_batch_plays() {
    let schema = vehicle_schema();
    let prefill = vehicle_prefill(&schema);
    let mut sim = simulation(schema, FillMode::AssistedAutofill, Arc::new(MemoryStore::new()));
    sim.begin_autofill(prefill);
    // stop before the drain step
    sim.advance(ms(3000));
    assert!(sim
        .focus_log()
        .iter()
        .all(|f| f.pulse.style == PulseStyle::Autofill));
}

#[test]
fn reset_drops_timers_of_the_old_step() {
    let store = Arc::new(MemoryStore::new());
    let schema = vehicle_schema();
    let prefill = vehicle_prefill(&schema);
    let mut sim = simulation(schema, FillMode::Manual, store.clone());
    sim.begin_autofill(prefill);
    sim.advance(ms(600));
    assert_eq!(sim.engine().values().text("prior"), Some("yes"));

    sim.reset();
    sim.run_until_idle();

    assert_eq!(sim.engine().values().len(), 1);
    assert_eq!(sim.engine().pulse(), None);
    assert!(!sim.engine().is_playing());
    assert!(sim.signals().is_empty());
    assert!(store.load(0).unwrap().is_empty());
}

#[test]
fn seeding_reproduces_manual_boundary() {
    let store = Arc::new(MemoryStore::new());
    let mut manual = simulation(vehicle_schema(), FillMode::Manual, store.clone());
    manual.write("prior", "yes");
    manual.write("exp-y", "2025");
    manual.write("exp-m", "4");

    let mut seeded = simulation(vehicle_schema(), FillMode::Manual, store);
    seeded.seed_from_store();

    assert_eq!(seeded.engine().current_field_index(), 3);
    assert_eq!(
        seeded.engine().current_field_index(),
        manual.engine().current_field_index()
    );
    assert_eq!(seeded.engine().values(), manual.engine().values());
}

#[test]
fn repeated_updates_schedule_a_single_focus() {
    let mut sim = simulation(vehicle_schema(), FillMode::AssistedAutofill, Arc::new(MemoryStore::new()));
    sim.write("prior", "yes");
    sim.write("unrelated", "x");
    sim.write("unrelated", "y");
    sim.run_until_idle();
    assert_eq!(sim.pulsed_questions(), vec![1]);
}

#[test]
fn rules_update_overrides_on_write() {
    let rules = RuleTable::new(vec![ConditionalRule::new(
        "prior",
        ValueMatch::Is("yes".into()),
        "prior-insurer",
        true,
    )]);
    let mut engine = StepEngine::new(
        0,
        vehicle_schema(),
        rules,
        EngineConfig::default(),
        FillMode::Manual,
    );
    engine.write("prior", "yes");
    assert_eq!(engine.overrides().get("prior-insurer"), Some(true));
    assert_eq!(
        engine.presentation().overrides.get("prior-insurer"),
        Some(&true)
    );
}

#[test]
fn combo_question_answered_through_checkbox() {
    let schema = Schema::new(vec![
        Question::new("Drivers")
            .checkbox("drivers", &["only me"])
            .select("drivers-age", &["18-25", "26+"]),
        Question::new("next").radio("next", &["1"]),
    ]);
    let mut engine = StepEngine::new(0, schema, RuleTable::default(), EngineConfig::default(), FillMode::Manual);
    engine.write("drivers-age", "please select");
    assert_eq!(engine.current_field_index(), 1);
    engine.write("drivers-0", true);
    assert_eq!(engine.current_field_index(), 2);
}
