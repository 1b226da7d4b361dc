use std::sync::Arc;
use std::time::Duration;

use autofill::prelude::*;
use autofill::runtime::StepRuntime;
use pretty_assertions::assert_eq;

fn engine() -> StepEngine {
    let schema = Schema::new(vec![
        Question::new("a").radio("radioA", &["yes", "no"]),
        Question::new("b").radio("radioB", &["x"]),
    ]);
    StepEngine::new(0, schema, RuleTable::default(), EngineConfig::default(), FillMode::Manual)
}

fn prefill() -> Prefill {
    Prefill {
        seed: [("radioA", "yes"), ("radioB", "x")].into_iter().collect(),
        entries: vec![QueueEntry::new("radioA", "yes", 0), QueueEntry::new("radioB", "x", 1)],
    }
}

#[tokio::test(start_paused = true)]
async fn autofill_pass_completes_on_the_tokio_clock() {
    let store = Arc::new(MemoryStore::new());
    let mut runtime = StepRuntime::spawn(engine(), store.clone(), Vec::new());

    runtime.handle.autofill(prefill()).unwrap();
    tokio::time::sleep(Duration::from_millis(700)).await;
    {
        let view = runtime.presentation.borrow();
        assert!(view.playing);
        assert_eq!(view.pulse.map(|p| p.question), Some(0));
    }

    let signal = runtime.signals.recv().await.unwrap();
    assert_eq!(signal, BatchSignal { step: 0, focus_next: true });

    let view = runtime.presentation.borrow().clone();
    assert!(!view.playing);
    assert_eq!(view.answered_count(), 2);
    assert_eq!(view.values.text("radioB"), Some("x"));
    assert_eq!(store.load(0).unwrap(), view.values);

    runtime.handle.shutdown().unwrap();
    let engine = runtime.join.await.unwrap();
    assert!(!engine.has_snapshot());
}

#[tokio::test(start_paused = true)]
async fn reset_stops_playback() {
    let store = Arc::new(MemoryStore::new());
    let runtime = StepRuntime::spawn(engine(), store.clone(), Vec::new());

    runtime.handle.autofill(prefill()).unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;
    runtime.handle.reset().unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    let view = runtime.presentation.borrow().clone();
    assert!(!view.playing);
    assert_eq!(view.pulse, None);
    assert_eq!(view.values.get("radioB"), None);
    assert!(store.load(0).unwrap().is_empty());

    runtime.handle.shutdown().unwrap();
    runtime.join.await.unwrap();
}

#[tokio::test]
async fn manual_writes_are_persisted_and_published() {
    let store = Arc::new(MemoryStore::new());
    let mut runtime = StepRuntime::spawn(engine(), store.clone(), Vec::new());

    runtime.handle.write("radioA", "no").unwrap();
    runtime
        .presentation
        .wait_for(|view| view.current_field_index == 2)
        .await
        .unwrap();
    assert_eq!(store.load(0).unwrap().text("radioA"), Some("no"));

    drop(runtime.handle);
    let engine = runtime.join.await.unwrap();
    assert_eq!(engine.values().text("radioA"), Some("no"));
}

#[tokio::test(start_paused = true)]
async fn engine_returned_mid_pass_is_not_left_playing() {
    let store = Arc::new(MemoryStore::new());
    let runtime = StepRuntime::spawn(engine(), store.clone(), Vec::new());

    runtime.handle.autofill(prefill()).unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;
    runtime.handle.shutdown().unwrap();
    let engine = runtime.join.await.unwrap();
    assert!(!engine.is_playing());
    assert!(!engine.has_snapshot());
    assert_eq!(engine.values().text("radioA"), Some("yes"));

    // Driven again without timers, as after a refused `next`.
    let mut runtime = StepRuntime::spawn(engine, store.clone(), Vec::new());
    tokio::time::sleep(Duration::from_secs(60)).await;
    let view = runtime.presentation.borrow().clone();
    assert!(!view.playing);
    assert_eq!(view.progress, None);
    assert_eq!(view.pulse, None);

    runtime.handle.write("radioB", "x").unwrap();
    runtime
        .presentation
        .wait_for(|view| view.values.text("radioB") == Some("x"))
        .await
        .unwrap();
    assert_eq!(store.load(0).unwrap().text("radioB"), Some("x"));

    runtime.handle.shutdown().unwrap();
    runtime.join.await.unwrap();
}
