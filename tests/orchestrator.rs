//! Interaction cycle tests
//!
//! Full wake → record → transcribe → classify → respond cycles against
//! in-memory fakes. Time is paused so timeouts and back-offs run instantly.

use std::time::Duration;

use astromech::{CycleOutcome, CycleSettings, CycleState, EmotionCategory, FallbackReason};
use tokio::sync::mpsc;

mod common;

use common::{
    Canned, FakeDevice, FakeWake, orchestrator, orchestrator_with_wake, silence_chunk,
    test_settings, trigger_chunk,
};

#[tokio::test(start_paused = true)]
async fn test_greeting_plays_happy_clip() {
    let device = FakeDevice::with_script([silence_chunk(), trigger_chunk()]);
    let stt = Canned::ok("Hello there!");
    let model = Canned::ok("happy");
    let mut orch = orchestrator(&device, stt.clone(), model.clone(), test_settings());

    let report = orch.run_cycle().await;

    assert!(report.wake.is_some());
    assert_eq!(report.transcript.as_deref(), Some("Hello there!"));
    assert_eq!(report.category, Some(EmotionCategory::Happy));
    assert_eq!(report.clip.as_deref(), Some("happy/test.wav"));
    assert_eq!(report.outcome, Some(CycleOutcome::Responded));
    assert_eq!(device.played(), ["happy/test.wav"]);
    assert_eq!(device.records(), 1);
    assert_eq!(stt.calls(), 1);
    assert_eq!(model.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transcription_error_acknowledges_without_classifying() {
    let device = FakeDevice::with_script([trigger_chunk()]);
    let stt = Canned::err("503 service unavailable");
    let model = Canned::ok("scared");
    let mut orch = orchestrator(&device, stt, model.clone(), test_settings());

    let report = orch.run_cycle().await;

    assert_eq!(report.transcript, None);
    assert_eq!(report.classification, None);
    assert_eq!(report.category, Some(EmotionCategory::Acknowledge));
    assert_eq!(device.played(), ["acknowledge/test.wav"]);
    assert_eq!(model.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_danger_plays_scared_clip() {
    let device = FakeDevice::with_script([trigger_chunk()]);
    let stt = Canned::ok("Danger, reactor core is failing!");
    let model = Canned::ok("scared");
    let mut orch = orchestrator(&device, stt, model, test_settings());

    let report = orch.run_cycle().await;

    assert_eq!(report.category, Some(EmotionCategory::Scared));
    assert_eq!(device.played(), ["scared/test.wav"]);
    let classification = report.classification.unwrap();
    assert_eq!(classification.raw_reply.as_deref(), Some("scared"));
    assert_eq!(classification.fallback, None);
}

#[tokio::test(start_paused = true)]
async fn test_empty_transcript_acknowledges_without_model() {
    let device = FakeDevice::with_script([trigger_chunk()]);
    let model = Canned::ok("happy");
    let mut orch = orchestrator(&device, Canned::ok(""), model.clone(), test_settings());

    let report = orch.run_cycle().await;

    assert_eq!(report.transcript.as_deref(), Some(""));
    assert_eq!(report.category, Some(EmotionCategory::Acknowledge));
    assert_eq!(
        report.classification.unwrap().fallback,
        Some(FallbackReason::EmptyTranscript)
    );
    assert_eq!(model.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_capture_failure_skips_downstream() {
    let device = FakeDevice::with_script([trigger_chunk()]);
    device.update(|s| s.fail_record = true);
    let stt = Canned::ok("Hello");
    let model = Canned::ok("happy");
    let mut orch = orchestrator(&device, stt.clone(), model.clone(), test_settings());

    let report = orch.run_cycle().await;

    assert_eq!(report.outcome, Some(CycleOutcome::CaptureFailed));
    assert_eq!(report.category, None);
    assert!(device.played().is_empty());
    assert_eq!(stt.calls(), 0);
    assert_eq!(model.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transcription_timeout_acknowledges() {
    let device = FakeDevice::with_script([trigger_chunk()]);
    let stt = Canned::slow("too late", Duration::from_secs(60));
    let model = Canned::ok("happy");
    let settings = CycleSettings {
        transcribe_timeout: Duration::from_secs(2),
        ..test_settings()
    };
    let mut orch = orchestrator(&device, stt, model.clone(), settings);

    let start = tokio::time::Instant::now();
    let report = orch.run_cycle().await;

    assert!(start.elapsed() < Duration::from_secs(10));
    assert_eq!(report.transcript, None);
    assert_eq!(report.category, Some(EmotionCategory::Acknowledge));
    assert_eq!(device.played(), ["acknowledge/test.wav"]);
    assert_eq!(model.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_playback_failure_is_not_fatal() {
    let device = FakeDevice::with_script([trigger_chunk()]);
    device.update(|s| s.fail_play = true);
    let mut orch = orchestrator(&device, Canned::ok("Hi"), Canned::ok("happy"), test_settings());

    let report = orch.run_cycle().await;
    assert_eq!(report.outcome, Some(CycleOutcome::PlaybackFailed));
    assert_eq!(report.clip.as_deref(), Some("happy/test.wav"));

    // The next cycle runs normally
    device.update(|s| s.fail_play = false);
    device.push_script([trigger_chunk()]);
    let report = orch.run_cycle().await;
    assert_eq!(report.outcome, Some(CycleOutcome::Responded));
    assert_eq!(device.played().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_listen_failure_backs_off_to_idle() {
    let device = FakeDevice::default();
    device.update(|s| s.fail_listen = true);
    let stt = Canned::ok("Hi");
    let mut orch = orchestrator(&device, stt.clone(), Canned::ok("happy"), test_settings());

    let report = orch.run_cycle().await;

    assert_eq!(report.outcome, Some(CycleOutcome::ListenFailed));
    assert!(report.wake.is_none());
    assert_eq!(device.records(), 0);
    assert_eq!(stt.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_trigger_during_playback_is_dropped() {
    let device = FakeDevice::with_script([trigger_chunk()]);
    device.update(|s| s.echo_trigger_on_play = true);
    let mut orch = orchestrator(&device, Canned::ok("Hi"), Canned::ok("happy"), test_settings());

    let report = orch.run_cycle().await;
    assert_eq!(report.outcome, Some(CycleOutcome::Responded));
    assert_eq!(device.state.lock().unwrap().buffered.len(), 1);

    // The echoed trigger is drained when the next cycle arms
    let next = tokio::time::timeout(Duration::from_secs(30), orch.run_cycle()).await;
    assert!(next.is_err(), "no new cycle should start");
    assert_eq!(device.records(), 1);
    assert!(device.state.lock().unwrap().buffered.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_ignores_early_trigger() {
    let device = FakeDevice::with_script([trigger_chunk()]);
    let settings = CycleSettings {
        wake_cooldown: Duration::from_secs(5),
        ..test_settings()
    };
    let mut orch = orchestrator(&device, Canned::ok("Hi"), Canned::ok("happy"), settings);

    orch.run_cycle().await;

    // Trigger right away, then again after the cooldown has passed
    device.push_script([trigger_chunk()]);
    device.push_script(std::iter::repeat_with(silence_chunk).take(60));
    device.push_script([trigger_chunk()]);

    let report = orch.run_cycle().await;

    assert_eq!(report.outcome, Some(CycleOutcome::Responded));
    assert_eq!(device.records(), 2);
    assert_eq!(device.script_len(), 0, "second cycle should start on the last trigger");
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_skips_detection() {
    let device = FakeDevice::with_script([trigger_chunk()]);
    let wake = FakeWake::default();
    let settings = CycleSettings {
        wake_cooldown: Duration::from_secs(5),
        ..test_settings()
    };
    let mut orch =
        orchestrator_with_wake(&device, &wake, Canned::ok("Hi"), Canned::ok("happy"), settings);

    orch.run_cycle().await;

    device.push_script(std::iter::repeat_with(trigger_chunk).take(10));
    device.push_script(std::iter::repeat_with(silence_chunk).take(60));
    device.push_script([trigger_chunk()]);

    orch.run_cycle().await;

    // Only the two accepted triggers were ever examined
    assert_eq!(wake.triggers_seen(), 2);
    assert_eq!(device.records(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_step_from_idle_arms_detector() {
    let device = FakeDevice::default();
    let mut orch = orchestrator(&device, Canned::ok("Hi"), Canned::ok("happy"), test_settings());
    let mut report = astromech::CycleReport::new();

    let next = orch.step(CycleState::Idle, &mut report).await;

    assert_eq!(next, CycleState::Listening);
    assert_eq!(device.state.lock().unwrap().drains, 1);
}

#[tokio::test(start_paused = true)]
async fn test_step_classifying_always_responds() {
    let device = FakeDevice::default();
    let mut orch = orchestrator(&device, Canned::ok("Hi"), Canned::err("boom"), test_settings());
    let mut report = astromech::CycleReport::new();

    let next = orch
        .step(CycleState::Classifying("what is that".to_string()), &mut report)
        .await;

    assert_eq!(next, CycleState::Responding(EmotionCategory::Acknowledge));
    assert_eq!(
        report.classification.unwrap().fallback,
        Some(FallbackReason::ModelError)
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_while_listening_returns_promptly() {
    let device = FakeDevice::default();
    let mut orch = orchestrator(&device, Canned::ok("Hi"), Canned::ok("happy"), test_settings());

    let (tx, mut rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let _ = tx.send(()).await;
    });

    let start = tokio::time::Instant::now();
    orch.run(&mut rx).await;

    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(device.records(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_run_serves_cycles_until_shutdown() {
    let device = FakeDevice::with_script([trigger_chunk(), silence_chunk(), trigger_chunk()]);
    let stt = Canned::ok("Hello there!");
    let mut orch = orchestrator(&device, stt.clone(), Canned::ok("happy"), test_settings());

    let (tx, mut rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        let _ = tx.send(()).await;
    });

    orch.run(&mut rx).await;

    assert_eq!(device.played(), ["happy/test.wav", "happy/test.wav"]);
    assert_eq!(stt.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_transcription_plays_nothing() {
    let device = FakeDevice::with_script([trigger_chunk()]);
    let stt = Canned::slow("Hello there!", Duration::from_secs(60));
    let mut orch = orchestrator(&device, stt.clone(), Canned::ok("happy"), test_settings());

    let (tx, mut rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let _ = tx.send(()).await;
    });

    let start = tokio::time::Instant::now();
    orch.run(&mut rx).await;

    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(device.records(), 1);
    assert_eq!(stt.calls(), 1);
    assert!(device.played().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_classification_plays_nothing() {
    let device = FakeDevice::with_script([trigger_chunk()]);
    let model = Canned::slow("happy", Duration::from_secs(60));
    let mut orch =
        orchestrator(&device, Canned::ok("Hello there!"), model.clone(), test_settings());

    let (tx, mut rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let _ = tx.send(()).await;
    });

    let start = tokio::time::Instant::now();
    orch.run(&mut rx).await;

    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(model.calls(), 1);
    assert!(device.played().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_playback_lets_clip_finish() {
    let device = FakeDevice::with_script([trigger_chunk()]);
    device.update(|s| s.play_delay = Duration::from_secs(3));
    let mut orch = orchestrator(
        &device,
        Canned::ok("Hello there!"),
        Canned::ok("happy"),
        test_settings(),
    );

    let (tx, mut rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let _ = tx.send(()).await;
    });

    let start = tokio::time::Instant::now();
    orch.run(&mut rx).await;

    assert!(start.elapsed() >= Duration::from_secs(3));
    assert!(start.elapsed() < Duration::from_secs(4));
    assert_eq!(device.played(), ["happy/test.wav"]);
    assert_eq!(device.finished_plays(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_closed_shutdown_channel_keeps_serving() {
    let device = FakeDevice::with_script([trigger_chunk()]);
    let mut orch = orchestrator(
        &device,
        Canned::ok("Hello there!"),
        Canned::ok("happy"),
        test_settings(),
    );

    let (tx, mut rx) = mpsc::channel::<()>(1);
    drop(tx);

    let still_running = tokio::time::timeout(Duration::from_secs(30), orch.run(&mut rx)).await;

    assert!(still_running.is_err());
    assert_eq!(device.played(), ["happy/test.wav"]);
}
