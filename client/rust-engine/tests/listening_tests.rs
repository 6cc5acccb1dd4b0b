mod common;

use std::time::Duration;

use common::{harness, perfect_result, sample_challenge};
use elysian_engine::config::PlaybackGate;
use elysian_engine::models::attempt::{AttemptPhase, AttemptSubmission};
use elysian_engine::models::playback::PlaybackEvent;
use elysian_engine::models::ModuleKind;
use elysian_engine::{EngineError, EngineEvent};

/// Drives the paused clock until the playback completion flag reaches the
/// session, collecting any playback events seen along the way.
async fn wait_for_unlock(h: &mut common::TestHarness) -> Vec<PlaybackEvent> {
    let mut events = h.service.subscribe();
    let mut seen = Vec::new();
    let mut rounds = 0;
    while !h.service.sync_playback() {
        tokio::time::sleep(Duration::from_millis(20)).await;
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::Playback(playback) = event {
                seen.push(playback);
            }
        }
        rounds += 1;
        assert!(rounds < 100_000, "playback never finished");
    }
    while let Ok(event) = events.try_recv() {
        if let EngineEvent::Playback(playback) = event {
            seen.push(playback);
        }
    }
    seen
}

#[tokio::test]
async fn incomplete_answers_keep_submission_disabled_with_a_count() {
    let mut h = harness(ModuleKind::Listening, PlaybackGate::Lenient);
    h.api.push_fetch(Ok(sample_challenge("ch-1", 3, 45)));
    h.service.load(None).await.unwrap();

    h.service.record_answer(0, "A").unwrap();
    h.service.record_answer(1, "B").unwrap();

    assert!(!h.service.session().can_submit());
    assert_eq!(h.service.session().missing_answers(), 1);
    match h.service.submit().await {
        Err(EngineError::IncompleteAttempt { missing }) => assert_eq!(missing, 1),
        other => panic!("expected the completeness gate, got {:?}", other),
    }
    assert_eq!(h.api.submit_count(), 0);

    h.service.record_answer(2, "C").unwrap();
    assert!(h.service.session().can_submit());
}

#[tokio::test(start_paused = true)]
async fn strict_gate_scenario_runs_end_to_end() {
    let mut h = harness(ModuleKind::Listening, PlaybackGate::Strict);
    h.api.push_fetch(Ok(sample_challenge("ch-60", 2, 60)));
    h.service.load(None).await.unwrap();

    // Questions are locked until the playback timer reaches the declared
    // duration.
    assert!(!h.service.sync_playback());
    assert!(matches!(
        h.service.record_answer(0, "A"),
        Err(EngineError::PlaybackLocked)
    ));

    h.service.start_playback().unwrap();
    let events = wait_for_unlock(&mut h).await;
    assert!(events
        .iter()
        .any(|event| matches!(event, PlaybackEvent::PlaybackFinished(_))));

    h.service.record_answer(0, "A").unwrap();
    h.service.record_answer(1, "B").unwrap();
    assert!(h.service.session().can_submit());

    h.api.push_submission(Ok(perfect_result(2)));
    h.service.submit().await.unwrap();
    let result = h.service.session().result().unwrap();
    assert_eq!(result.score, 100.0);
    assert_eq!(result.correct_count(), 2);

    match h.api.take_last_submission().unwrap() {
        AttemptSubmission::Listening {
            content_id,
            answers,
        } => {
            assert_eq!(content_id, "ch-60");
            assert_eq!(answers, vec!["A".to_string(), "B".to_string()]);
        }
        other => panic!("expected a listening submission, got {:?}", other),
    }

    // "Try Again" re-locks playback on the same challenge with no answers.
    h.service.retry().unwrap();
    assert_eq!(h.service.phase(), AttemptPhase::Presenting);
    assert_eq!(h.service.session().exercise().unwrap().id(), "ch-60");
    assert_eq!(h.service.session().missing_answers(), 2);
    assert!(!h.service.sync_playback());
    assert!(matches!(
        h.service.record_answer(0, "A"),
        Err(EngineError::PlaybackLocked)
    ));
}

#[tokio::test(start_paused = true)]
async fn doubled_speed_still_reaches_completion() {
    let mut h = harness(ModuleKind::Listening, PlaybackGate::Strict);
    h.api.push_fetch(Ok(sample_challenge("ch-2", 1, 30)));
    h.service.load(None).await.unwrap();

    h.service.set_playback_speed(2.0);
    h.service.start_playback().unwrap();
    let events = wait_for_unlock(&mut h).await;

    let finish = events
        .iter()
        .find_map(|event| match event {
            PlaybackEvent::PlaybackFinished(done) => Some(done),
            _ => None,
        })
        .expect("playback finished event");
    assert_eq!(finish.total_seconds, 30);
    h.service.record_answer(0, "A").unwrap();
}

#[tokio::test]
async fn lenient_gate_answers_without_any_playback() {
    let mut h = harness(ModuleKind::Listening, PlaybackGate::Lenient);
    h.api.push_fetch(Ok(sample_challenge("ch-3", 2, 120)));
    h.service.load(None).await.unwrap();

    h.service.record_answer(0, "A").unwrap();
    h.service.record_answer(1, "B").unwrap();
    assert!(h.service.session().can_submit());
}

#[tokio::test]
async fn explicit_override_unlocks_the_strict_gate() {
    let mut h = harness(ModuleKind::Listening, PlaybackGate::Strict);
    h.api.push_fetch(Ok(sample_challenge("ch-4", 1, 90)));
    h.service.load(None).await.unwrap();

    assert!(matches!(
        h.service.record_answer(0, "A"),
        Err(EngineError::PlaybackLocked)
    ));
    h.service.unlock_questions();
    h.service.record_answer(0, "A").unwrap();
    assert_eq!(h.service.phase(), AttemptPhase::Capturing);
}

#[tokio::test]
async fn answers_can_be_revised_before_submission() {
    let mut h = harness(ModuleKind::Listening, PlaybackGate::Lenient);
    h.api.push_fetch(Ok(sample_challenge("ch-5", 1, 30)));
    h.service.load(None).await.unwrap();

    h.service.record_answer(0, "A").unwrap();
    h.service.record_answer(0, "B").unwrap();
    h.api.push_submission(Ok(perfect_result(1)));
    h.service.submit().await.unwrap();

    match h.api.take_last_submission().unwrap() {
        AttemptSubmission::Listening { answers, .. } => {
            assert_eq!(answers, vec!["B".to_string()]);
        }
        other => panic!("expected a listening submission, got {:?}", other),
    }
}

#[tokio::test]
async fn out_of_range_question_index_is_rejected() {
    let mut h = harness(ModuleKind::Listening, PlaybackGate::Lenient);
    h.api.push_fetch(Ok(sample_challenge("ch-6", 2, 30)));
    h.service.load(None).await.unwrap();

    assert!(matches!(
        h.service.record_answer(5, "A"),
        Err(EngineError::UnknownQuestion { index: 5 })
    ));
}
