mod common;

use common::{harness, perfect_result, sample_article, sample_challenge};
use elysian_engine::config::PlaybackGate;
use elysian_engine::models::attempt::{AttemptPhase, AttemptSubmission};
use elysian_engine::models::exercise::ArticleSummary;
use elysian_engine::models::{CefrLevel, ModuleKind};
use elysian_engine::EngineError;

#[tokio::test]
async fn lookups_count_per_word_and_ride_along_with_the_submission() {
    let mut h = harness(ModuleKind::Reading, PlaybackGate::Strict);
    h.api.push_fetch(Ok(sample_article("art-1")));
    h.service.load(None).await.unwrap();

    // Three clicks over two distinct words; punctuation and case collapse.
    assert!(h.service.lookup_word("renewable").unwrap().is_some());
    assert!(h.service.lookup_word("Automation").unwrap().is_some());
    assert!(h.service.lookup_word("automation,").unwrap().is_some());

    let attempt = h.service.session().attempt().unwrap();
    assert_eq!(attempt.lookups().get("renewable"), Some(&1));
    assert_eq!(attempt.lookups().get("automation"), Some(&2));

    // The questions start empty and gated.
    assert_eq!(h.service.session().missing_answers(), 2);
    assert!(!h.service.session().can_submit());

    h.service.record_answer(0, "Automation").unwrap();
    h.service.record_answer(1, "Renewable industries").unwrap();
    h.api.push_submission(Ok(perfect_result(2)));
    h.service.submit().await.unwrap();

    match h.api.take_last_submission().unwrap() {
        AttemptSubmission::Reading {
            content_id,
            reading_seconds,
            answers,
            vocabulary_lookups,
        } => {
            assert_eq!(content_id, "art-1");
            assert!(reading_seconds < 5);
            assert_eq!(
                answers,
                vec!["Automation".to_string(), "Renewable industries".to_string()]
            );
            // Distinct words only, not click counts.
            assert_eq!(
                vocabulary_lookups,
                vec!["automation".to_string(), "renewable".to_string()]
            );
        }
        other => panic!("expected a reading submission, got {:?}", other),
    }
}

#[tokio::test]
async fn lookups_do_not_change_phase() {
    let mut h = harness(ModuleKind::Reading, PlaybackGate::Strict);
    h.api.push_fetch(Ok(sample_article("art-2")));
    h.service.load(None).await.unwrap();

    h.service.lookup_word("automation").unwrap();
    assert_eq!(h.service.phase(), AttemptPhase::Presenting);

    // The first recorded answer is what begins capturing.
    h.service.record_answer(0, "Automation").unwrap();
    assert_eq!(h.service.phase(), AttemptPhase::Capturing);

    // Lookups stay legal while answering.
    h.service.lookup_word("renewable").unwrap();
}

#[tokio::test]
async fn unknown_words_count_but_have_no_definition() {
    let mut h = harness(ModuleKind::Reading, PlaybackGate::Strict);
    h.api.push_fetch(Ok(sample_article("art-3")));
    h.service.load(None).await.unwrap();

    assert!(h.service.lookup_word("zeitgeist").unwrap().is_none());
    let attempt = h.service.session().attempt().unwrap();
    assert_eq!(attempt.lookups().get("zeitgeist"), Some(&1));

    // A click that hits no word at all is ignored entirely.
    assert!(h.service.lookup_word("...").unwrap().is_none());
    assert_eq!(h.service.session().attempt().unwrap().lookups().len(), 1);
}

#[tokio::test]
async fn lookups_are_a_reading_only_affair() {
    let mut h = harness(ModuleKind::Listening, PlaybackGate::Lenient);
    h.api.push_fetch(Ok(sample_challenge("ch-1", 1, 30)));
    h.service.load(None).await.unwrap();

    assert!(matches!(
        h.service.lookup_word("automation"),
        Err(EngineError::WrongModule(ModuleKind::Listening))
    ));
}

#[tokio::test]
async fn retry_clears_lookups_and_answers_for_the_same_article() {
    let mut h = harness(ModuleKind::Reading, PlaybackGate::Strict);
    h.api.push_fetch(Ok(sample_article("art-4")));
    h.service.load(None).await.unwrap();

    h.service.lookup_word("automation").unwrap();
    h.service.record_answer(0, "Automation").unwrap();
    h.service.record_answer(1, "Renewable work").unwrap();
    h.api.push_submission(Ok(perfect_result(2)));
    h.service.submit().await.unwrap();

    h.service.retry().unwrap();
    let attempt = h.service.session().attempt().unwrap();
    assert_eq!(attempt.exercise_id, "art-4");
    assert!(attempt.lookups().is_empty());
    assert!(attempt.answers().is_empty());
    assert_eq!(h.api.fetch_count(), 1);
}

#[tokio::test]
async fn a_specific_article_is_requested_by_content_id() {
    let mut h = harness(ModuleKind::Reading, PlaybackGate::Strict);
    h.api.push_fetch(Ok(sample_article("art-9")));
    h.service.load(Some("art-9")).await.unwrap();

    let (module, content_id) = h.api.last_fetch.lock().unwrap().clone().unwrap();
    assert_eq!(module, ModuleKind::Reading);
    assert_eq!(content_id.as_deref(), Some("art-9"));
}

#[tokio::test]
async fn the_library_is_browsable_without_touching_the_attempt() {
    let h = harness(ModuleKind::Reading, PlaybackGate::Strict);
    h.api.set_library(vec![ArticleSummary {
        id: "art-1".to_string(),
        title: "The Benefits of Reading".to_string(),
        cefr_level: CefrLevel::B1,
        topic: Some("education".to_string()),
        word_count: 120,
        estimated_reading_time: 2,
    }]);

    let library = h.service.library().await.unwrap();
    assert_eq!(library.len(), 1);
    assert_eq!(library[0].id, "art-1");
    assert_eq!(h.service.phase(), AttemptPhase::Idle);
}
