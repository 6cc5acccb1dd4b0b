#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use elysian_engine::config::{Config, PlaybackGate};
use elysian_engine::models::attempt::AttemptSubmission;
use elysian_engine::models::exercise::{
    ArticleSummary, ExerciseContent, ListeningChallenge, Question, QuestionKind, ReadingArticle,
    SpeakingExercise, SpeakingKind,
};
use elysian_engine::models::result::{AnswerReview, ExerciseResult};
use elysian_engine::models::{CefrLevel, ModuleKind};
use elysian_engine::services::api_client::{ApiError, ExerciseApi};
use elysian_engine::services::capture_service::{
    AudioCapture, CaptureError, CaptureHandle, SimulatedCapture,
};
use elysian_engine::services::identity::SessionTokenProvider;
use elysian_engine::services::ExerciseService;
use elysian_engine::utils::retry::RetryPolicy;

/// Scriptable stand-in for the backend. Outcomes are consumed in order; an
/// unscripted call fails loudly so tests notice unexpected requests.
pub struct MockExerciseApi {
    fetches: Mutex<VecDeque<Result<ExerciseContent, ApiError>>>,
    submissions: Mutex<VecDeque<Result<ExerciseResult, ApiError>>>,
    library: Mutex<Vec<ArticleSummary>>,
    pub fetch_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub last_submission: Mutex<Option<AttemptSubmission>>,
    pub last_fetch: Mutex<Option<(ModuleKind, Option<String>)>>,
}

impl MockExerciseApi {
    pub fn new() -> Self {
        Self {
            fetches: Mutex::new(VecDeque::new()),
            submissions: Mutex::new(VecDeque::new()),
            library: Mutex::new(Vec::new()),
            fetch_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            last_submission: Mutex::new(None),
            last_fetch: Mutex::new(None),
        }
    }

    pub fn push_fetch(&self, outcome: Result<ExerciseContent, ApiError>) {
        self.fetches.lock().unwrap().push_back(outcome);
    }

    pub fn push_submission(&self, outcome: Result<ExerciseResult, ApiError>) {
        self.submissions.lock().unwrap().push_back(outcome);
    }

    pub fn set_library(&self, summaries: Vec<ArticleSummary>) {
        *self.library.lock().unwrap() = summaries;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn submit_count(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn take_last_submission(&self) -> Option<AttemptSubmission> {
        self.last_submission.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExerciseApi for MockExerciseApi {
    async fn fetch_exercise(
        &self,
        module: ModuleKind,
        content_id: Option<&str>,
    ) -> Result<ExerciseContent, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_fetch.lock().unwrap() = Some((module, content_id.map(str::to_string)));
        self.fetches.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(ApiError::Status {
                status: 500,
                message: "unscripted fetch".to_string(),
            })
        })
    }

    async fn submit_attempt(
        &self,
        submission: &AttemptSubmission,
    ) -> Result<ExerciseResult, ApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_submission.lock().unwrap() = Some(submission.clone());
        self.submissions.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(ApiError::Status {
                status: 500,
                message: "unscripted submission".to_string(),
            })
        })
    }

    async fn fetch_library(&self) -> Result<Vec<ArticleSummary>, ApiError> {
        Ok(self.library.lock().unwrap().clone())
    }
}

/// Capture whose inner state stays visible to the test after the service
/// takes ownership of the boxed trait object.
#[derive(Clone)]
pub struct SharedCapture(pub Arc<Mutex<SimulatedCapture>>);

impl SharedCapture {
    pub fn new(inner: SimulatedCapture) -> Self {
        Self(Arc::new(Mutex::new(inner)))
    }

    pub fn active(&self) -> bool {
        self.0.lock().unwrap().is_active()
    }
}

impl AudioCapture for SharedCapture {
    fn start(&mut self) -> Result<CaptureHandle, CaptureError> {
        self.0.lock().unwrap().start()
    }

    fn stop(
        &mut self,
        handle: CaptureHandle,
    ) -> Result<elysian_engine::models::attempt::AudioArtifact, CaptureError> {
        self.0.lock().unwrap().stop(handle)
    }

    fn release(&mut self, handle: CaptureHandle) {
        self.0.lock().unwrap().release(handle)
    }

    fn is_active(&self) -> bool {
        self.0.lock().unwrap().is_active()
    }
}

/// Capture that always fails to acquire the device.
pub struct UnavailableCapture;

impl AudioCapture for UnavailableCapture {
    fn start(&mut self) -> Result<CaptureHandle, CaptureError> {
        Err(CaptureError::DeviceUnavailable(
            "microphone permission denied".to_string(),
        ))
    }

    fn stop(
        &mut self,
        _handle: CaptureHandle,
    ) -> Result<elysian_engine::models::attempt::AudioArtifact, CaptureError> {
        Err(CaptureError::NotActive)
    }

    fn release(&mut self, _handle: CaptureHandle) {}

    fn is_active(&self) -> bool {
        false
    }
}

pub struct TestHarness {
    pub api: Arc<MockExerciseApi>,
    pub identity: Arc<SessionTokenProvider>,
    pub service: ExerciseService,
}

pub fn harness(module: ModuleKind, gate: PlaybackGate) -> TestHarness {
    harness_with_capture(module, gate, Box::new(SimulatedCapture::new(16_000)))
}

pub fn harness_with_capture(
    module: ModuleKind,
    gate: PlaybackGate,
    capture: Box<dyn AudioCapture>,
) -> TestHarness {
    let api = Arc::new(MockExerciseApi::new());
    let identity = Arc::new(SessionTokenProvider::with_token("firebase-test-token"));
    let config = Config {
        playback_gate: gate,
        playback_tick_ms: 10,
        ..Config::default()
    };
    let service = ExerciseService::new(module, api.clone(), identity.clone(), capture, &config)
        .with_retry_policy(RetryPolicy::none());
    TestHarness {
        api,
        identity,
        service,
    }
}

pub fn sample_speaking() -> ExerciseContent {
    ExerciseContent::Speaking(SpeakingExercise {
        id: "sp-1".to_string(),
        kind: SpeakingKind::Sentence,
        content: "Could you tell me how to get to the nearest subway station?".to_string(),
        difficulty_level: 1,
        cefr_level: CefrLevel::A2,
    })
}

pub fn choice_question(prompt: &str, options: &[&str]) -> Question {
    Question {
        question: prompt.to_string(),
        kind: QuestionKind::MultipleChoice,
        options: Some(options.iter().map(|s| s.to_string()).collect()),
    }
}

pub fn sample_challenge(id: &str, question_count: usize, duration: u32) -> ExerciseContent {
    let questions = (0..question_count)
        .map(|i| choice_question(&format!("Question {}", i + 1), &["A", "B", "C"]))
        .collect();
    ExerciseContent::Listening(ListeningChallenge {
        id: id.to_string(),
        title: "Morning Routine".to_string(),
        description: "Listen to Sarah describe her typical morning".to_string(),
        transcript: "Hi, my name is Sarah.".to_string(),
        questions,
        duration,
        topic: Some("daily_routine".to_string()),
    })
}

pub fn sample_article(id: &str) -> ExerciseContent {
    ExerciseContent::Reading(ReadingArticle {
        id: id.to_string(),
        title: "The Future of Work".to_string(),
        content: "Technology is rapidly changing the nature of work. Automation is replacing \
                  many traditional jobs, but renewable industries create new opportunities."
            .to_string(),
        cefr_level: CefrLevel::B1,
        topic: Some("technology".to_string()),
        word_count: 24,
        estimated_reading_time: 1,
        vocabulary_highlights: vec!["automation".to_string(), "renewable".to_string()],
        comprehension_questions: vec![
            choice_question("What is replacing traditional jobs?", &["Automation", "Nothing"]),
            Question {
                question: "Name one new opportunity.".to_string(),
                kind: QuestionKind::OpenEnded,
                options: None,
            },
        ],
    })
}

pub fn perfect_result(questions: usize) -> ExerciseResult {
    ExerciseResult {
        score: 100.0,
        detailed_results: (0..questions)
            .map(|i| AnswerReview {
                question: format!("Question {}", i + 1),
                user_answer: "A".to_string(),
                correct_answer: "A".to_string(),
                is_correct: true,
            })
            .collect(),
        feedback: "Outstanding listening comprehension!".to_string(),
        xp_earned: 40,
        level_up: false,
        analysis: None,
    }
}

pub fn server_error(status: u16) -> ApiError {
    ApiError::Status {
        status,
        message: "backend unavailable".to_string(),
    }
}
