use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::metrics::{self, CAPTURE_FAILURES_TOTAL, SUBMISSION_RETRIES_TOTAL};
use crate::models::attempt::{
    AttemptPhase, AttemptSubmission, AudioArtifact, FailureStage, TransitionError,
};
use crate::models::exercise::{ArticleSummary, ExerciseContent};
use crate::models::result::ExerciseResult;
use crate::models::ModuleKind;
use crate::utils::retry::{retry_with_policy, RetryPolicy};

use super::api_client::{ApiError, ExerciseApi};
use super::capture_service::{AudioCapture, CaptureError, CaptureHandle};
use super::identity::TokenProvider;
use super::playback_service::{self, PlaybackTimer};
use super::session::{EngineError, ExerciseSession};
use super::vocabulary_service;
use super::EngineEvent;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Async driver around the pure `ExerciseSession` machine: it owns the I/O
/// (collaborator calls, the capture resource, the playback task) and feeds
/// outcomes back into the machine as events. One instance per module visit.
///
/// Fetch and submission are split into a synchronous `begin_*` (guards, phase
/// move) and `finish_*` (outcome application) around a single awaited
/// request; the `load`/`submit` wrappers are what presentations normally
/// call. The split keeps every transition synchronously testable and lets a
/// stale completion be recognized by its generation.
pub struct ExerciseService {
    session: ExerciseSession,
    api: Arc<dyn ExerciseApi>,
    identity: Arc<dyn TokenProvider>,
    capture: Box<dyn AudioCapture>,
    capture_handle: Option<CaptureHandle>,
    events: broadcast::Sender<EngineEvent>,
    generation: u64,
    in_flight: bool,
    retry_policy: RetryPolicy,
    playback_speed: f64,
    playback_tick: Duration,
    playback_finished: Option<Arc<AtomicBool>>,
    playback_task: Option<JoinHandle<()>>,
}

impl ExerciseService {
    pub fn new(
        module: ModuleKind,
        api: Arc<dyn ExerciseApi>,
        identity: Arc<dyn TokenProvider>,
        capture: Box<dyn AudioCapture>,
        config: &Config,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            session: ExerciseSession::new(module, config.playback_gate),
            api,
            identity,
            capture,
            capture_handle: None,
            events,
            generation: 0,
            in_flight: false,
            retry_policy: RetryPolicy::default(),
            playback_speed: 1.0,
            playback_tick: Duration::from_millis(config.playback_tick_ms),
            playback_finished: None,
            playback_task: None,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn module(&self) -> ModuleKind {
        self.session.module()
    }

    pub fn phase(&self) -> AttemptPhase {
        self.session.phase()
    }

    /// Read-only view of the machine for rendering.
    pub fn session(&self) -> &ExerciseSession {
        &self.session
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn notify_phase(&self) {
        let _ = self.events.send(EngineEvent::PhaseChanged {
            phase: self.session.phase(),
        });
    }

    // ---- fetching -------------------------------------------------------

    /// Guards and enters `Loading`, returning the generation the eventual
    /// completion must present.
    pub fn begin_fetch(&mut self) -> Result<u64, EngineError> {
        if self.in_flight {
            return Err(EngineError::RequestInFlight);
        }
        if !self.identity.is_authenticated() {
            return Err(EngineError::Unauthenticated);
        }
        self.session.begin_loading()?;
        self.stop_playback();
        self.release_capture();
        self.in_flight = true;
        self.notify_phase();
        Ok(self.generation)
    }

    /// Applies a fetch outcome. A completion from a generation that has been
    /// abandoned is dropped without touching the machine.
    pub fn finish_fetch(
        &mut self,
        generation: u64,
        outcome: Result<ExerciseContent, ApiError>,
    ) -> Result<AttemptPhase, EngineError> {
        if generation != self.generation {
            tracing::debug!(
                "Dropping stale fetch completion (generation {} superseded by {})",
                generation,
                self.generation
            );
            return Ok(self.session.phase());
        }
        self.in_flight = false;
        match outcome {
            Ok(content) => {
                metrics::record_fetch(self.module().as_str(), true);
                tracing::info!(
                    "Fetched {} exercise {}",
                    self.module(),
                    content.id()
                );
                let phase = self.session.exercise_ready(content, Utc::now())?;
                self.notify_phase();
                Ok(phase)
            }
            Err(e) => {
                metrics::record_fetch(self.module().as_str(), false);
                tracing::warn!("Exercise fetch failed: {}", e);
                self.session.loading_failed()?;
                self.notify_phase();
                Err(EngineError::Fetch(e))
            }
        }
    }

    /// Fetches the next exercise (or, for reading, the article with the
    /// given content id). Idempotent fetches retry with backoff before the
    /// failure surfaces.
    pub async fn load(&mut self, content_id: Option<&str>) -> Result<AttemptPhase, EngineError> {
        let generation = self.begin_fetch()?;
        let api = Arc::clone(&self.api);
        let module = self.module();
        let content_id = content_id.map(str::to_string);
        let outcome = retry_with_policy(self.retry_policy.clone(), || {
            let api = Arc::clone(&api);
            let content_id = content_id.clone();
            async move { api.fetch_exercise(module, content_id.as_deref()).await }
        })
        .await;
        self.finish_fetch(generation, outcome)
    }

    /// Browses the reading library without touching the attempt lifecycle.
    pub async fn library(&self) -> Result<Vec<ArticleSummary>, EngineError> {
        if !self.identity.is_authenticated() {
            return Err(EngineError::Unauthenticated);
        }
        self.api.fetch_library().await.map_err(EngineError::Fetch)
    }

    // ---- capturing ------------------------------------------------------

    /// Acquires the microphone and starts recording (speaking only). A
    /// second take while presenting a previous one simply records over it
    /// once stopped.
    pub fn start_capture(&mut self) -> Result<AttemptPhase, EngineError> {
        if self.module() != ModuleKind::Speaking {
            return Err(EngineError::WrongModule(self.module()));
        }
        if !matches!(
            self.phase(),
            AttemptPhase::Presenting | AttemptPhase::Capturing
        ) {
            return Err(TransitionError {
                from: self.phase(),
                to: AttemptPhase::Capturing,
            }
            .into());
        }
        if self.capture_handle.is_some() {
            return Err(CaptureError::AlreadyActive.into());
        }
        match self.capture.start() {
            Ok(handle) => {
                self.capture_handle = Some(handle);
            }
            Err(e) => {
                CAPTURE_FAILURES_TOTAL
                    .with_label_values(&["acquire"])
                    .inc();
                tracing::warn!("Audio capture unavailable: {}", e);
                return Err(e.into());
            }
        }
        if self.phase() == AttemptPhase::Presenting {
            self.session.begin_capture()?;
            self.notify_phase();
        }
        Ok(self.phase())
    }

    /// Stops the recording, finalizes the artifact into the attempt and
    /// releases the microphone.
    pub fn stop_capture(&mut self) -> Result<AudioArtifact, EngineError> {
        let handle = self
            .capture_handle
            .take()
            .ok_or(CaptureError::NotActive)?;
        let artifact = self.capture.stop(handle)?;
        tracing::debug!(
            "Capture stopped: {} bytes at {} Hz",
            artifact.byte_len(),
            artifact.sample_rate()
        );
        self.session.capture_stopped(artifact.clone())?;
        Ok(artifact)
    }

    fn release_capture(&mut self) {
        if let Some(handle) = self.capture_handle.take() {
            tracing::debug!("Releasing active audio capture");
            self.capture.release(handle);
        }
    }

    // ---- answering ------------------------------------------------------

    /// Stores one answer, implicitly entering `Capturing` on the first one.
    pub fn record_answer(
        &mut self,
        index: usize,
        answer: impl Into<String>,
    ) -> Result<(), EngineError> {
        if self.module() == ModuleKind::Listening {
            // Fold the playback task's completion flag into the gate first.
            self.sync_playback();
        }
        let before = self.phase();
        self.session.record_answer(index, answer)?;
        if self.phase() != before {
            self.notify_phase();
        }
        Ok(())
    }

    /// Resolves a definition for a clicked word and counts the lookup
    /// (reading only). Clicks on non-words are ignored.
    pub fn lookup_word(&mut self, word: &str) -> Result<Option<&'static str>, EngineError> {
        let (canonical, definition) = vocabulary_service::lookup(word);
        if canonical.is_empty() {
            return Ok(None);
        }
        let count = self.session.record_lookup(canonical.clone())?;
        metrics::record_lookup(definition.is_some());
        tracing::debug!("Vocabulary lookup #{} for '{}'", count, canonical);
        Ok(definition)
    }

    // ---- playback -------------------------------------------------------

    pub fn set_playback_speed(&mut self, speed: f64) {
        self.playback_speed = playback_service::clamp_speed(speed);
    }

    pub fn playback_speed(&self) -> f64 {
        self.playback_speed
    }

    /// Starts (or restarts) the simulated playback for the presented
    /// listening challenge. Progress events arrive on the event channel and
    /// completion unlocks the questions under the strict gate.
    pub fn start_playback(&mut self) -> Result<(), EngineError> {
        if self.module() != ModuleKind::Listening {
            return Err(EngineError::WrongModule(self.module()));
        }
        if !matches!(
            self.phase(),
            AttemptPhase::Presenting | AttemptPhase::Capturing
        ) {
            return Err(TransitionError {
                from: self.phase(),
                to: AttemptPhase::Presenting,
            }
            .into());
        }
        let (exercise_id, duration) = match self.session.exercise() {
            Some(exercise) => (
                exercise.id().to_string(),
                exercise.declared_duration().unwrap_or(0),
            ),
            None => {
                return Err(TransitionError {
                    from: self.phase(),
                    to: AttemptPhase::Presenting,
                }
                .into())
            }
        };

        // Replaying keeps an already-earned unlock.
        if let Some(task) = self.playback_task.take() {
            task.abort();
        }
        let finished = self
            .playback_finished
            .get_or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone();
        let timer = PlaybackTimer::new(duration, self.playback_speed);
        tracing::debug!(
            "Starting playback for {} ({}s at {:.1}x)",
            exercise_id,
            duration,
            self.playback_speed
        );
        self.playback_task = Some(playback_service::spawn_progress(
            exercise_id,
            timer,
            self.playback_tick,
            self.events.clone(),
            finished,
        ));
        Ok(())
    }

    /// Folds the playback task's completion flag into the machine and
    /// reports whether questions are unlocked.
    pub fn sync_playback(&mut self) -> bool {
        if let Some(flag) = &self.playback_finished {
            if flag.load(Ordering::SeqCst) {
                self.session.playback_completed();
            }
        }
        self.session.questions_unlocked()
    }

    /// Explicit user override of the strict gate.
    pub fn unlock_questions(&mut self) {
        self.session.playback_completed();
    }

    fn stop_playback(&mut self) {
        if let Some(task) = self.playback_task.take() {
            task.abort();
        }
        self.playback_finished = None;
    }

    // ---- submitting -----------------------------------------------------

    /// Passes the completeness gate, enters `Submitting` and hands back the
    /// payload plus the generation its completion must present.
    pub fn begin_submit(&mut self) -> Result<(u64, AttemptSubmission), EngineError> {
        if self.in_flight {
            return Err(EngineError::RequestInFlight);
        }
        if !self.identity.is_authenticated() {
            return Err(EngineError::Unauthenticated);
        }
        let resubmission = self.phase() == AttemptPhase::Failed(FailureStage::Submit);
        let submission = self.session.begin_submitting(Utc::now())?;
        // The microphone is never held past this point.
        self.release_capture();
        if resubmission {
            SUBMISSION_RETRIES_TOTAL
                .with_label_values(&[self.module().as_str()])
                .inc();
        }
        self.in_flight = true;
        self.notify_phase();
        Ok((self.generation, submission))
    }

    /// Applies a submission outcome; stale completions are dropped. On
    /// failure the attempt is preserved for a user-triggered resubmission.
    pub fn finish_submit(
        &mut self,
        generation: u64,
        outcome: Result<ExerciseResult, ApiError>,
    ) -> Result<AttemptPhase, EngineError> {
        if generation != self.generation {
            tracing::debug!(
                "Dropping stale submit completion (generation {} superseded by {})",
                generation,
                self.generation
            );
            return Ok(self.session.phase());
        }
        self.in_flight = false;
        match outcome {
            Ok(result) => {
                metrics::record_submission(self.module().as_str(), true);
                tracing::info!(
                    "Attempt scored {:.0} (+{} XP)",
                    result.score,
                    result.xp_earned
                );
                let phase = self.session.submission_succeeded(result)?;
                self.notify_phase();
                Ok(phase)
            }
            Err(e) => {
                metrics::record_submission(self.module().as_str(), false);
                tracing::warn!("Attempt submission failed: {}", e);
                self.session.submission_failed()?;
                self.notify_phase();
                Err(EngineError::Submission(e))
            }
        }
    }

    /// Submits the current attempt. Also the resubmission path after a
    /// submission failure: the preserved attempt goes out unchanged.
    pub async fn submit(&mut self) -> Result<AttemptPhase, EngineError> {
        let (generation, submission) = self.begin_submit()?;
        let api = Arc::clone(&self.api);
        let outcome = api.submit_attempt(&submission).await;
        self.finish_submit(generation, outcome)
    }

    // ---- result screen --------------------------------------------------

    /// "Try Again": same exercise, fresh attempt, playback locked again.
    pub fn retry(&mut self) -> Result<AttemptPhase, EngineError> {
        let phase = self.session.retry(Utc::now())?;
        self.stop_playback();
        self.release_capture();
        self.notify_phase();
        Ok(phase)
    }

    /// "Next": discards the shown exercise and fetches a new one.
    pub async fn next(&mut self) -> Result<AttemptPhase, EngineError> {
        self.load(None).await
    }

    /// Navigation away. Any outstanding completion becomes stale, the
    /// microphone and playback are released, the machine returns to idle.
    pub fn abandon(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.in_flight = false;
        self.stop_playback();
        self.release_capture();
        self.session.reset();
        self.notify_phase();
        tracing::debug!("Abandoned {} session", self.module());
    }
}

impl Drop for ExerciseService {
    fn drop(&mut self) {
        // The capture resource must not outlive the module visit.
        self.release_capture();
        if let Some(task) = self.playback_task.take() {
            task.abort();
        }
    }
}
