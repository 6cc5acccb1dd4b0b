use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::PlaybackGate;
use crate::models::attempt::{
    AttemptPhase, AttemptSubmission, AudioArtifact, ExerciseAttempt, FailureStage, TransitionError,
};
use crate::models::exercise::ExerciseContent;
use crate::models::result::ExerciseResult;
use crate::models::ModuleKind;

use super::api_client::ApiError;
use super::capture_service::CaptureError;

/// Everything that can go wrong while driving an exercise. Fetch and
/// submission failures carry their stage so the retry affordance matches;
/// none of these are fatal.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("exercise fetch failed: {0}")]
    Fetch(#[source] ApiError),
    #[error("attempt submission failed: {0}")]
    Submission(#[source] ApiError),
    #[error("{missing} answer(s) still required")]
    IncompleteAttempt { missing: usize },
    #[error("audio capture unavailable: {0}")]
    CaptureUnavailable(#[from] CaptureError),
    #[error("no signed-in user")]
    Unauthenticated,
    #[error("another request is already in flight")]
    RequestInFlight,
    #[error("playback has not finished yet")]
    PlaybackLocked,
    #[error("question index {index} is out of range")]
    UnknownQuestion { index: usize },
    #[error("operation not available in the {0} module")]
    WrongModule(ModuleKind),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// The exercise attempt state machine. Synchronous and side-effect free:
/// fetch and submission outcomes are fed in as events by `ExerciseService`,
/// which owns the actual I/O. One instance drives one module visit.
pub struct ExerciseSession {
    module: ModuleKind,
    gate: PlaybackGate,
    phase: AttemptPhase,
    exercise: Option<ExerciseContent>,
    attempt: Option<ExerciseAttempt>,
    result: Option<ExerciseResult>,
    playback_finished: bool,
}

impl ExerciseSession {
    pub fn new(module: ModuleKind, gate: PlaybackGate) -> Self {
        Self {
            module,
            gate,
            phase: AttemptPhase::Idle,
            exercise: None,
            attempt: None,
            result: None,
            playback_finished: false,
        }
    }

    pub fn module(&self) -> ModuleKind {
        self.module
    }

    pub fn phase(&self) -> AttemptPhase {
        self.phase
    }

    pub fn exercise(&self) -> Option<&ExerciseContent> {
        self.exercise.as_ref()
    }

    pub fn attempt(&self) -> Option<&ExerciseAttempt> {
        self.attempt.as_ref()
    }

    pub fn result(&self) -> Option<&ExerciseResult> {
        self.result.as_ref()
    }

    /// Whether comprehension questions are answerable. Only the listening
    /// module under the strict gate ever locks them.
    pub fn questions_unlocked(&self) -> bool {
        match self.module {
            ModuleKind::Listening => {
                self.gate == PlaybackGate::Lenient || self.playback_finished
            }
            _ => true,
        }
    }

    fn move_to(&mut self, next: AttemptPhase) -> Result<AttemptPhase, TransitionError> {
        if !self.phase.can_transition_to(next) {
            return Err(TransitionError {
                from: self.phase,
                to: next,
            });
        }
        tracing::debug!(
            "Session {} phase: {} -> {}",
            self.module,
            self.phase.as_str(),
            next.as_str()
        );
        self.phase = next;
        Ok(next)
    }

    /// Enters `Loading` for a fresh exercise: on module entry, on fetch
    /// retry, and on "next" from the result screen. Whatever was shown
    /// before is discarded.
    pub fn begin_loading(&mut self) -> Result<AttemptPhase, EngineError> {
        let phase = self.move_to(AttemptPhase::Loading)?;
        self.exercise = None;
        self.attempt = None;
        self.result = None;
        self.playback_finished = false;
        Ok(phase)
    }

    /// Successful fetch: present the content with a fresh, empty attempt.
    pub fn exercise_ready(
        &mut self,
        exercise: ExerciseContent,
        now: DateTime<Utc>,
    ) -> Result<AttemptPhase, EngineError> {
        let phase = self.move_to(AttemptPhase::Presenting)?;
        self.attempt = Some(ExerciseAttempt::new(&exercise, now));
        self.exercise = Some(exercise);
        self.playback_finished = false;
        Ok(phase)
    }

    pub fn loading_failed(&mut self) -> Result<AttemptPhase, EngineError> {
        Ok(self.move_to(AttemptPhase::Failed(FailureStage::Fetch))?)
    }

    /// The learner starts responding. For listening under the strict gate
    /// this is refused until playback completed.
    pub fn begin_capture(&mut self) -> Result<AttemptPhase, EngineError> {
        if self.module == ModuleKind::Listening && !self.questions_unlocked() {
            return Err(EngineError::PlaybackLocked);
        }
        Ok(self.move_to(AttemptPhase::Capturing)?)
    }

    /// Stores one answer. Entering the first answer implicitly begins the
    /// capture phase for the question modules.
    pub fn record_answer(
        &mut self,
        index: usize,
        answer: impl Into<String>,
    ) -> Result<(), EngineError> {
        if self.module == ModuleKind::Speaking {
            return Err(EngineError::WrongModule(self.module));
        }
        let required = self
            .exercise
            .as_ref()
            .map(ExerciseContent::required_answers)
            .unwrap_or(0);
        if index >= required {
            return Err(EngineError::UnknownQuestion { index });
        }
        if self.phase == AttemptPhase::Presenting {
            self.begin_capture()?;
        }
        if self.phase != AttemptPhase::Capturing {
            return Err(TransitionError {
                from: self.phase,
                to: AttemptPhase::Capturing,
            }
            .into());
        }
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.record_answer(index, answer);
        }
        Ok(())
    }

    /// Counts a vocabulary lookup against the current attempt (reading only)
    /// and returns the new per-word count. Allowed while presenting or
    /// capturing; it never transitions state.
    pub fn record_lookup(&mut self, word: impl Into<String>) -> Result<u32, EngineError> {
        if self.module != ModuleKind::Reading {
            return Err(EngineError::WrongModule(self.module));
        }
        if !matches!(
            self.phase,
            AttemptPhase::Presenting | AttemptPhase::Capturing
        ) {
            return Err(TransitionError {
                from: self.phase,
                to: AttemptPhase::Capturing,
            }
            .into());
        }
        match self.attempt.as_mut() {
            Some(attempt) => Ok(attempt.record_lookup(word)),
            None => Err(TransitionError {
                from: self.phase,
                to: AttemptPhase::Capturing,
            }
            .into()),
        }
    }

    /// A finalized recording replaces any previous artifact (speaking only).
    pub fn capture_stopped(&mut self, artifact: AudioArtifact) -> Result<(), EngineError> {
        if self.module != ModuleKind::Speaking {
            return Err(EngineError::WrongModule(self.module));
        }
        if self.phase != AttemptPhase::Capturing {
            return Err(TransitionError {
                from: self.phase,
                to: AttemptPhase::Capturing,
            }
            .into());
        }
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.set_audio(artifact);
        }
        Ok(())
    }

    pub fn missing_answers(&self) -> usize {
        self.attempt
            .as_ref()
            .map(ExerciseAttempt::missing_answers)
            .unwrap_or(0)
    }

    /// The completeness gate as the submit control sees it.
    pub fn can_submit(&self) -> bool {
        matches!(
            self.phase,
            AttemptPhase::Capturing | AttemptPhase::Failed(FailureStage::Submit)
        ) && self
            .attempt
            .as_ref()
            .map(ExerciseAttempt::is_complete)
            .unwrap_or(false)
    }

    /// Passes the completeness gate and enters `Submitting`, returning the
    /// payload to send. The gate is checked before the phase moves, so an
    /// incomplete attempt leaves the machine where it was.
    pub fn begin_submitting(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<AttemptSubmission, EngineError> {
        let (exercise, attempt) = match (self.exercise.as_ref(), self.attempt.as_ref()) {
            (Some(exercise), Some(attempt)) => (exercise, attempt),
            _ => {
                return Err(TransitionError {
                    from: self.phase,
                    to: AttemptPhase::Submitting,
                }
                .into())
            }
        };
        let missing = attempt.missing_answers();
        if missing > 0 {
            return Err(EngineError::IncompleteAttempt { missing });
        }

        let submission = match exercise {
            ExerciseContent::Speaking(e) => AttemptSubmission::Speaking {
                exercise_id: e.id.clone(),
                kind: e.kind,
                content: e.content.clone(),
                audio: attempt
                    .audio()
                    .cloned()
                    .ok_or(EngineError::IncompleteAttempt { missing: 1 })?,
            },
            ExerciseContent::Listening(c) => AttemptSubmission::Listening {
                content_id: c.id.clone(),
                answers: attempt.ordered_answers(),
            },
            ExerciseContent::Reading(a) => AttemptSubmission::Reading {
                content_id: a.id.clone(),
                reading_seconds: attempt.reading_seconds(now),
                answers: attempt.ordered_answers(),
                vocabulary_lookups: attempt.distinct_lookups(),
            },
        };

        self.move_to(AttemptPhase::Submitting)?;
        Ok(submission)
    }

    pub fn submission_succeeded(
        &mut self,
        result: ExerciseResult,
    ) -> Result<AttemptPhase, EngineError> {
        let phase = self.move_to(AttemptPhase::ShowingResult)?;
        self.result = Some(result);
        Ok(phase)
    }

    /// Failed submission: the attempt is left untouched so the learner can
    /// retry without redoing anything.
    pub fn submission_failed(&mut self) -> Result<AttemptPhase, EngineError> {
        Ok(self.move_to(AttemptPhase::Failed(FailureStage::Submit))?)
    }

    /// "Try again": same exercise, fresh empty attempt, playback locked
    /// again for listening.
    pub fn retry(&mut self, now: DateTime<Utc>) -> Result<AttemptPhase, EngineError> {
        let exercise = match self.exercise.as_ref() {
            Some(exercise) => exercise,
            None => {
                return Err(TransitionError {
                    from: self.phase,
                    to: AttemptPhase::Presenting,
                }
                .into())
            }
        };
        let fresh = ExerciseAttempt::new(exercise, now);
        let phase = self.move_to(AttemptPhase::Presenting)?;
        self.attempt = Some(fresh);
        self.result = None;
        self.playback_finished = false;
        Ok(phase)
    }

    /// Leaves the module. Always legal; everything is dropped.
    pub fn reset(&mut self) -> AttemptPhase {
        self.phase = AttemptPhase::Idle;
        self.exercise = None;
        self.attempt = None;
        self.result = None;
        self.playback_finished = false;
        self.phase
    }

    /// The playback completion signal (or the explicit user override).
    pub fn playback_completed(&mut self) {
        self.playback_finished = true;
    }
}
