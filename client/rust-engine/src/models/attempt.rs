use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::exercise::{ExerciseContent, SpeakingKind};
use super::ModuleKind;

/// Which asynchronous stage an attempt failed in. Surfaced to the user so a
/// failed fetch and a failed submission get different retry affordances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Fetch,
    Submit,
}

/// Lifecycle of one exercise presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPhase {
    Idle,
    Loading,
    Presenting,
    Capturing,
    Submitting,
    ShowingResult,
    Failed(FailureStage),
}

impl AttemptPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptPhase::Idle => "idle",
            AttemptPhase::Loading => "loading",
            AttemptPhase::Presenting => "presenting",
            AttemptPhase::Capturing => "capturing",
            AttemptPhase::Submitting => "submitting",
            AttemptPhase::ShowingResult => "showing_result",
            AttemptPhase::Failed(_) => "failed",
        }
    }

    /// Legal phase movements. Anything may fall back to `Idle` (the learner
    /// can always leave the module); everything else follows the attempt
    /// lifecycle, including the two failure re-entries.
    pub fn can_transition_to(&self, next: AttemptPhase) -> bool {
        use AttemptPhase as P;
        matches!(
            (self, next),
            (P::Idle, P::Loading)
                | (P::Loading, P::Presenting)
                | (P::Loading, P::Failed(FailureStage::Fetch))
                | (P::Presenting, P::Capturing)
                | (P::Capturing, P::Submitting)
                | (P::Submitting, P::ShowingResult)
                | (P::Submitting, P::Failed(FailureStage::Submit))
                | (P::ShowingResult, P::Presenting)
                | (P::ShowingResult, P::Loading)
                | (P::Failed(FailureStage::Fetch), P::Loading)
                | (P::Failed(FailureStage::Submit), P::Submitting)
                | (_, P::Idle)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot move from {from:?} to {to:?}")]
pub struct TransitionError {
    pub from: AttemptPhase,
    pub to: AttemptPhase,
}

/// Finalized audio produced by stopping a capture: PCM16 little-endian bytes
/// plus the rate they were recorded at. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    pcm: Vec<u8>,
    sample_rate: u32,
}

impl AudioArtifact {
    pub fn new(pcm: Vec<u8>, sample_rate: u32) -> Self {
        Self { pcm, sample_rate }
    }

    pub fn from_pcm16(samples: &[i16], sample_rate: u32) -> Self {
        let mut pcm = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            pcm.extend_from_slice(&sample.to_le_bytes());
        }
        Self { pcm, sample_rate }
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.pcm.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pcm
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        (self.pcm.len() / 2) as f64 / self.sample_rate as f64
    }

    /// Transport-safe form expected by the submission endpoint.
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.pcm)
    }
}

/// One learner response in progress: the mutable companion of a presented
/// exercise. Replaced wholesale on retry or advance, never reused.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseAttempt {
    pub id: String,
    pub exercise_id: String,
    pub module: ModuleKind,
    pub presented_at: DateTime<Utc>,
    required_answers: usize,
    answers: BTreeMap<usize, String>,
    audio: Option<AudioArtifact>,
    lookups: BTreeMap<String, u32>,
}

impl ExerciseAttempt {
    pub fn new(exercise: &ExerciseContent, presented_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            exercise_id: exercise.id().to_string(),
            module: exercise.module(),
            presented_at,
            required_answers: exercise.required_answers(),
            answers: BTreeMap::new(),
            audio: None,
            lookups: BTreeMap::new(),
        }
    }

    pub fn required_answers(&self) -> usize {
        self.required_answers
    }

    pub fn answers(&self) -> &BTreeMap<usize, String> {
        &self.answers
    }

    pub fn answer(&self, index: usize) -> Option<&str> {
        self.answers.get(&index).map(String::as_str)
    }

    /// Stores an answer for one question. A blank answer clears the slot so
    /// the completeness gate counts it as missing again.
    pub fn record_answer(&mut self, index: usize, answer: impl Into<String>) {
        let answer = answer.into();
        if answer.trim().is_empty() {
            self.answers.remove(&index);
        } else {
            self.answers.insert(index, answer);
        }
    }

    pub fn audio(&self) -> Option<&AudioArtifact> {
        self.audio.as_ref()
    }

    pub fn set_audio(&mut self, artifact: AudioArtifact) {
        self.audio = Some(artifact);
    }

    /// Increments the lookup counter for a word and returns the new count.
    pub fn record_lookup(&mut self, word: impl Into<String>) -> u32 {
        let counter = self.lookups.entry(word.into()).or_insert(0);
        *counter += 1;
        *counter
    }

    pub fn lookups(&self) -> &BTreeMap<String, u32> {
        &self.lookups
    }

    /// Distinct words looked up while reading; the backend wants the set,
    /// not the per-word counts.
    pub fn distinct_lookups(&self) -> Vec<String> {
        self.lookups.keys().cloned().collect()
    }

    pub fn reading_seconds(&self, now: DateTime<Utc>) -> u32 {
        (now - self.presented_at).num_seconds().max(0) as u32
    }

    fn answered_count(&self) -> usize {
        self.answers.keys().filter(|index| **index < self.required_answers).count()
    }

    /// How many required slots are still empty. For speaking that is one
    /// finalized, non-empty audio artifact; otherwise one answer per question.
    pub fn missing_answers(&self) -> usize {
        match self.module {
            ModuleKind::Speaking => match &self.audio {
                Some(artifact) if !artifact.is_empty() => 0,
                _ => 1,
            },
            ModuleKind::Listening | ModuleKind::Reading => {
                self.required_answers.saturating_sub(self.answered_count())
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing_answers() == 0
    }

    /// Answers in question order, blank-filled so the positional arrays the
    /// backend expects stay aligned even if something slipped past the gate.
    pub fn ordered_answers(&self) -> Vec<String> {
        (0..self.required_answers)
            .map(|index| self.answers.get(&index).cloned().unwrap_or_default())
            .collect()
    }
}

/// The payload of one submission request, ready for the API client.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptSubmission {
    Speaking {
        exercise_id: String,
        kind: SpeakingKind,
        content: String,
        audio: AudioArtifact,
    },
    Listening {
        content_id: String,
        answers: Vec<String>,
    },
    Reading {
        content_id: String,
        reading_seconds: u32,
        answers: Vec<String>,
        vocabulary_lookups: Vec<String>,
    },
}

impl AttemptSubmission {
    pub fn module(&self) -> ModuleKind {
        match self {
            AttemptSubmission::Speaking { .. } => ModuleKind::Speaking,
            AttemptSubmission::Listening { .. } => ModuleKind::Listening,
            AttemptSubmission::Reading { .. } => ModuleKind::Reading,
        }
    }

    pub fn exercise_id(&self) -> &str {
        match self {
            AttemptSubmission::Speaking { exercise_id, .. } => exercise_id,
            AttemptSubmission::Listening { content_id, .. } => content_id,
            AttemptSubmission::Reading { content_id, .. } => content_id,
        }
    }
}
