use serde::{Deserialize, Serialize};

/// Per-question grading detail echoed back by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerReview {
    pub question: String,
    pub user_answer: String,
    pub correct_answer: String,
    pub is_correct: bool,
}

/// Extra analysis the speech endpoint returns alongside the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakingAnalysis {
    pub pronunciation_score: f64,
    #[serde(default)]
    pub intonation_score: Option<f64>,
    #[serde(default)]
    pub detailed_analysis: serde_json::Value,
}

/// The scored outcome of one submitted attempt. Immutable: held while the
/// result screen is up, discarded on retry or advance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseResult {
    pub score: f64,
    #[serde(default)]
    pub detailed_results: Vec<AnswerReview>,
    pub feedback: String,
    #[serde(default)]
    pub xp_earned: u32,
    #[serde(default)]
    pub level_up: bool,
    /// Present for speaking submissions only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<SpeakingAnalysis>,
}

impl ExerciseResult {
    pub fn correct_count(&self) -> usize {
        self.detailed_results.iter().filter(|review| review.is_correct).count()
    }
}
