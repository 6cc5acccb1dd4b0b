use serde::{Deserialize, Serialize};

use super::{CefrLevel, ModuleKind};

/// Variants of the speaking exercise, from single words up to full shadowing
/// passages. The backend weights the selection by the learner's CEFR level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakingKind {
    Word,
    Sentence,
    Shadowing,
}

impl SpeakingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeakingKind::Word => "word",
            SpeakingKind::Sentence => "sentence",
            SpeakingKind::Shadowing => "shadowing",
        }
    }
}

/// A pronunciation exercise: text the learner reads aloud.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakingExercise {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SpeakingKind,
    pub content: String,
    pub difficulty_level: u8,
    #[serde(default)]
    pub cefr_level: CefrLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    OpenEnded,
}

/// A comprehension question. The expected answer stays on the server; the
/// client only ever sees the prompt and, for multiple choice, the options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

/// A listening challenge: narrated content plus comprehension questions.
/// `duration` is the declared audio length in seconds and drives the
/// playback progress timer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListeningChallenge {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub transcript: String,
    pub questions: Vec<Question>,
    pub duration: u32,
    #[serde(default)]
    pub topic: Option<String>,
}

/// A reading article with interactive vocabulary and comprehension questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingArticle {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub cefr_level: CefrLevel,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub word_count: u32,
    #[serde(default)]
    pub estimated_reading_time: u32,
    #[serde(default)]
    pub vocabulary_highlights: Vec<String>,
    pub comprehension_questions: Vec<Question>,
}

/// Library entry shown when the learner browses articles before picking one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub cefr_level: CefrLevel,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub word_count: u32,
    #[serde(default)]
    pub estimated_reading_time: u32,
}

/// One fetched exercise payload, whichever module it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExerciseContent {
    Speaking(SpeakingExercise),
    Listening(ListeningChallenge),
    Reading(ReadingArticle),
}

impl ExerciseContent {
    pub fn id(&self) -> &str {
        match self {
            ExerciseContent::Speaking(e) => &e.id,
            ExerciseContent::Listening(c) => &c.id,
            ExerciseContent::Reading(a) => &a.id,
        }
    }

    pub fn module(&self) -> ModuleKind {
        match self {
            ExerciseContent::Speaking(_) => ModuleKind::Speaking,
            ExerciseContent::Listening(_) => ModuleKind::Listening,
            ExerciseContent::Reading(_) => ModuleKind::Reading,
        }
    }

    /// Comprehension questions, empty for the speaking module.
    pub fn questions(&self) -> &[Question] {
        match self {
            ExerciseContent::Speaking(_) => &[],
            ExerciseContent::Listening(c) => &c.questions,
            ExerciseContent::Reading(a) => &a.comprehension_questions,
        }
    }

    /// How many answer slots must be filled before submission.
    /// Speaking needs a single audio artifact instead of answers.
    pub fn required_answers(&self) -> usize {
        self.questions().len()
    }

    /// Declared audio duration, present only for listening challenges.
    pub fn declared_duration(&self) -> Option<u32> {
        match self {
            ExerciseContent::Listening(c) => Some(c.duration),
            _ => None,
        }
    }
}
