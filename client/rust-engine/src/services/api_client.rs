use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::Config;
use crate::metrics::API_REQUEST_DURATION_SECONDS;
use crate::models::attempt::AttemptSubmission;
use crate::models::exercise::{
    ArticleSummary, ExerciseContent, ListeningChallenge, ReadingArticle, SpeakingExercise,
};
use crate::models::result::{ExerciseResult, SpeakingAnalysis};
use crate::models::ModuleKind;

use super::identity::TokenProvider;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("could not decode backend response: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("reading library returned no articles")]
    EmptyLibrary,
}

/// The backend API as the engine sees it: fetch one exercise, submit one
/// attempt, browse the reading library. Implementations own transport,
/// authentication headers and wire formats.
#[async_trait]
pub trait ExerciseApi: Send + Sync {
    async fn fetch_exercise(
        &self,
        module: ModuleKind,
        content_id: Option<&str>,
    ) -> Result<ExerciseContent, ApiError>;

    async fn submit_attempt(
        &self,
        submission: &AttemptSubmission,
    ) -> Result<ExerciseResult, ApiError>;

    async fn fetch_library(&self) -> Result<Vec<ArticleSummary>, ApiError>;
}

/// Production implementation talking to the Elysian FastAPI backend.
pub struct HttpExerciseApi {
    http: Client,
    base_url: Url,
    identity: Arc<dyn TokenProvider>,
    timeout: Duration,
}

impl HttpExerciseApi {
    pub fn new(config: &Config, identity: Arc<dyn TokenProvider>) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.api_base_url)?;
        Ok(Self {
            http: Client::new(),
            base_url,
            identity,
            timeout: Duration::from_secs(config.request_timeout_seconds),
        })
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(path);
        url
    }

    /// Resolves the bearer token at call time so a refreshed token is used
    /// without rebuilding the client.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.identity.current_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.get(self.endpoint(path)).timeout(self.timeout))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.http.post(self.endpoint(path)).timeout(self.timeout))
    }

    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        response.json::<T>().await.map_err(ApiError::Decode)
    }
}

#[async_trait]
impl ExerciseApi for HttpExerciseApi {
    async fn fetch_exercise(
        &self,
        module: ModuleKind,
        content_id: Option<&str>,
    ) -> Result<ExerciseContent, ApiError> {
        let _timer = API_REQUEST_DURATION_SECONDS
            .with_label_values(&["fetch", module.as_str()])
            .start_timer();

        match (module, content_id) {
            (ModuleKind::Speaking, _) => {
                tracing::debug!("Fetching speaking exercise");
                let response = self.get("/api/speak/exercise").send().await?;
                let exercise: SpeakingExercise = Self::decode(Self::check(response).await?).await?;
                Ok(ExerciseContent::Speaking(exercise))
            }
            (ModuleKind::Listening, _) => {
                tracing::debug!("Fetching listening challenge");
                let response = self.get("/api/listen/challenge").send().await?;
                let challenge: ListeningChallenge =
                    Self::decode(Self::check(response).await?).await?;
                Ok(ExerciseContent::Listening(challenge))
            }
            (ModuleKind::Reading, Some(id)) => {
                tracing::debug!("Fetching reading article: {}", id);
                let response = self.get(&format!("/api/read/article/{}", id)).send().await?;
                let article: ReadingArticle = Self::decode(Self::check(response).await?).await?;
                Ok(ExerciseContent::Reading(article))
            }
            (ModuleKind::Reading, None) => {
                // No selection yet: take the first personalized library entry.
                tracing::debug!("Fetching reading library for default article");
                let response = self.get("/api/read/library").send().await?;
                let library: LibraryResponse = Self::decode(Self::check(response).await?).await?;
                library
                    .articles
                    .into_iter()
                    .next()
                    .map(ExerciseContent::Reading)
                    .ok_or(ApiError::EmptyLibrary)
            }
        }
    }

    async fn submit_attempt(
        &self,
        submission: &AttemptSubmission,
    ) -> Result<ExerciseResult, ApiError> {
        let module = submission.module();
        let _timer = API_REQUEST_DURATION_SECONDS
            .with_label_values(&["submit", module.as_str()])
            .start_timer();
        tracing::debug!(
            "Submitting {} attempt for exercise {}",
            module,
            submission.exercise_id()
        );

        match submission {
            AttemptSubmission::Speaking {
                kind,
                content,
                audio,
                ..
            } => {
                let payload = SpeakingSubmissionRequest {
                    exercise_type: kind.as_str(),
                    content,
                    audio_data: audio.to_base64(),
                };
                let response = self.post("/api/speak/submit").json(&payload).send().await?;
                let analysis: SpeakingSubmitResponse =
                    Self::decode(Self::check(response).await?).await?;
                Ok(unify_speaking(analysis))
            }
            AttemptSubmission::Listening {
                content_id,
                answers,
            } => {
                let payload = ListeningSubmissionRequest {
                    content_id,
                    answers,
                };
                let response = self.post("/api/listen/submit").json(&payload).send().await?;
                Self::decode(Self::check(response).await?).await
            }
            AttemptSubmission::Reading {
                content_id,
                reading_seconds,
                answers,
                vocabulary_lookups,
            } => {
                let payload = ReadingSubmissionRequest {
                    content_id,
                    reading_time: *reading_seconds,
                    comprehension_answers: answers,
                    vocabulary_lookups,
                };
                let response = self.post("/api/read/submit").json(&payload).send().await?;
                Self::decode(Self::check(response).await?).await
            }
        }
    }

    async fn fetch_library(&self) -> Result<Vec<ArticleSummary>, ApiError> {
        let _timer = API_REQUEST_DURATION_SECONDS
            .with_label_values(&["fetch", "library"])
            .start_timer();
        let response = self.get("/api/read/library").send().await?;
        let library: LibraryResponse = Self::decode(Self::check(response).await?).await?;
        Ok(library
            .articles
            .into_iter()
            .map(|article| ArticleSummary {
                id: article.id,
                title: article.title,
                cefr_level: article.cefr_level,
                topic: article.topic,
                word_count: article.word_count,
                estimated_reading_time: article.estimated_reading_time,
            })
            .collect())
    }
}

/// The speech endpoint predates the unified result shape; fold its analysis
/// payload into the common form so the result screen stays modality-agnostic.
fn unify_speaking(response: SpeakingSubmitResponse) -> ExerciseResult {
    ExerciseResult {
        score: response.pronunciation_score,
        detailed_results: Vec::new(),
        feedback: response.feedback,
        xp_earned: response.xp_earned,
        level_up: response.level_up,
        analysis: Some(SpeakingAnalysis {
            pronunciation_score: response.pronunciation_score,
            intonation_score: response.intonation_score,
            detailed_analysis: response.detailed_analysis,
        }),
    }
}

#[derive(Debug, Serialize)]
struct SpeakingSubmissionRequest<'a> {
    exercise_type: &'a str,
    content: &'a str,
    audio_data: String,
}

#[derive(Debug, Serialize)]
struct ListeningSubmissionRequest<'a> {
    content_id: &'a str,
    answers: &'a [String],
}

#[derive(Debug, Serialize)]
struct ReadingSubmissionRequest<'a> {
    content_id: &'a str,
    reading_time: u32,
    comprehension_answers: &'a [String],
    vocabulary_lookups: &'a [String],
}

#[derive(Debug, Deserialize)]
struct SpeakingSubmitResponse {
    pronunciation_score: f64,
    #[serde(default)]
    intonation_score: Option<f64>,
    feedback: String,
    #[serde(default)]
    detailed_analysis: serde_json::Value,
    #[serde(default)]
    xp_earned: u32,
    #[serde(default)]
    level_up: bool,
}

#[derive(Debug, Deserialize)]
struct LibraryResponse {
    articles: Vec<ReadingArticle>,
}
