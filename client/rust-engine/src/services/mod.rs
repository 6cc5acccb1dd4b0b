use std::sync::Arc;

use crate::config::Config;
use crate::models::attempt::AttemptPhase;
use crate::models::playback::PlaybackEvent;
use crate::models::ModuleKind;

pub mod api_client;
pub mod capture_service;
pub mod exercise_service;
pub mod identity;
pub mod playback_service;
pub mod session;
pub mod vocabulary_service;

pub use exercise_service::ExerciseService;
pub use session::{EngineError, ExerciseSession};

use api_client::{ExerciseApi, HttpExerciseApi};
use capture_service::AudioCapture;
use identity::TokenProvider;

/// Notifications pushed to the presentation layer while a session runs.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    PhaseChanged { phase: AttemptPhase },
    Playback(PlaybackEvent),
}

/// Shared wiring for the whole client: configuration plus the two external
/// collaborators. Opened sessions borrow these; nothing here is module
/// specific.
pub struct EngineState {
    pub config: Config,
    pub api: Arc<dyn ExerciseApi>,
    pub identity: Arc<dyn TokenProvider>,
}

impl EngineState {
    /// Production wiring: HTTP backend client, environment-provided token.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let identity: Arc<dyn TokenProvider> =
            Arc::new(identity::EnvTokenProvider::default());
        let api: Arc<dyn ExerciseApi> =
            Arc::new(HttpExerciseApi::new(&config, identity.clone())?);
        tracing::info!("Engine initialized against {}", config.api_base_url);
        Ok(Self {
            config,
            api,
            identity,
        })
    }

    /// Custom collaborators, used by hosts that own their identity flow and
    /// by tests.
    pub fn with_collaborators(
        config: Config,
        api: Arc<dyn ExerciseApi>,
        identity: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            config,
            api,
            identity,
        }
    }

    pub fn open_session(&self, module: ModuleKind) -> ExerciseService {
        self.open_session_with_capture(module, default_capture())
    }

    pub fn open_session_with_capture(
        &self,
        module: ModuleKind,
        capture: Box<dyn AudioCapture>,
    ) -> ExerciseService {
        ExerciseService::new(
            module,
            self.api.clone(),
            self.identity.clone(),
            capture,
            &self.config,
        )
    }
}

#[cfg(feature = "microphone")]
fn default_capture() -> Box<dyn AudioCapture> {
    Box::new(capture_service::MicrophoneCapture::new())
}

#[cfg(not(feature = "microphone"))]
fn default_capture() -> Box<dyn AudioCapture> {
    // Without the microphone feature, speaking sessions record silence
    // unless the host supplies its own capture implementation.
    Box::new(capture_service::SimulatedCapture::new(16_000))
}
