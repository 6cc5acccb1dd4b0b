use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Whether comprehension questions stay locked until playback finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackGate {
    /// Questions unlock only on the playback-finished signal (default).
    Strict,
    /// Questions are answerable immediately.
    Lenient,
}

impl FromStr for PlaybackGate {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "strict" => Ok(PlaybackGate::Strict),
            "lenient" => Ok(PlaybackGate::Lenient),
            _ => Err(format!("Invalid playback gate: {}", value)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_seconds: u64,
    pub playback_gate: PlaybackGate,
    pub playback_tick_ms: u64,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        // Try root .env first, then fallback to local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            // Fallback to current directory .env for backward compatibility
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let config_builder = config::Config::builder()
            // Load base config from TOML file
            .add_source(
                config::File::with_name(&format!("config/{}", env)).required(false), // Allow missing config file, fallback to ENV
            )
            // Override with environment variables (prefix: APP_)
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let settings = config_builder.build()?;

        // Extract values with fallbacks to ENV or defaults
        let api_base_url = settings
            .get_string("api.base_url")
            .or_else(|_| env::var("ELYSIAN_API_URL"))
            .unwrap_or_else(|_| "http://localhost:8000".to_string());

        let request_timeout_seconds = settings
            .get_string("api.request_timeout_seconds")
            .ok()
            .or_else(|| env::var("ELYSIAN_API_TIMEOUT_SECONDS").ok())
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(30);

        let playback_gate = settings
            .get_string("playback.gate")
            .or_else(|_| env::var("PLAYBACK_GATE"))
            .ok()
            .map(|raw| {
                raw.parse::<PlaybackGate>().unwrap_or_else(|e| {
                    eprintln!("WARNING: {}, falling back to strict", e);
                    PlaybackGate::Strict
                })
            })
            .unwrap_or(PlaybackGate::Strict);

        let playback_tick_ms = settings
            .get_string("playback.tick_ms")
            .ok()
            .or_else(|| env::var("PLAYBACK_TICK_MS").ok())
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(1000);

        Ok(Config {
            api_base_url,
            request_timeout_seconds,
            playback_gate,
            playback_tick_ms,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            request_timeout_seconds: 30,
            playback_gate: PlaybackGate::Strict,
            playback_tick_ms: 1000,
        }
    }
}
