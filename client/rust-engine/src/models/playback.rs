use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress events emitted while a listening challenge "plays". The finish
/// event is what unlocks the comprehension questions under the strict gate.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PlaybackEvent {
    PlaybackTick(PlaybackTick),
    PlaybackFinished(PlaybackFinished),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlaybackTick {
    pub exercise_id: String,
    pub position_seconds: f64,
    pub total_seconds: u32,
    pub speed: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlaybackFinished {
    pub exercise_id: String,
    pub total_seconds: u32,
    pub timestamp: DateTime<Utc>,
}

impl PlaybackEvent {
    pub fn to_ui_payload(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            PlaybackEvent::PlaybackTick(_) => "playback-tick",
            PlaybackEvent::PlaybackFinished(_) => "playback-finished",
        }
    }
}
