#![allow(dead_code)]

//! Client-side engine for the Elysian language-learning app: the exercise
//! attempt state machine behind the Speak / Listen / Read modules, the typed
//! client for the backend API, and the capture/playback auxiliaries. The
//! presentation layer (whatever renders it) subscribes to engine events and
//! calls the session operations; it never talks to the backend directly.

pub mod config;
pub mod metrics;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{Config, PlaybackGate};
pub use services::{EngineError, EngineEvent, EngineState, ExerciseService};
