use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::metrics::PLAYBACK_COMPLETIONS_TOTAL;
use crate::models::playback::{PlaybackEvent, PlaybackFinished, PlaybackTick};

use super::EngineEvent;

pub const MIN_SPEED: f64 = 0.5;
pub const MAX_SPEED: f64 = 2.0;

/// Speed multipliers outside the player's range are snapped back into it.
pub fn clamp_speed(speed: f64) -> f64 {
    if !speed.is_finite() {
        return 1.0;
    }
    speed.clamp(MIN_SPEED, MAX_SPEED)
}

/// Pure playback progress: a position advancing at `speed` seconds of audio
/// per wall-clock second until the declared duration is reached. The stream
/// below drives it; tests can drive it directly.
#[derive(Debug, Clone)]
pub struct PlaybackTimer {
    total_seconds: u32,
    speed: f64,
    position: f64,
    finished: bool,
}

impl PlaybackTimer {
    pub fn new(total_seconds: u32, speed: f64) -> Self {
        Self {
            total_seconds,
            speed: clamp_speed(speed),
            position: 0.0,
            finished: total_seconds == 0,
        }
    }

    /// Advances by one wall-clock delta. Returns true on the tick that
    /// reaches the end of the content.
    pub fn tick(&mut self, delta: Duration) -> bool {
        if self.finished {
            return false;
        }
        self.position += delta.as_secs_f64() * self.speed;
        if self.position >= self.total_seconds as f64 {
            self.position = self.total_seconds as f64;
            self.finished = true;
            return true;
        }
        false
    }

    pub fn position_seconds(&self) -> f64 {
        self.position
    }

    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Create a stream of playback progress events, one per tick period, ending
/// with the finish event.
pub fn progress_stream(
    exercise_id: String,
    timer: PlaybackTimer,
    tick_period: Duration,
) -> impl Stream<Item = PlaybackEvent> {
    stream::unfold(
        (exercise_id, timer, false),
        move |(id, mut timer, final_sent)| async move {
            if final_sent {
                return None;
            }
            sleep(tick_period).await;
            let done = timer.tick(tick_period);
            let event = if done {
                PlaybackEvent::PlaybackFinished(PlaybackFinished {
                    exercise_id: id.clone(),
                    total_seconds: timer.total_seconds(),
                    timestamp: Utc::now(),
                })
            } else {
                PlaybackEvent::PlaybackTick(PlaybackTick {
                    exercise_id: id.clone(),
                    position_seconds: timer.position_seconds(),
                    total_seconds: timer.total_seconds(),
                    speed: timer.speed(),
                    timestamp: Utc::now(),
                })
            };
            Some((event, (id, timer, done)))
        },
    )
}

/// Forwards the progress stream onto the session event channel and raises
/// `finished` when the content runs out. The flag is shared with the session
/// driver, which folds it into the question gate.
pub fn spawn_progress(
    exercise_id: String,
    timer: PlaybackTimer,
    tick_period: Duration,
    events: broadcast::Sender<EngineEvent>,
    finished: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if timer.is_finished() {
            finished.store(true, Ordering::SeqCst);
            return;
        }
        let mut progress = Box::pin(progress_stream(exercise_id.clone(), timer, tick_period));
        while let Some(event) = progress.next().await {
            let done = matches!(event, PlaybackEvent::PlaybackFinished(_));
            if done {
                // Raise the flag before notifying so a subscriber reacting
                // to the finish event already sees the questions unlocked.
                finished.store(true, Ordering::SeqCst);
                PLAYBACK_COMPLETIONS_TOTAL.with_label_values(&["listen"]).inc();
            }
            let _ = events.send(EngineEvent::Playback(event));
            if done {
                tracing::debug!("Playback finished for exercise {}", exercise_id);
                break;
            }
        }
    })
}
