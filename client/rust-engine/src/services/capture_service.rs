use std::collections::VecDeque;

use thiserror::Error;

use crate::models::attempt::AudioArtifact;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no capture in progress")]
    NotActive,
    #[error("capture already in progress")]
    AlreadyActive,
    #[error("capture handle does not match the active capture")]
    StaleHandle,
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Proof of an acquired capture. Deliberately not Clone: whoever holds the
/// handle owns the microphone until it is stopped or released.
#[derive(Debug, PartialEq, Eq)]
pub struct CaptureHandle {
    id: u64,
}

impl CaptureHandle {
    fn new(id: u64) -> Self {
        Self { id }
    }
}

/// Capability seam over the platform audio subsystem. One capture may be
/// active at a time; `stop` finalizes the accumulated buffer into an
/// artifact, `release` throws the buffer away (abandonment path). Both end
/// the exclusive ownership unconditionally.
pub trait AudioCapture: Send {
    fn start(&mut self) -> Result<CaptureHandle, CaptureError>;

    fn stop(&mut self, handle: CaptureHandle) -> Result<AudioArtifact, CaptureError>;

    fn release(&mut self, handle: CaptureHandle);

    fn is_active(&self) -> bool;
}

/// Capture backed by scripted sample buffers instead of hardware. Each
/// `start` plays the next scripted take; tests and the demo binary use this
/// so the engine runs without any audio stack.
pub struct SimulatedCapture {
    sample_rate: u32,
    script: VecDeque<Vec<i16>>,
    active: Option<(u64, Vec<i16>)>,
    next_id: u64,
}

impl SimulatedCapture {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            script: VecDeque::new(),
            active: None,
            next_id: 0,
        }
    }

    /// Pre-loads one buffer per expected capture, consumed in order.
    pub fn with_script(sample_rate: u32, takes: Vec<Vec<i16>>) -> Self {
        let mut capture = Self::new(sample_rate);
        capture.script = takes.into();
        capture
    }

    /// A sine take, handy when any non-empty recording will do.
    pub fn tone_take(sample_rate: u32, seconds: f64) -> Vec<i16> {
        let count = (sample_rate as f64 * seconds) as usize;
        (0..count)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                ((t * 440.0 * 2.0 * std::f64::consts::PI).sin() * 0.4 * i16::MAX as f64) as i16
            })
            .collect()
    }

    /// Appends samples to the in-progress capture.
    pub fn feed(&mut self, samples: &[i16]) -> Result<(), CaptureError> {
        match self.active.as_mut() {
            Some((_, buffer)) => {
                buffer.extend_from_slice(samples);
                Ok(())
            }
            None => Err(CaptureError::NotActive),
        }
    }
}

impl AudioCapture for SimulatedCapture {
    fn start(&mut self) -> Result<CaptureHandle, CaptureError> {
        if self.active.is_some() {
            return Err(CaptureError::AlreadyActive);
        }
        let take = self.script.pop_front().unwrap_or_default();
        self.next_id += 1;
        self.active = Some((self.next_id, take));
        Ok(CaptureHandle::new(self.next_id))
    }

    fn stop(&mut self, handle: CaptureHandle) -> Result<AudioArtifact, CaptureError> {
        match self.active.take() {
            Some((id, samples)) if id == handle.id => {
                Ok(AudioArtifact::from_pcm16(&samples, self.sample_rate))
            }
            Some(active) => {
                self.active = Some(active);
                Err(CaptureError::StaleHandle)
            }
            None => Err(CaptureError::NotActive),
        }
    }

    fn release(&mut self, handle: CaptureHandle) {
        if let Some((id, _)) = &self.active {
            if *id == handle.id {
                self.active = None;
            }
        }
    }

    fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

#[cfg(feature = "microphone")]
pub use microphone::MicrophoneCapture;

#[cfg(feature = "microphone")]
mod microphone {
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::thread;

    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

    use super::{AudioCapture, CaptureError, CaptureHandle};
    use crate::models::attempt::AudioArtifact;

    struct ActiveCapture {
        id: u64,
        sample_rate: u32,
        samples: Arc<Mutex<Vec<i16>>>,
        stop_tx: mpsc::Sender<()>,
        worker: thread::JoinHandle<()>,
    }

    /// Capture from the default input device. The cpal stream is not Send,
    /// so a dedicated worker thread owns it for the lifetime of the capture
    /// and drops it on stop or release.
    pub struct MicrophoneCapture {
        active: Option<ActiveCapture>,
        next_id: u64,
    }

    impl MicrophoneCapture {
        pub fn new() -> Self {
            Self {
                active: None,
                next_id: 0,
            }
        }

        fn finish(&mut self, handle: CaptureHandle) -> Result<ActiveCapture, CaptureError> {
            match self.active.take() {
                Some(active) if active.id == handle.id => Ok(active),
                Some(active) => {
                    self.active = Some(active);
                    Err(CaptureError::StaleHandle)
                }
                None => Err(CaptureError::NotActive),
            }
        }
    }

    impl Default for MicrophoneCapture {
        fn default() -> Self {
            Self::new()
        }
    }

    impl AudioCapture for MicrophoneCapture {
        fn start(&mut self) -> Result<CaptureHandle, CaptureError> {
            if self.active.is_some() {
                return Err(CaptureError::AlreadyActive);
            }

            let samples: Arc<Mutex<Vec<i16>>> = Arc::new(Mutex::new(Vec::new()));
            let worker_samples = samples.clone();
            let (stop_tx, stop_rx) = mpsc::channel::<()>();
            let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, String>>();

            let worker = thread::spawn(move || {
                let host = cpal::default_host();
                let device = match host.default_input_device() {
                    Some(device) => device,
                    None => {
                        let _ = ready_tx.send(Err("no default input device".to_string()));
                        return;
                    }
                };
                let supported = match device.default_input_config() {
                    Ok(config) => config,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("input config: {}", e)));
                        return;
                    }
                };
                let sample_format = supported.sample_format();
                let config: cpal::StreamConfig = supported.into();
                let sample_rate = config.sample_rate.0;
                let channels = config.channels as usize;

                let sink = worker_samples;
                let stream = match sample_format {
                    cpal::SampleFormat::F32 => device.build_input_stream(
                        &config,
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            let mut buffer = match sink.lock() {
                                Ok(guard) => guard,
                                Err(_) => return,
                            };
                            // Downmix to mono and quantize to PCM16.
                            for frame in data.chunks(channels.max(1)) {
                                let mixed = frame.iter().sum::<f32>() / frame.len() as f32;
                                buffer.push((mixed.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);
                            }
                        },
                        move |err| tracing::error!("Input stream error: {}", err),
                        None,
                    ),
                    cpal::SampleFormat::I16 => device.build_input_stream(
                        &config,
                        move |data: &[i16], _: &cpal::InputCallbackInfo| {
                            let mut buffer = match sink.lock() {
                                Ok(guard) => guard,
                                Err(_) => return,
                            };
                            for frame in data.chunks(channels.max(1)) {
                                let mixed =
                                    frame.iter().map(|s| *s as i32).sum::<i32>() / frame.len() as i32;
                                buffer.push(mixed as i16);
                            }
                        },
                        move |err| tracing::error!("Input stream error: {}", err),
                        None,
                    ),
                    other => {
                        let _ = ready_tx.send(Err(format!("unsupported sample format: {:?}", other)));
                        return;
                    }
                };

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("build input stream: {}", e)));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(format!("start input stream: {}", e)));
                    return;
                }
                let _ = ready_tx.send(Ok(sample_rate));

                // Hold the stream until asked to stop (or the handle side is
                // dropped, which closes the channel).
                let _ = stop_rx.recv();
                drop(stream);
            });

            let sample_rate = match ready_rx.recv() {
                Ok(Ok(rate)) => rate,
                Ok(Err(message)) => {
                    let _ = worker.join();
                    return Err(CaptureError::DeviceUnavailable(message));
                }
                Err(_) => {
                    let _ = worker.join();
                    return Err(CaptureError::DeviceUnavailable(
                        "capture worker exited unexpectedly".to_string(),
                    ));
                }
            };

            self.next_id += 1;
            self.active = Some(ActiveCapture {
                id: self.next_id,
                sample_rate,
                samples,
                stop_tx,
                worker,
            });
            Ok(CaptureHandle::new(self.next_id))
        }

        fn stop(&mut self, handle: CaptureHandle) -> Result<AudioArtifact, CaptureError> {
            let active = self.finish(handle)?;
            let _ = active.stop_tx.send(());
            let _ = active.worker.join();
            let samples = active
                .samples
                .lock()
                .map(|guard| guard.clone())
                .unwrap_or_default();
            Ok(AudioArtifact::from_pcm16(&samples, active.sample_rate))
        }

        fn release(&mut self, handle: CaptureHandle) {
            if let Ok(active) = self.finish(handle) {
                let _ = active.stop_tx.send(());
                let _ = active.worker.join();
            }
        }

        fn is_active(&self) -> bool {
            self.active.is_some()
        }
    }
}
