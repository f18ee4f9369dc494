//! Audio playback to speakers

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use super::utterance::{ControlSignal, Utterance, UtteranceDriver, UtteranceEvent};
use crate::{Error, Result};

/// How often the playback thread checks for completion and control changes
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Grace period after the last sample so the device buffer drains
const DRAIN_DELAY: Duration = Duration::from_millis(100);

/// Encoded audio bytes (MP3 or WAV)
pub type AudioClip = Arc<[u8]>;

/// Somewhere to play synthesized audio
pub trait AudioSink: Send + Sync {
    /// Begin playing `clip`, returning a handle to control and observe it
    ///
    /// # Errors
    ///
    /// Returns error if playback cannot be started
    fn start(&self, clip: AudioClip) -> Result<Utterance>;
}

/// Decoded mono samples
struct Decoded {
    samples: Vec<f32>,
    sample_rate: u32,
}

/// Plays audio to the default output device
///
/// Each clip gets its own output stream on a dedicated thread, because
/// `cpal` streams cannot move between threads on every platform.
pub struct CpalSink {
    device_name: String,
}

impl CpalSink {
    /// Create a new audio sink
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;
        let device_name = device.name().unwrap_or_default();

        tracing::debug!(device = %device_name, "audio output initialized");

        Ok(Self { device_name })
    }

    /// Name of the output device found at startup
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl AudioSink for CpalSink {
    fn start(&self, clip: AudioClip) -> Result<Utterance> {
        let (utterance, driver) = Utterance::channel();

        std::thread::Builder::new()
            .name("recital-audio".to_string())
            .spawn(move || {
                if let Err(e) = play_blocking(&clip, &driver) {
                    tracing::warn!(error = %e, "audio playback failed");
                    driver.emit(UtteranceEvent::Error(e.to_string()));
                }
            })?;

        Ok(utterance)
    }
}

/// Play a clip to completion, honoring pause and stop requests
#[allow(clippy::cast_precision_loss)]
fn play_blocking(clip: &[u8], driver: &UtteranceDriver) -> Result<()> {
    let decoded = decode(clip)?;
    if decoded.samples.is_empty() {
        driver.emit(UtteranceEvent::Started);
        driver.emit(UtteranceEvent::Ended);
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device".to_string()))?;

    let config = output_config(&device, decoded.sample_rate)?;
    let channels = usize::from(config.channels);

    let samples = Arc::new(decoded.samples);
    let position = Arc::new(AtomicUsize::new(0));
    let paused = Arc::new(AtomicBool::new(false));

    let stream = {
        let samples = Arc::clone(&samples);
        let position = Arc::clone(&position);
        let paused = Arc::clone(&paused);

        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if paused.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }

                    let mut pos = position.load(Ordering::Relaxed);
                    for frame in data.chunks_mut(channels) {
                        let sample = samples.get(pos).copied().unwrap_or(0.0);
                        frame.fill(sample);
                        if pos < samples.len() {
                            pos += 1;
                        }
                    }
                    position.store(pos, Ordering::Relaxed);
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?
    };

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;
    driver.emit(UtteranceEvent::Started);

    // Stall guard: playing time should never exceed the clip length by much
    let duration = Duration::from_secs_f64(samples.len() as f64 / f64::from(decoded.sample_rate));
    let deadline = duration + Duration::from_millis(500);
    let mut played = Duration::ZERO;
    let mut is_paused = false;

    loop {
        match driver.signal() {
            ControlSignal::Stop => {
                tracing::debug!("playback stopped");
                return Ok(());
            }
            ControlSignal::Pause if !is_paused => {
                paused.store(true, Ordering::Relaxed);
                is_paused = true;
                driver.emit(UtteranceEvent::Paused);
            }
            ControlSignal::Play if is_paused => {
                paused.store(false, Ordering::Relaxed);
                is_paused = false;
                driver.emit(UtteranceEvent::Resumed);
            }
            _ => {}
        }

        if !is_paused {
            if position.load(Ordering::Relaxed) >= samples.len() {
                break;
            }
            if played > deadline {
                tracing::warn!(?duration, "playback stalled, treating clip as finished");
                break;
            }
            played += POLL_INTERVAL;
        }

        std::thread::sleep(POLL_INTERVAL);
    }

    std::thread::sleep(DRAIN_DELAY);

    drop(stream);
    tracing::debug!(samples = samples.len(), "playback complete");
    driver.emit(UtteranceEvent::Ended);

    Ok(())
}

/// Find a mono or stereo output config at the clip's sample rate
fn output_config(device: &Device, sample_rate: u32) -> Result<StreamConfig> {
    let rate = SampleRate(sample_rate);
    let supports = |channels: u16| {
        device.supported_output_configs().ok()?.find(|c| {
            c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
        })
    };

    let supported = supports(1)
        .or_else(|| supports(2))
        .ok_or_else(|| Error::Audio(format!("no output config supports {sample_rate} Hz")))?;

    Ok(supported.with_sample_rate(rate).config())
}

/// Decode WAV (by `RIFF` header) or MP3 bytes to mono f32 samples
fn decode(clip: &[u8]) -> Result<Decoded> {
    if clip.starts_with(b"RIFF") {
        decode_wav(clip)
    } else {
        decode_mp3(clip)
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
fn decode_wav(clip: &[u8]) -> Result<Decoded> {
    let mut reader = hound::WavReader::new(Cursor::new(clip))
        .map_err(|e| Error::Audio(format!("WAV decode error: {e}")))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(format!("WAV decode error: {e}")))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Audio(format!("WAV decode error: {e}")))?
        }
    };

    Ok(Decoded {
        samples: downmix(&interleaved, channels),
        sample_rate: spec.sample_rate,
    })
}

#[allow(clippy::cast_sign_loss)]
fn decode_mp3(clip: &[u8]) -> Result<Decoded> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(clip));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = frame.sample_rate.max(0) as u32;
                let frame_samples: Vec<f32> =
                    frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                samples.extend(downmix(&frame_samples, frame.channels.max(1)));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if samples.is_empty() || sample_rate == 0 {
        return Err(Error::Audio("no audio frames in clip".to_string()));
    }

    Ok(Decoded {
        samples,
        sample_rate,
    })
}

/// Average interleaved channels down to mono
#[allow(clippy::cast_precision_loss)]
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
