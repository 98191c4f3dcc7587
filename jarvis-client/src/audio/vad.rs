use serde::{Deserialize, Serialize};
use super::resample::{rms, TARGET_SAMPLE_RATE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// Level that opens a speech span
    pub rms_start: f32,
    /// Level that keeps an open span alive
    pub rms_continue: f32,
    /// Trailing silence tolerated before the span closes
    pub hangover_ms: u64,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            rms_start: 0.015,
            rms_continue: 0.01,
            hangover_ms: 300,
        }
    }
}

/// Samples of the span being captured
#[derive(Debug, Default)]
pub struct AudioFrameBuffer {
    samples: Vec<f32>,
}

impl AudioFrameBuffer {
    pub fn push(&mut self, frame: &[f32]) {
        self.samples.extend_from_slice(frame);
    }

    pub fn take(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.samples)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Hysteresis voice detector over 16 kHz mono frames. Silence is counted
/// in samples, so timing follows the audio rather than the wall clock.
#[derive(Debug)]
pub struct VoiceActivityDetector {
    config: VadConfig,
    speaking: bool,
    silence_samples: u64,
    hangover_samples: u64,
    buffer: AudioFrameBuffer,
}

impl VoiceActivityDetector {
    pub fn new(config: VadConfig) -> Self {
        let hangover_samples = config.hangover_ms * u64::from(TARGET_SAMPLE_RATE) / 1000;
        Self {
            config,
            speaking: false,
            silence_samples: 0,
            hangover_samples,
            buffer: AudioFrameBuffer::default(),
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    pub fn buffered_samples(&self) -> usize {
        self.buffer.len()
    }

    /// Feed one frame. Returns the finished span when this frame closed it.
    pub fn push(&mut self, frame: &[f32]) -> Option<Vec<f32>> {
        let level = rms(frame);

        if !self.speaking {
            if level > self.config.rms_start {
                self.speaking = true;
                self.silence_samples = 0;
                self.buffer.push(frame);
            }
            return None;
        }

        if level > self.config.rms_continue {
            self.silence_samples = 0;
            self.buffer.push(frame);
            return None;
        }

        self.silence_samples += frame.len() as u64;
        if self.silence_samples > self.hangover_samples {
            self.speaking = false;
            self.silence_samples = 0;
            let span = self.buffer.take();
            return if span.is_empty() { None } else { Some(span) };
        }

        self.buffer.push(frame);
        None
    }

    /// Drop any open span
    pub fn reset(&mut self) {
        self.speaking = false;
        self.silence_samples = 0;
        self.buffer.clear();
    }
}
