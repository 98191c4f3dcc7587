//! Speech capture for transcription, independent of the hotword path.

use crate::error::RecorderError;
use super::resample::{rms, TARGET_SAMPLE_RATE};

pub const UTTERANCE_THRESHOLD: f32 = 0.02;
pub const UTTERANCE_SILENCE_TIMEOUT_MS: u64 = 700;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceEvent {
    Start,
    Stop,
}

/// Single-threshold speech detector over 16 kHz frames
#[derive(Debug)]
pub struct UtteranceDetector {
    threshold: f32,
    timeout_samples: u64,
    speaking: bool,
    silence_samples: u64,
}

impl Default for UtteranceDetector {
    fn default() -> Self {
        Self::new(UTTERANCE_THRESHOLD, UTTERANCE_SILENCE_TIMEOUT_MS)
    }
}

impl UtteranceDetector {
    pub fn new(threshold: f32, silence_timeout_ms: u64) -> Self {
        Self {
            threshold,
            timeout_samples: silence_timeout_ms * u64::from(TARGET_SAMPLE_RATE) / 1000,
            speaking: false,
            silence_samples: 0,
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    pub fn push(&mut self, frame: &[f32]) -> Option<UtteranceEvent> {
        if rms(frame) > self.threshold {
            self.silence_samples = 0;
            if !self.speaking {
                self.speaking = true;
                return Some(UtteranceEvent::Start);
            }
            return None;
        }

        if !self.speaking {
            return None;
        }
        self.silence_samples += frame.len() as u64;
        if self.silence_samples >= self.timeout_samples {
            self.speaking = false;
            self.silence_samples = 0;
            return Some(UtteranceEvent::Stop);
        }
        None
    }
}

/// Accumulates audio between `start()` and `stop()`
#[derive(Debug, Default)]
pub struct SpeechRecorder {
    buffer: Option<Vec<f32>>,
}

impl SpeechRecorder {
    pub fn start(&mut self) {
        self.buffer = Some(Vec::new());
    }

    pub fn is_recording(&self) -> bool {
        self.buffer.is_some()
    }

    /// Frames pushed while not recording are dropped
    pub fn push(&mut self, frame: &[f32]) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.extend_from_slice(frame);
        }
    }

    pub fn stop(&mut self) -> Result<Vec<f32>, RecorderError> {
        self.buffer.take().ok_or(RecorderError::NotStarted)
    }
}

/// Detector and recorder together: feed frames, get finished utterances
#[derive(Debug, Default)]
pub struct UtteranceCapture {
    detector: UtteranceDetector,
    recorder: SpeechRecorder,
}

impl UtteranceCapture {
    pub fn new(detector: UtteranceDetector) -> Self {
        Self {
            detector,
            recorder: SpeechRecorder::default(),
        }
    }

    pub fn push(&mut self, frame: &[f32]) -> Result<Option<Vec<f32>>, RecorderError> {
        match self.detector.push(frame) {
            Some(UtteranceEvent::Start) => {
                self.recorder.start();
                self.recorder.push(frame);
                Ok(None)
            }
            Some(UtteranceEvent::Stop) => self.recorder.stop().map(Some),
            None => {
                self.recorder.push(frame);
                Ok(None)
            }
        }
    }
}
