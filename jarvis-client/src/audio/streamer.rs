use crate::channels::HotwordChannel;
use crate::error::AudioError;
use super::resample::{downsample, TARGET_SAMPLE_RATE};
use super::vad::{VadConfig, VoiceActivityDetector};
use super::wav::encode_wav;

/// Turns microphone frames into WAV clips on the hotword channel, one clip
/// per detected speech span.
pub struct HotwordStreamer {
    channel: HotwordChannel,
    vad: VoiceActivityDetector,
    listening: bool,
}

impl HotwordStreamer {
    pub fn new(channel: HotwordChannel, config: VadConfig) -> Self {
        Self {
            channel,
            vad: VoiceActivityDetector::new(config),
            listening: false,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Turning listening off discards a span in progress
    pub fn set_listening(&mut self, listening: bool) {
        if listening == self.listening {
            return;
        }
        self.listening = listening;
        if listening {
            self.channel.session().connect();
        } else {
            self.vad.reset();
        }
        tracing::debug!("Hotword listening {}", if listening { "on" } else { "off" });
    }

    /// Feed one mono frame at `sample_rate`. Returns true when a clip was sent.
    pub fn push(&mut self, frame: &[f32], sample_rate: u32) -> Result<bool, AudioError> {
        if !self.listening {
            return Ok(false);
        }

        let frame = downsample(frame, sample_rate, TARGET_SAMPLE_RATE);
        let Some(span) = self.vad.push(&frame) else {
            return Ok(false);
        };

        let wav = encode_wav(&span, TARGET_SAMPLE_RATE)?;
        tracing::debug!("Sending {}ms speech clip", span.len() as u64 * 1000 / u64::from(TARGET_SAMPLE_RATE));
        self.channel.send_wav(wav)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::io::Cursor;
    use hound::WavReader;
    use crate::audio::wav::{dequantize, WAV_HEADER_LEN};
    use crate::config::{QueueConfig, ReconnectConfig};
    use crate::session::{Session, SessionState};
    use crate::transport::testing::ScriptedConnector;
    use crate::transport::Frame;

    // 100ms at 48kHz
    fn frame(level: f32) -> Vec<f32> {
        (0..4800).map(|i| if i % 2 == 0 { level } else { -level }).collect()
    }

    fn streamer(connector: &ScriptedConnector) -> HotwordStreamer {
        let session = Session::spawn(Arc::new(connector.clone()), &ReconnectConfig::default(), &QueueConfig::default());
        HotwordStreamer::new(HotwordChannel::new(session), VadConfig::default())
    }

    #[tokio::test]
    async fn test_speech_span_becomes_one_clip() {
        let connector = ScriptedConnector::default();
        let mut peer = connector.accept().await;
        let mut streamer = streamer(&connector);
        streamer.set_listening(true);

        let mut sent = 0;
        for level in [0.3, 0.3, 0.0, 0.0, 0.0, 0.0, 0.0] {
            if streamer.push(&frame(level), 48_000).unwrap() {
                sent += 1;
            }
        }
        assert_eq!(sent, 1);

        match peer.received.recv().await {
            Some(Frame::Binary(wav)) => {
                assert_eq!(&wav[0..4], b"RIFF");
                // 2 loud + 3 tolerated quiet frames, 1600 samples each after resampling
                assert_eq!(wav.len(), WAV_HEADER_LEN + 2 * 5 * 1600);
            }
            other => panic!("expected a wav clip, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clip_preserves_pcm() {
        let connector = ScriptedConnector::default();
        let mut peer = connector.accept().await;
        let mut streamer = streamer(&connector);
        streamer.set_listening(true);

        // 600ms of tone at the target rate, then silence until the span closes
        let tone: Vec<f32> = (0..9600).map(|i| ((i as f32) * 0.05).sin() * 0.3).collect();
        for chunk in tone.chunks(1600) {
            assert!(!streamer.push(chunk, 16_000).unwrap());
        }
        let silence = vec![0.0; 1600];
        let mut sent = false;
        for _ in 0..4 {
            sent |= streamer.push(&silence, 16_000).unwrap();
        }
        assert!(sent);

        let wav = match peer.received.recv().await {
            Some(Frame::Binary(wav)) => wav,
            other => panic!("expected a wav clip, got {:?}", other),
        };
        // Tone plus the three silent frames held during hangover
        let expected_samples = tone.len() + 3 * 1600;
        let data_size = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]);
        assert_eq!(data_size as usize, 2 * expected_samples);

        let mut reader = WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, TARGET_SAMPLE_RATE);
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded.len(), expected_samples);
        for (original, pcm) in tone.iter().zip(&decoded) {
            assert!((original - dequantize(*pcm)).abs() <= 1.0 / 32768.0);
        }
        assert!(decoded[tone.len()..].iter().all(|&pcm| pcm == 0));
    }

    #[tokio::test]
    async fn test_quiet_audio_sends_nothing() {
        let connector = ScriptedConnector::default();
        let mut peer = connector.accept().await;
        let mut streamer = streamer(&connector);
        streamer.set_listening(true);
        streamer.channel.session().wait_for_state(SessionState::Open).await.unwrap();

        for _ in 0..20 {
            assert!(!streamer.push(&frame(0.01), 48_000).unwrap());
        }
        tokio::task::yield_now().await;
        assert!(peer.received.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_not_listening_ignores_audio() {
        let connector = ScriptedConnector::default();
        let mut streamer = streamer(&connector);
        streamer.set_listening(true);
        streamer.push(&frame(0.3), 48_000).unwrap();
        streamer.set_listening(false);

        assert!(!streamer.is_listening());
        for _ in 0..6 {
            assert!(!streamer.push(&frame(0.0), 48_000).unwrap());
        }
    }
}
