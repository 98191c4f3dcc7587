use std::io::Cursor;
use hound::{SampleFormat, WavSpec, WavWriter};

/// Size of the RIFF header written for 16-bit mono PCM
pub const WAV_HEADER_LEN: usize = 44;

/// Clamp to [-1, 1] and scale asymmetrically so both ends of the i16 range are reachable
pub fn quantize(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0).round() as i16
    } else {
        (s * 32767.0).round() as i16
    }
}

pub fn dequantize(sample: i16) -> f32 {
    if sample < 0 {
        f32::from(sample) / 32768.0
    } else {
        f32::from(sample) / 32767.0
    }
}

/// Encode mono samples as a 16-bit PCM WAV file
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut buffer = Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2);
    {
        let mut writer = WavWriter::new(Cursor::new(&mut buffer), spec)?;
        for &sample in samples {
            writer.write_sample(quantize(sample))?;
        }
        writer.finalize()?;
    }
    Ok(buffer)
}
