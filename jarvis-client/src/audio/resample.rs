use std::borrow::Cow;

/// Rate every clip sent to the backend is encoded at
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Decimate mono audio by averaging the source samples that fall into each
/// output slot. Returns the input untouched when the rates match.
pub fn downsample(input: &[f32], in_rate: u32, out_rate: u32) -> Cow<'_, [f32]> {
    if in_rate == out_rate {
        return Cow::Borrowed(input);
    }
    if in_rate == 0 || out_rate == 0 || input.is_empty() {
        return Cow::Owned(Vec::new());
    }

    let ratio = f64::from(in_rate) / f64::from(out_rate);
    let out_len = (input.len() as f64 / ratio).round() as usize;
    let mut output = Vec::with_capacity(out_len);
    let mut pos = 0usize;

    for i in 0..out_len {
        let end = (((i + 1) as f64 * ratio).round() as usize).min(input.len());
        let window = input.get(pos..end).unwrap_or(&[]);
        let sample = if window.is_empty() {
            0.0
        } else {
            window.iter().sum::<f32>() / window.len() as f32
        };
        output.push(sample);
        pos = end.max(pos);
    }

    Cow::Owned(output)
}

/// Root-mean-square level of a frame; 0 for an empty frame
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum: f32 = frame.iter().map(|s| s * s).sum();
    (sum / frame.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_borrows() {
        let input = [0.1, 0.2, 0.3];
        assert!(matches!(downsample(&input, 16_000, 16_000), Cow::Borrowed(_)));
    }

    #[test]
    fn test_48k_averages_triples() {
        let input: Vec<f32> = (0..9).map(|i| i as f32).collect();
        let output = downsample(&input, 48_000, 16_000);
        assert_eq!(output.as_ref(), &[1.0, 4.0, 7.0]);
    }

    #[test]
    fn test_44k1_output_length() {
        let input = vec![0.5f32; 4410];
        let output = downsample(&input, 44_100, 16_000);
        assert_eq!(output.len(), 1600);
        assert!(output.iter().all(|s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
    }
}
