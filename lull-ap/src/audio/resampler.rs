//! Clip resampling using rubato
//!
//! Clips are converted once, at load time, to the mixer's output rate so the
//! loop mixer never resamples on the render path.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

/// Resample interleaved audio to `output_rate`
///
/// Returns the input unchanged when the rates already match or the clip is
/// empty.
pub fn resample_clip(
    input: Vec<f32>,
    input_rate: u32,
    output_rate: u32,
    channels: u16,
) -> Result<Vec<f32>> {
    if input_rate == output_rate || input.is_empty() {
        return Ok(input);
    }
    if input_rate == 0 || channels == 0 {
        return Err(Error::Decode(format!(
            "cannot resample clip with rate {} and {} channel(s)",
            input_rate, channels
        )));
    }

    let planar = deinterleave(&input, channels);
    let input_frames = planar[0].len();

    // Whole clip processed as one chunk
    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        input_frames,
        channels as usize,
    )
    .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?;

    let output = resampler
        .process(&planar, None)
        .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;

    let interleaved = interleave(output);
    debug!(
        "Resampled clip {}Hz -> {}Hz: {} -> {} frames",
        input_rate,
        output_rate,
        input_frames,
        interleaved.len() / channels as usize
    );
    Ok(interleaved)
}

/// `[L, R, L, R, ...]` -> `[[L, L, ...], [R, R, ...]]`
fn deinterleave(samples: &[f32], channels: u16) -> Vec<Vec<f32>> {
    let channels = channels as usize;
    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            planar[ch].push(*sample);
        }
    }
    planar
}

/// `[[L, L, ...], [R, R, ...]]` -> `[L, R, L, R, ...]`
fn interleave(planar: Vec<Vec<f32>>) -> Vec<f32> {
    let Some(frames) = planar.first().map(Vec::len) else {
        return Vec::new();
    };
    let mut interleaved = Vec::with_capacity(frames * planar.len());
    for frame in 0..frames {
        for channel in &planar {
            interleaved.push(channel[frame]);
        }
    }
    interleaved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deinterleave_interleave() {
        let planar = deinterleave(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2);
        assert_eq!(planar, vec![vec![1.0, 3.0, 5.0], vec![2.0, 4.0, 6.0]]);
        assert_eq!(interleave(planar), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(interleave(Vec::new()).is_empty());
    }

    #[test]
    fn test_same_rate_passthrough() {
        let input = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(resample_clip(input.clone(), 44_100, 44_100, 2).unwrap(), input);
    }

    #[test]
    fn test_resample_length_follows_ratio() {
        let frames = 2000;
        let input: Vec<f32> = (0..frames)
            .flat_map(|i| {
                let s = (i as f32 * 0.05).sin() * 0.5;
                [s, s]
            })
            .collect();

        let output = resample_clip(input, 48_000, 44_100, 2).unwrap();
        let expected = (frames as f64 * 44_100.0 / 48_000.0) as usize;
        let got = output.len() / 2;
        assert!(
            got + 20 >= expected && got <= expected + 20,
            "expected ~{} frames, got {}",
            expected,
            got
        );
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(resample_clip(vec![0.0; 4], 0, 44_100, 2).is_err());
    }
}
