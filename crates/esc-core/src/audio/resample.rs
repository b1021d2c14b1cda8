//! Sample rate conversion using rubato

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::{ClassifyError, Result};

/// Resample mono audio from `from_hz` to `to_hz`
///
/// Identity when the rates match. Otherwise the whole clip is processed as a
/// single chunk, the filter tail is flushed, and the filter delay is removed
/// so the output is time-aligned with the input and `ceil(len * to / from)`
/// samples long.
pub fn resample(samples: &[f32], from_hz: u32, to_hz: u32) -> Result<Vec<f32>> {
    if from_hz == to_hz || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_hz == 0 || to_hz == 0 {
        return Err(ClassifyError::Resample(format!(
            "invalid sample rates: {}Hz -> {}Hz",
            from_hz, to_hz
        )));
    }

    let ratio = to_hz as f64 / from_hz as f64;
    let expected_len = (samples.len() as f64 * ratio).ceil() as usize;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, samples.len(), 1)
        .map_err(|e| ClassifyError::Resample(e.to_string()))?;
    let delay = resampler.output_delay();

    let input = vec![samples.to_vec()];
    let mut output = resampler
        .process(&input, None)
        .map_err(|e| ClassifyError::Resample(e.to_string()))?
        .into_iter()
        .next()
        .unwrap_or_default();

    // Flush zeros through the filter until the delayed tail is out
    let max_flushes = 2 + delay / expected_len.max(1);
    for _ in 0..max_flushes {
        if output.len() >= delay + expected_len {
            break;
        }
        let tail = resampler
            .process_partial::<Vec<f32>>(None, None)
            .map_err(|e| ClassifyError::Resample(e.to_string()))?
            .into_iter()
            .next()
            .unwrap_or_default();
        if tail.is_empty() {
            break;
        }
        output.extend_from_slice(&tail);
    }

    output.drain(..delay.min(output.len()));
    output.resize(expected_len, 0.0);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sr: u32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin() * 0.5)
            .collect()
    }

    fn rms(x: &[f32]) -> f32 {
        (x.iter().map(|v| v * v).sum::<f32>() / x.len() as f32).sqrt()
    }

    #[test]
    fn test_same_rate_is_identity() {
        let input = sine(440.0, 22050, 5000);
        let output = resample(&input, 22050, 22050).unwrap();
        assert_eq!(input, output);
    }

    #[test]
    fn test_downsample_length() {
        let input = sine(440.0, 44100, 44101);
        let output = resample(&input, 44100, 22050).unwrap();
        assert_eq!(output.len(), 22051);
    }

    #[test]
    fn test_upsample_length() {
        let input = sine(440.0, 16000, 16000);
        let output = resample(&input, 16000, 22050).unwrap();
        assert_eq!(output.len(), 22050);
    }

    #[test]
    fn test_energy_preserved_for_in_band_tone() {
        let input = sine(440.0, 48000, 48000);
        let output = resample(&input, 48000, 22050).unwrap();
        // Ignore edges where the sinc filter ramps in and out
        let mid = &output[2000..output.len() - 2000];
        let expected = 0.5 / std::f32::consts::SQRT_2;
        assert!(
            (rms(mid) - expected).abs() < 0.02,
            "rms {} vs {}",
            rms(mid),
            expected
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(resample(&[], 44100, 22050).unwrap().is_empty());
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(matches!(
            resample(&[0.0; 10], 0, 22050),
            Err(ClassifyError::Resample(_))
        ));
    }
}
