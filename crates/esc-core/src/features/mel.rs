//! Mel filterbank, analysis window and padding helpers
//!
//! Filters follow the HTK mel scale with triangular bands and no area
//! normalisation, laid over a linear grid of `n_fft / 2 + 1` frequency bins.

use ndarray::Array2;

/// Convert frequency in Hz to HTK mel
pub fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Convert HTK mel back to Hz
pub fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

/// Create the mel filterbank matrix
///
/// Returns shape `(n_mels, n_fft / 2 + 1)`; multiplying it by a power
/// spectrum column yields the mel band energies.
pub fn mel_filterbank(
    n_mels: usize,
    n_fft: usize,
    sample_rate: f64,
    f_min: f64,
    f_max: f64,
) -> Array2<f32> {
    let n_freqs = n_fft / 2 + 1;
    let nyquist = sample_rate / 2.0;

    let bin_freqs: Vec<f64> = (0..n_freqs)
        .map(|k| nyquist * k as f64 / (n_freqs - 1) as f64)
        .collect();

    // n_mels + 2 evenly spaced points on the mel axis, back in Hz
    let mel_min = hz_to_mel(f_min);
    let mel_max = hz_to_mel(f_max);
    let hz_points: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
        .collect();

    let mut filterbank = Array2::<f32>::zeros((n_mels, n_freqs));
    for band in 0..n_mels {
        let left = hz_points[band];
        let center = hz_points[band + 1];
        let right = hz_points[band + 2];

        for (bin, &freq) in bin_freqs.iter().enumerate() {
            let rising = (freq - left) / (center - left);
            let falling = (right - freq) / (right - center);
            let weight = rising.min(falling).max(0.0);
            filterbank[[band, bin]] = weight as f32;
        }
    }

    filterbank
}

/// Periodic Hann window (matches the window used for STFT analysis)
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

/// Pad both ends by mirroring around the edge samples (edge not repeated)
///
/// Works for any padding width: indices keep bouncing between the two ends
/// when the signal is shorter than the pad.
pub fn reflect_pad(samples: &[f32], pad: usize) -> Vec<f32> {
    if samples.is_empty() {
        return vec![0.0; 2 * pad];
    }
    let len = samples.len();
    (0..len + 2 * pad)
        .map(|j| samples[reflect_index(j as isize - pad as isize, len)])
        .collect()
}

fn reflect_index(i: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let m = i.rem_euclid(period);
    if m >= len as isize {
        (period - m) as usize
    } else {
        m as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mel_hz_roundtrip() {
        for hz in [0.0, 440.0, 1000.0, 11025.0] {
            let back = mel_to_hz(hz_to_mel(hz));
            assert!((back - hz).abs() < 1e-6, "{} -> {}", hz, back);
        }
    }

    #[test]
    fn test_filterbank_shape_and_range() {
        let fb = mel_filterbank(128, 1024, 22050.0, 0.0, 11025.0);
        assert_eq!(fb.shape(), &[128, 513]);
        assert!(fb.iter().all(|&w| (0.0..=1.0).contains(&w)));
    }

    #[test]
    fn test_filterbank_bands_ascend() {
        let fb = mel_filterbank(128, 1024, 22050.0, 0.0, 11025.0);
        let peak_bin = |band: usize| {
            fb.row(band)
                .iter()
                .enumerate()
                .fold((0, f32::MIN), |best, (i, &w)| if w > best.1 { (i, w) } else { best })
                .0
        };
        assert!(peak_bin(40) < peak_bin(80));
        assert!(peak_bin(80) < peak_bin(120));
    }

    #[test]
    fn test_hann_window_is_periodic() {
        let w = hann_window(8);
        assert_eq!(w[0], 0.0);
        assert!((w[4] - 1.0).abs() < 1e-6);
        assert!((w[1] - w[7]).abs() < 1e-6);
    }

    #[test]
    fn test_reflect_pad_mirrors_edges() {
        let padded = reflect_pad(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(padded, vec![3.0, 2.0, 1.0, 2.0, 3.0, 4.0, 3.0, 2.0]);
    }

    #[test]
    fn test_reflect_pad_wider_than_signal() {
        let padded = reflect_pad(&[1.0, 2.0], 3);
        assert_eq!(padded, vec![2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0]);
        assert_eq!(reflect_pad(&[5.0], 2), vec![5.0; 5]);
    }
    #[test]
    fn test_htk_scale_reference_points() {
        // HTK: 1000 Hz maps to ~1000 mel; Slaney would give 15 mel
        assert!((hz_to_mel(1000.0) - 999.985).abs() < 1e-2);
        assert!((hz_to_mel(11025.0) - 3176.32).abs() < 1e-1);
    }

    #[test]
    fn test_filters_sum_to_one_between_outer_centres() {
        // Unnormalised triangles with shared edges overlap into a partition
        // of unity between the first and last band centres
        let fb = mel_filterbank(128, 1024, 22050.0, 0.0, 11025.0);
        let mel_max = hz_to_mel(11025.0);
        let first_centre = mel_to_hz(mel_max / 129.0);
        let last_centre = mel_to_hz(mel_max * 128.0 / 129.0);

        let mut checked = 0;
        for bin in 0..513 {
            let freq = 11025.0 * bin as f64 / 512.0;
            if freq < first_centre || freq > last_centre {
                continue;
            }
            let total: f32 = fb.column(bin).sum();
            assert!((total - 1.0).abs() < 1e-4, "bin {} sums to {}", bin, total);
            checked += 1;
        }
        assert!(checked > 400);
    }
}
