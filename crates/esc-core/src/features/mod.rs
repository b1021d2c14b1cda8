//! Mel spectrogram feature extraction
//!
//! Converts a canonical waveform into the log-scaled mel spectrogram the
//! classifier was trained on. Parameters are fixed:
//! - 22050 Hz input, 1024-sample FFT with periodic Hann window, hop 512
//! - centred frames (reflect padding of `n_fft / 2`), power spectrum
//! - 128 HTK mel bands over 0-11025 Hz
//! - amplitude to dB: `10 * log10(max(x, 1e-10))`
//!
//! Output shape is `[batch=1, channel=1, mel=128, frames]` with
//! `frames = 1 + len / hop`.

pub mod mel;

use std::sync::Arc;

use ndarray::{Array1, Array2, Array4, ArrayView4};
use rayon::prelude::*;
use realfft::{RealFftPlanner, RealToComplex};

use crate::audio::{Waveform, SAMPLE_RATE};
use crate::error::{ClassifyError, Result};

pub const N_FFT: usize = 1024;
pub const HOP_LENGTH: usize = 512;
pub const N_MELS: usize = 128;
pub const F_MIN: f64 = 0.0;
pub const F_MAX: f64 = 11025.0;

/// Power floor before the dB conversion
const AMIN: f32 = 1e-10;

/// Log-mel spectrogram tensor, `[1, 1, n_mels, n_frames]`
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    data: Array4<f32>,
}

impl Spectrogram {
    pub fn from_array(data: Array4<f32>) -> Self {
        Self { data }
    }

    pub fn n_mels(&self) -> usize {
        self.data.shape()[2]
    }

    pub fn n_frames(&self) -> usize {
        self.data.shape()[3]
    }

    pub fn shape(&self) -> [usize; 4] {
        let s = self.data.shape();
        [s[0], s[1], s[2], s[3]]
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }
}

/// Stateless mel spectrogram transform with precomputed FFT plan,
/// window and filterbank
pub struct FeatureExtractor {
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    filterbank: Array2<f32>,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        Self {
            fft: planner.plan_fft_forward(N_FFT),
            window: mel::hann_window(N_FFT),
            filterbank: mel::mel_filterbank(N_MELS, N_FFT, SAMPLE_RATE as f64, F_MIN, F_MAX),
        }
    }

    pub fn n_mels(&self) -> usize {
        N_MELS
    }

    /// Number of frames produced for a waveform of `len` samples
    pub fn frame_count(len: usize) -> usize {
        1 + len / HOP_LENGTH
    }

    /// Compute the dB mel spectrogram of a canonical waveform
    ///
    /// # Arguments
    /// * `waveform` - Mono audio at 22050 Hz
    ///
    /// # Returns
    /// `[1, 1, 128, 1 + len / 512]` tensor in dB, floored at -100 dB.
    /// `Shape` for any other sample rate, `Decode` for an empty waveform.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let spectrogram = FeatureExtractor::new().extract(&Waveform::silence(1.0))?;
    /// assert_eq!(spectrogram.shape(), [1, 1, 128, 44]);
    /// ```
    pub fn extract(&self, waveform: &Waveform) -> Result<Spectrogram> {
        if waveform.sample_rate() != SAMPLE_RATE {
            return Err(ClassifyError::Shape(format!(
                "feature extractor expects {}Hz audio, got {}Hz",
                SAMPLE_RATE,
                waveform.sample_rate()
            )));
        }
        if waveform.is_empty() {
            return Err(ClassifyError::Decode("audio contains no samples".to_string()));
        }

        let padded = mel::reflect_pad(waveform.samples(), N_FFT / 2);
        let n_frames = Self::frame_count(waveform.len());

        // Frames are independent; par_iter keeps output order
        let frames: Vec<Vec<f32>> = (0..n_frames)
            .into_par_iter()
            .map_init(
                || {
                    (
                        self.fft.make_input_vec(),
                        self.fft.make_output_vec(),
                        self.fft.make_scratch_vec(),
                    )
                },
                |(frame_buf, spectrum, scratch), frame_idx| -> Result<Vec<f32>> {
                    let start = frame_idx * HOP_LENGTH;
                    for (i, sample) in frame_buf.iter_mut().enumerate() {
                        *sample = padded[start + i] * self.window[i];
                    }

                    self.fft
                        .process_with_scratch(frame_buf, spectrum, scratch)
                        .map_err(|e| ClassifyError::Shape(format!("FFT failed: {:?}", e)))?;

                    let power: Array1<f32> = spectrum.iter().map(|c| c.norm_sqr()).collect();
                    let bands = self.filterbank.dot(&power);
                    Ok(bands.iter().map(|&e| power_to_db(e)).collect())
                },
            )
            .collect::<Result<Vec<_>>>()?;

        let mut data = Array4::<f32>::zeros((1, 1, N_MELS, n_frames));
        for (t, bands) in frames.iter().enumerate() {
            for (m, &value) in bands.iter().enumerate() {
                data[[0, 0, m, t]] = value;
            }
        }

        log::debug!(
            "Extracted mel spectrogram: {} mels x {} frames from {} samples",
            N_MELS,
            n_frames,
            waveform.len()
        );

        Ok(Spectrogram { data })
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn power_to_db(power: f32) -> f32 {
    10.0 * power.max(AMIN).log10()
}
