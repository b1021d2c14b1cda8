//! Audio decoding for uploaded clips
//!
//! Turns an encoded byte buffer (WAV, FLAC, MP3, OGG...) into the canonical
//! waveform the feature extractor expects: mono `f32` samples at 22050 Hz.
//!
//! - **Decoding** (`decode.rs`): Symphonia format detection + packet decode, channel averaging
//! - **Resampling** (`resample.rs`): band-limited sinc resampling via rubato

mod decode;
mod resample;

pub use decode::{decode_base64, decode_bytes, downmix_to_mono};
pub use resample::resample;

use crate::error::Result;

/// Canonical sample rate for feature extraction (Hz)
pub const SAMPLE_RATE: u32 = 22050;

/// Mono audio samples at a known sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Silent waveform of the given duration at the canonical rate
    pub fn silence(secs: f32) -> Self {
        let len = (secs.max(0.0) * SAMPLE_RATE as f32) as usize;
        Self::new(vec![0.0; len], SAMPLE_RATE)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (one sample per frame, always mono)
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Convert to `target_hz`, returning `self` untouched when already there
    pub fn resampled(self, target_hz: u32) -> Result<Self> {
        if self.sample_rate == target_hz {
            return Ok(self);
        }
        log::debug!(
            "Resampling {} samples from {}Hz to {}Hz",
            self.samples.len(),
            self.sample_rate,
            target_hz
        );
        let samples = resample(&self.samples, self.sample_rate, target_hz)?;
        Ok(Self::new(samples, target_hz))
    }
}

/// Decode an encoded clip into the canonical mono 22050 Hz waveform
pub fn load_waveform(bytes: &[u8]) -> Result<Waveform> {
    decode_bytes(bytes)?.resampled(SAMPLE_RATE)
}
