//! Container decoding (Symphonia) and channel downmix

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::Waveform;
use crate::error::{ClassifyError, Result};

/// Decode a base64 payload into the canonical mono 22050 Hz waveform
pub fn decode_base64(payload: &str) -> Result<Waveform> {
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| ClassifyError::Decode(format!("invalid base64 payload: {}", e)))?;
    super::load_waveform(&bytes)
}

/// Decode an in-memory audio container into a mono waveform at its native rate
///
/// The container is auto-detected by probing. Multi-channel audio is averaged
/// sample-wise, so the result has exactly one sample per source frame.
/// Corrupt packets are skipped with a warning.
///
/// # Arguments
/// * `bytes` - Complete file contents (WAV, FLAC, MP3, OGG/Vorbis, ...)
///
/// # Returns
/// Mono waveform at the source sample rate, or `Decode` when the input is
/// empty, unrecognised, or holds no audio frames.
///
/// # Example
///
/// ```ignore
/// let waveform = decode_bytes(&std::fs::read("dog_bark.wav")?)?;
/// let canonical = waveform.resampled(SAMPLE_RATE)?;
/// ```
pub fn decode_bytes(bytes: &[u8]) -> Result<Waveform> {
    if bytes.is_empty() {
        return Err(ClassifyError::Decode("empty audio payload".to_string()));
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let detected = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| ClassifyError::Decode(format!("unrecognised audio container: {}", e)))?;

    let mut format = detected.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ClassifyError::Decode("no audio track found".to_string()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let mut sample_rate = codec_params.sample_rate;
    let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| ClassifyError::Decode(format!("unsupported codec: {}", e)))?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut buf_frames = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                log::warn!("Stopping decode at unreadable packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping corrupt packet: {}", e);
                continue;
            }
            Err(e) => return Err(ClassifyError::Decode(e.to_string())),
        };

        // (Re)size the sample buffer for the largest packet seen so far
        if sample_buf.is_none() || decoded.capacity() > buf_frames {
            let spec = *decoded.spec();
            channels = spec.channels.count();
            sample_rate = Some(spec.rate);
            buf_frames = decoded.capacity();
            sample_buf = Some(SampleBuffer::new(buf_frames as u64, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            interleaved.extend_from_slice(buf.samples());
        }
    }

    if interleaved.is_empty() {
        return Err(ClassifyError::Decode("no audio frames decoded".to_string()));
    }

    let sample_rate = sample_rate
        .filter(|&sr| sr > 0)
        .ok_or_else(|| ClassifyError::Decode("unknown sample rate".to_string()))?;

    log::debug!(
        "Decoded {} samples, {}Hz, {} channels",
        interleaved.len(),
        sample_rate,
        channels
    );

    Ok(Waveform::new(
        downmix_to_mono(&interleaved, channels),
        sample_rate,
    ))
}

/// Average interleaved channels into one sample per frame
///
/// A trailing partial frame (malformed input) is dropped.
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    let scale = 1.0 / channels as f32;
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{sine_wav, wav_bytes};
    use super::*;

    #[test]
    fn test_mono_length_equals_frame_count() {
        let bytes = sine_wav(440.0, 1.0, 22050, 1);
        let waveform = decode_bytes(&bytes).unwrap();
        assert_eq!(waveform.len(), 22050);
        assert_eq!(waveform.sample_rate(), 22050);
    }

    #[test]
    fn test_multichannel_length_independent_of_channel_count() {
        for channels in [2, 4] {
            let bytes = sine_wav(220.0, 0.25, 16000, channels);
            let waveform = decode_bytes(&bytes).unwrap();
            assert_eq!(waveform.len(), 4000, "{} channels", channels);
        }
    }

    #[test]
    fn test_stereo_is_averaged() {
        let frames: Vec<Vec<f32>> = (0..1000).map(|_| vec![0.25, 0.75]).collect();
        let waveform = decode_bytes(&wav_bytes(&frames, 22050)).unwrap();
        for &s in waveform.samples() {
            assert!((s - 0.5).abs() < 1e-3, "expected ~0.5, got {}", s);
        }
    }

    #[test]
    fn test_non_audio_bytes_fail() {
        let garbage = b"this is definitely not an audio container, just some text".to_vec();
        assert!(matches!(
            decode_bytes(&garbage),
            Err(ClassifyError::Decode(_))
        ));
    }

    #[test]
    fn test_truncated_header_fails() {
        let bytes = sine_wav(440.0, 1.0, 22050, 1);
        assert!(matches!(
            decode_bytes(&bytes[..20]),
            Err(ClassifyError::Decode(_))
        ));
    }

    #[test]
    fn test_empty_payload_fails() {
        assert!(matches!(decode_bytes(&[]), Err(ClassifyError::Decode(_))));
    }

    #[test]
    fn test_invalid_base64_fails() {
        assert!(matches!(
            decode_base64("@@not base64@@"),
            Err(ClassifyError::Decode(_))
        ));
    }

    #[test]
    fn test_base64_roundtrip_to_canonical_rate() {
        let bytes = sine_wav(440.0, 0.5, 44100, 2);
        let payload = STANDARD.encode(&bytes);
        let waveform = decode_base64(&payload).unwrap();
        assert_eq!(waveform.sample_rate(), 22050);
        assert_eq!(waveform.len(), 11025);
    }

    #[test]
    fn test_downmix_drops_partial_frame() {
        let mono = downmix_to_mono(&[1.0, 3.0, 5.0, 7.0, 9.0], 2);
        assert_eq!(mono, vec![2.0, 6.0]);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        assert_eq!(downmix_to_mono(&[0.1, 0.2], 1), vec![0.1, 0.2]);
    }
}
