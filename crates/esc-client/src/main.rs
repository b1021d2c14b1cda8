//! ESC Client - classify a local audio file
//!
//! Posts the file to a running `esc-server`, or with `--checkpoint` runs the
//! classifier in-process, and prints the top predictions.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use esc_core::api::{ErrorResponse, InferenceRequest, InferenceResponse};
use esc_core::config::ModelConfig;
use esc_core::{Classifier, Prediction};

const DEFAULT_URL: &str = "http://127.0.0.1:8000/inference";

#[derive(Debug, Parser)]
#[command(name = "esc-client")]
#[command(about = "Classify an audio clip with the ESC model", long_about = None)]
struct Args {
    /// Audio file (WAV, FLAC, MP3, OGG, ...).
    file: PathBuf,

    /// Inference endpoint.
    #[arg(long, default_value = DEFAULT_URL)]
    url: String,

    /// Classify in-process with this checkpoint manifest instead of posting.
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// With --checkpoint, use the GPU when available.
    #[arg(long, default_value_t = false)]
    gpu: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read audio file {:?}", args.file))?;

    let predictions = match &args.checkpoint {
        Some(checkpoint) => classify_local(checkpoint, &bytes, args.gpu)?,
        None => classify_remote(&args.url, &bytes)?,
    };

    print!("{}", format_predictions(&predictions));
    Ok(())
}

fn classify_remote(url: &str, bytes: &[u8]) -> Result<Vec<Prediction>> {
    log::info!("Posting {} bytes to {}", bytes.len(), url);
    let request = InferenceRequest::from_audio_bytes(bytes);

    let response = match ureq::post(url).send_json(&request) {
        Ok(response) => response,
        Err(ureq::Error::Status(code, response)) => {
            let message = response
                .into_json::<ErrorResponse>()
                .map(|body| body.error)
                .unwrap_or_else(|_| "no error details".to_string());
            anyhow::bail!("Server returned {}: {}", code, message);
        }
        Err(e) => return Err(e).with_context(|| format!("Request to {} failed", url)),
    };

    let body: InferenceResponse = response
        .into_json()
        .context("Invalid inference response body")?;
    Ok(body.predictions)
}

fn classify_local(checkpoint: &Path, bytes: &[u8], use_gpu: bool) -> Result<Vec<Prediction>> {
    let config = ModelConfig {
        use_gpu,
        ..Default::default()
    };
    let classifier = Classifier::load(checkpoint, &config)
        .with_context(|| format!("Failed to load classifier from {:?}", checkpoint))?;
    classifier.classify_bytes(bytes).context("Classification failed")
}

fn format_predictions(predictions: &[Prediction]) -> String {
    let mut out = String::from("Top predictions:\n");
    for prediction in predictions {
        out.push_str(&format!(
            "  -{}  {:.2}%\n",
            prediction.label,
            prediction.confidence * 100.0
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_predictions() {
        let predictions = vec![
            Prediction {
                label: "chirping_birds".to_string(),
                confidence: 0.9312,
            },
            Prediction {
                label: "rain".to_string(),
                confidence: 0.05,
            },
        ];
        assert_eq!(
            format_predictions(&predictions),
            "Top predictions:\n  -chirping_birds  93.12%\n  -rain  5.00%\n"
        );
    }

    #[test]
    fn test_default_url() {
        let args = Args::parse_from(["esc-client", "clip.wav"]);
        assert_eq!(args.url, DEFAULT_URL);
        assert!(args.checkpoint.is_none());
    }

    #[test]
    fn test_local_mode_reports_missing_checkpoint() {
        let err = classify_local(Path::new("/nonexistent/best_model.yaml"), b"RIFF", false)
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to load classifier"));
    }
}
