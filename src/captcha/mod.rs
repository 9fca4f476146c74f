//! Captcha Solving Pipeline
//!
//! Runs the portal's distorted-text captcha through a pre-trained ONNX
//! model: image preprocessing, a single inference call and CTC greedy
//! decoding against a character vocabulary loaded from `vocab.txt`.

mod decode;
mod preprocess;

pub use decode::ctc_greedy_decode;
pub use preprocess::{flatten_to_jpeg, image_to_tensor, IMG_HEIGHT, IMG_WIDTH};

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use ort::session::Session;
use ort::value::Tensor;
use tracing::info;

/// Portal captchas carry at most five characters.
pub const MAX_LABEL_LENGTH: usize = 5;

/// Captcha text predictor backed by an ONNX Runtime session.
///
/// The model keeps the class layout of its training setup: index 0 is the
/// out-of-vocabulary slot, indices 1..=N map to the vocabulary characters
/// and the last index is the CTC blank.
pub struct CaptchaSolver {
    session: Session,
    vocab: Vec<String>,
}

impl CaptchaSolver {
    /// Load the model and its character vocabulary (one character per line).
    pub fn load(model_path: &Path, vocab_path: &Path) -> Result<Self> {
        anyhow::ensure!(
            model_path.exists(),
            "captcha model not found at {model_path:?}"
        );
        anyhow::ensure!(
            vocab_path.exists(),
            "vocabulary file not found at {vocab_path:?}"
        );

        let session = Session::builder()?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load captcha model from {:?}", model_path))?;

        let vocab = load_vocabulary(vocab_path)?;

        info!(
            characters = vocab.len(),
            model = %model_path.display(),
            "loaded captcha model"
        );

        Ok(Self { session, vocab })
    }

    /// Predict the text of a single captcha image file.
    pub fn predict(&mut self, image_path: &Path) -> Result<String> {
        let pixels = preprocess::image_to_tensor(image_path)?;
        let shape = [1i64, IMG_WIDTH as i64, IMG_HEIGHT as i64, 1];
        let input = Tensor::from_array((shape, pixels.into_boxed_slice()))?;

        let outputs = self.session.run(ort::inputs!["image" => input])?;
        let (out_shape, data) = outputs[0].try_extract_tensor::<f32>()?;

        let dims: &[i64] = out_shape;
        anyhow::ensure!(
            dims.len() == 3 && dims[0] == 1,
            "unexpected model output shape: {dims:?}"
        );
        let steps = dims[1] as usize;
        let classes = dims[2] as usize;
        anyhow::ensure!(
            classes == self.vocab.len() + 2,
            "model has {classes} classes but vocabulary implies {}",
            self.vocab.len() + 2
        );

        Ok(decode::ctc_greedy_decode(
            data,
            steps,
            classes,
            &self.vocab,
            MAX_LABEL_LENGTH,
        ))
    }

    /// Predict a batch of captcha images in one inference call.
    pub fn predict_batch(&mut self, image_paths: &[PathBuf]) -> Result<Vec<String>> {
        if image_paths.is_empty() {
            return Ok(vec![]);
        }

        let per_image = (IMG_WIDTH * IMG_HEIGHT) as usize;
        let mut pixels = Vec::with_capacity(image_paths.len() * per_image);
        for path in image_paths {
            pixels.extend(preprocess::image_to_tensor(path)?);
        }

        let shape = [
            image_paths.len() as i64,
            IMG_WIDTH as i64,
            IMG_HEIGHT as i64,
            1,
        ];
        let input = Tensor::from_array((shape, pixels.into_boxed_slice()))?;

        let outputs = self.session.run(ort::inputs!["image" => input])?;
        let (out_shape, data) = outputs[0].try_extract_tensor::<f32>()?;

        let dims: &[i64] = out_shape;
        anyhow::ensure!(
            dims.len() == 3 && dims[0] as usize == image_paths.len(),
            "unexpected model output shape: {dims:?}"
        );
        let steps = dims[1] as usize;
        let classes = dims[2] as usize;

        let mut texts = Vec::with_capacity(image_paths.len());
        for chunk in data.chunks(steps * classes) {
            texts.push(decode::ctc_greedy_decode(
                chunk,
                steps,
                classes,
                &self.vocab,
                MAX_LABEL_LENGTH,
            ));
        }
        Ok(texts)
    }
}

fn load_vocabulary(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read vocabulary from {:?}", path))?;

    let vocab: Vec<String> = content
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    anyhow::ensure!(!vocab.is_empty(), "vocabulary file {path:?} is empty");
    Ok(vocab)
}

/// Fetch a captcha image over HTTP, flatten it onto a white background and
/// save it as a timestamped JPEG ready for prediction.
///
/// The portal still serves captchas over legacy TLS, so certificate
/// verification is relaxed for this one client.
pub async fn fetch_captcha(url: &str, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create captcha directory {:?}", dir))?;

    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(std::time::Duration::from_secs(20))
        .build()
        .context("Failed to build HTTP client")?;

    let bytes = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch captcha from {}", url))?
        .error_for_status()
        .context("Captcha endpoint returned an error status")?
        .bytes()
        .await
        .context("Failed to read captcha response body")?;

    let dest = dir.join(format!(
        "captcha_{}.jpg",
        Local::now().format("%d%m%Y_%H%M%S")
    ));
    preprocess::flatten_to_jpeg(&bytes, &dest)?;
    Ok(dest)
}
