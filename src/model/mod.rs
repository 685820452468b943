//! Model Artifacts Module
//!
//! The immutable state a pipeline serves from: feature calibration,
//! normalization parameters and the two fitted models. Loaded once at
//! startup and shared read-only by every request.

pub mod linear;
pub mod scaler;

pub use linear::{LinearClassifier, LinearRegressor};
pub use scaler::NormalizationParams;

use crate::config::{Config, ModelFormat};
use crate::error::{EmoStressError, Result};
use crate::features::{FeatureExtractor, FEATURE_DIM};

/// Maps a normalized feature vector to a class index.
pub trait EmotionClassifier: Send + Sync {
    fn predict(&self, features: &[f32]) -> Result<i64>;

    /// Input width, when the artifact declares one.
    fn input_dim(&self) -> Option<usize>;
}

/// Maps a normalized feature vector to a raw stress score.
pub trait StressRegressor: Send + Sync {
    fn predict(&self, features: &[f32]) -> Result<f32>;

    fn input_dim(&self) -> Option<usize>;
}

pub struct ModelBundle {
    extractor: FeatureExtractor,
    normalizer: NormalizationParams,
    emotion: Box<dyn EmotionClassifier>,
    stress: Box<dyn StressRegressor>,
}

impl std::fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBundle")
            .field("calibration", &self.extractor.config().calibration)
            .field("dimensions", &self.normalizer.len())
            .field("emotion_inputs", &self.emotion.input_dim())
            .field("stress_inputs", &self.stress.input_dim())
            .finish()
    }
}

impl ModelBundle {
    /// Assemble a bundle, checking every component agrees on the feature width.
    pub fn new(
        extractor: FeatureExtractor,
        normalizer: NormalizationParams,
        emotion: Box<dyn EmotionClassifier>,
        stress: Box<dyn StressRegressor>,
    ) -> Result<Self> {
        if normalizer.len() != FEATURE_DIM {
            return Err(EmoStressError::configuration(format!(
                "Scaler has {} dimensions, extractor produces {}", normalizer.len(), FEATURE_DIM
            )));
        }
        for (name, dim) in [("Emotion model", emotion.input_dim()), ("Stress model", stress.input_dim())] {
            if let Some(dim) = dim {
                if dim != FEATURE_DIM {
                    return Err(EmoStressError::configuration(format!(
                        "{} expects {} inputs, extractor produces {}", name, dim, FEATURE_DIM
                    )));
                }
            }
        }
        Ok(Self { extractor, normalizer, emotion, stress })
    }

    /// Load every artifact named by `config`.
    pub fn load(config: &Config) -> Result<Self> {
        let artifacts = &config.artifacts;
        let extractor = FeatureExtractor::new(config.features.clone())?;
        let normalizer = NormalizationParams::from_file(&artifacts.scaler)?;

        let emotion: Box<dyn EmotionClassifier> = match artifacts.emotion_format {
            ModelFormat::Linear => Box::new(LinearClassifier::from_file(&artifacts.emotion_model)?),
            ModelFormat::Onnx => load_onnx_classifier(config)?,
        };
        let stress: Box<dyn StressRegressor> = match artifacts.stress_format {
            ModelFormat::Linear => Box::new(LinearRegressor::from_file(&artifacts.stress_model)?),
            ModelFormat::Onnx => load_onnx_regressor(config)?,
        };

        log::info!("Model bundle ready, calibration '{}'", config.features.calibration);
        Self::new(extractor, normalizer, emotion, stress)
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn normalizer(&self) -> &NormalizationParams {
        &self.normalizer
    }

    pub fn emotion(&self) -> &dyn EmotionClassifier {
        self.emotion.as_ref()
    }

    pub fn stress(&self) -> &dyn StressRegressor {
        self.stress.as_ref()
    }
}

#[cfg(feature = "onnx")]
fn load_onnx_classifier(config: &Config) -> Result<Box<dyn EmotionClassifier>> {
    let artifacts = &config.artifacts;
    let model = crate::onnx::OnnxClassifier::open(&artifacts.emotion_model, artifacts.emotion_classes.clone())?;
    Ok(Box::new(model))
}

#[cfg(feature = "onnx")]
fn load_onnx_regressor(config: &Config) -> Result<Box<dyn StressRegressor>> {
    Ok(Box::new(crate::onnx::OnnxRegressor::open(&config.artifacts.stress_model)?))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx_classifier(config: &Config) -> Result<Box<dyn EmotionClassifier>> {
    Err(onnx_disabled(&config.artifacts.emotion_model))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx_regressor(config: &Config) -> Result<Box<dyn StressRegressor>> {
    Err(onnx_disabled(&config.artifacts.stress_model))
}

#[cfg(not(feature = "onnx"))]
fn onnx_disabled(path: &std::path::Path) -> EmoStressError {
    EmoStressError::model_unavailable(format!(
        "{} is an ONNX model but this build has no `onnx` feature", path.display()
    ))
}
