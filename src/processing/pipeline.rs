//! Inference pipeline
//!
//! decode -> extract -> normalize -> classify + regress -> post-process,
//! for one request at a time. The pipeline is `Sync`: a single instance
//! serves any number of concurrent callers.

use std::io::Read;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use serde::Serialize;
use crate::audio::AudioClip;
use crate::config::Config;
use crate::error::{EmoStressError, Result};
use crate::features::FeatureVector;
use crate::model::ModelBundle;
use super::postprocessor::{finalize_stress, EmotionLabel};

/// Outcome of one successful request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResult {
    #[serde(rename = "predicted_emotion")]
    pub emotion_label: EmotionLabel,
    /// Always within `[1.0, 10.0]`, one decimal place.
    #[serde(rename = "predicted_stress_level")]
    pub stress_score: f32,
}

#[derive(Debug)]
enum ModelState {
    Ready(Arc<ModelBundle>),
    Unavailable(String),
}

#[derive(Debug)]
pub struct InferencePipeline {
    state: ModelState,
    /// Set by the first configuration error; every later call fails with it.
    fatal: OnceLock<String>,
}

impl InferencePipeline {
    pub fn new(bundle: Arc<ModelBundle>) -> Self {
        Self { state: ModelState::Ready(bundle), fatal: OnceLock::new() }
    }

    /// A pipeline whose every call fails with `ModelUnavailable`.
    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        Self { state: ModelState::Unavailable(reason.into()), fatal: OnceLock::new() }
    }

    /// Load artifacts named by `config`. Never fails: a load error yields an
    /// unavailable pipeline carrying the reason.
    pub fn from_config(config: &Config) -> Self {
        let start = Instant::now();
        match ModelBundle::load(config) {
            Ok(bundle) => {
                log::info!("Artifacts loaded in {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);
                Self::new(Arc::new(bundle))
            }
            Err(e) => {
                log::error!("Models unavailable: {}", e);
                Self::unavailable(e.to_string())
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ModelState::Ready(_)) && self.fatal.get().is_none()
    }

    /// Why this pipeline cannot serve, if it cannot.
    pub fn unavailable_reason(&self) -> Option<&str> {
        if let Some(reason) = self.fatal.get() {
            return Some(reason);
        }
        match &self.state {
            ModelState::Ready(_) => None,
            ModelState::Unavailable(reason) => Some(reason),
        }
    }

    pub fn infer<R: Read>(&self, reader: R) -> Result<PredictionResult> {
        self.bundle()?;
        let clip = AudioClip::decode(reader)?;
        self.infer_clip(&clip)
    }

    pub fn infer_file<P: AsRef<Path>>(&self, path: P) -> Result<PredictionResult> {
        self.bundle()?;
        let clip = AudioClip::from_file(path)?;
        self.infer_clip(&clip)
    }

    pub fn infer_clip(&self, clip: &AudioClip) -> Result<PredictionResult> {
        let bundle = self.bundle()?;
        let start = Instant::now();
        let features = bundle.extractor().extract(clip)?;
        let result = self.predict_features(&features)?;
        log::debug!(
            "Inferred {:?} / {:.1} for {:.2}s clip in {:.1}ms",
            result.emotion_label, result.stress_score, clip.duration(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(result)
    }

    /// Normalize and run both models on an extracted vector.
    pub fn predict_features(&self, features: &FeatureVector) -> Result<PredictionResult> {
        let bundle = self.bundle()?;
        self.predict_with(bundle, features).map_err(|e| self.latch(e))
    }

    fn predict_with(&self, bundle: &ModelBundle, features: &FeatureVector) -> Result<PredictionResult> {
        let normalized = bundle.normalizer().transform(features)?;

        let class_index = bundle.emotion().predict(&normalized)?;
        let raw_stress = bundle.stress().predict(&normalized)?;
        if raw_stress.is_nan() {
            return Err(EmoStressError::inference("Stress model returned NaN"));
        }

        Ok(PredictionResult {
            emotion_label: EmotionLabel::from_class_index(class_index),
            stress_score: finalize_stress(raw_stress),
        })
    }

    fn bundle(&self) -> Result<&ModelBundle> {
        if let Some(reason) = self.fatal.get() {
            return Err(EmoStressError::configuration(reason.clone()));
        }
        match &self.state {
            ModelState::Ready(bundle) => Ok(bundle),
            ModelState::Unavailable(reason) => Err(EmoStressError::model_unavailable(reason.clone())),
        }
    }

    /// Record a configuration error so the pipeline stops serving.
    fn latch(&self, err: EmoStressError) -> EmoStressError {
        if let EmoStressError::Configuration { message } = &err {
            if self.fatal.set(message.clone()).is_ok() {
                log::error!("Pipeline disabled: {}", message);
            }
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeatureConfig;
    use crate::features::{FeatureExtractor, FEATURE_DIM};
    use crate::model::{EmotionClassifier, LinearRegressor, NormalizationParams, StressRegressor};

    struct Constant(i64);

    impl EmotionClassifier for Constant {
        fn predict(&self, _features: &[f32]) -> Result<i64> {
            Ok(self.0)
        }

        fn input_dim(&self) -> Option<usize> {
            None
        }
    }

    /// Regressor whose declared width is unknown but which only accepts `width` inputs.
    struct Narrow(usize);

    impl StressRegressor for Narrow {
        fn predict(&self, features: &[f32]) -> Result<f32> {
            if features.len() != self.0 {
                return Err(EmoStressError::configuration("stress model width skew"));
            }
            Ok(3.0)
        }

        fn input_dim(&self) -> Option<usize> {
            None
        }
    }

    fn pipeline(class: i64, stress: Box<dyn StressRegressor>) -> InferencePipeline {
        let bundle = ModelBundle::new(
            FeatureExtractor::new(FeatureConfig::default()).unwrap(),
            NormalizationParams::new(vec![0.0; FEATURE_DIM], vec![1.0; FEATURE_DIM]).unwrap(),
            Box::new(Constant(class)),
            stress,
        ).unwrap();
        InferencePipeline::new(Arc::new(bundle))
    }

    fn zeros() -> FeatureVector {
        FeatureVector::from_vec(vec![0.0; FEATURE_DIM]).unwrap()
    }

    #[test]
    fn test_predict_features_applies_business_rules() {
        let p = pipeline(2, Box::new(LinearRegressor::new(vec![0.0; FEATURE_DIM], 12.34).unwrap()));
        let result = p.predict_features(&zeros()).unwrap();
        assert_eq!(result.emotion_label, EmotionLabel::Angry);
        assert_eq!(result.stress_score, 10.0);
    }

    #[test]
    fn test_unknown_class() {
        let p = pipeline(7, Box::new(LinearRegressor::new(vec![0.0; FEATURE_DIM], 6.25).unwrap()));
        let result = p.predict_features(&zeros()).unwrap();
        assert_eq!(result.emotion_label, EmotionLabel::Unknown);
        assert_eq!(result.stress_score, 6.3);
    }

    #[test]
    fn test_serialized_shape() {
        let result = PredictionResult { emotion_label: EmotionLabel::Neutral, stress_score: 4.5 };
        let json = serde_json::to_value(result).unwrap();
        assert_eq!(json, serde_json::json!({"predicted_emotion": "Neutral", "predicted_stress_level": 4.5}));
    }

    #[test]
    fn test_unavailable_fails_fast() {
        let p = InferencePipeline::unavailable("scaler missing");
        assert!(!p.is_ready());
        assert_eq!(p.unavailable_reason(), Some("scaler missing"));
        let err = p.infer(std::io::Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, EmoStressError::ModelUnavailable { .. }));
    }

    #[test]
    fn test_configuration_error_latches() {
        let p = pipeline(0, Box::new(Narrow(10)));
        assert!(p.is_ready());

        let first = p.predict_features(&zeros()).unwrap_err();
        assert!(matches!(first, EmoStressError::Configuration { .. }));
        assert!(!p.is_ready());

        // Even input that never reaches the models is refused now
        let again = p.infer(std::io::Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(again, EmoStressError::Configuration { .. }));
        assert_eq!(p.unavailable_reason(), Some("stress model width skew"));
    }

    #[test]
    fn test_decode_error_does_not_latch() {
        let p = pipeline(0, Box::new(LinearRegressor::new(vec![0.0; FEATURE_DIM], 5.0).unwrap()));
        let err = p.infer(std::io::Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, EmoStressError::Decode { .. }));
        assert!(p.is_ready());
        assert!(p.predict_features(&zeros()).is_ok());
    }
}
