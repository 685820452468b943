//! Feature standardization parameters

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::error::{EmoStressError, Result};
use crate::features::FeatureVector;

/// Per-dimension mean and scale fitted offline on the training set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    mean: Vec<f32>,
    scale: Vec<f32>,
}

impl NormalizationParams {
    pub fn new(mean: Vec<f32>, scale: Vec<f32>) -> Result<Self> {
        let params = Self { mean, scale };
        params.check()?;
        Ok(params)
    }

    /// Load `{"mean": [...], "scale": [...]}` from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            EmoStressError::model_unavailable(format!("Cannot open scaler {}: {}", path.display(), e))
        })?;
        let params: Self = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            EmoStressError::model_unavailable(format!("Cannot parse scaler {}: {}", path.display(), e))
        })?;
        params.check()?;
        log::info!("Loaded scaler {} ({} dimensions)", path.display(), params.len());
        Ok(params)
    }

    fn check(&self) -> Result<()> {
        if self.mean.is_empty() || self.mean.len() != self.scale.len() {
            return Err(EmoStressError::model_unavailable(format!(
                "Scaler has {} means and {} scales", self.mean.len(), self.scale.len()
            )));
        }
        if let Some(i) = self.mean.iter().position(|m| !m.is_finite()) {
            return Err(EmoStressError::model_unavailable(format!("Scaler mean {} is not finite", i)));
        }
        if let Some(i) = self.scale.iter().position(|s| !s.is_finite() || *s == 0.0) {
            return Err(EmoStressError::model_unavailable(format!("Scaler scale {} is zero or not finite", i)));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    pub fn mean(&self) -> &[f32] {
        &self.mean
    }

    pub fn scale(&self) -> &[f32] {
        &self.scale
    }

    /// `(x - mean) / scale` per dimension. A length mismatch means the
    /// extractor and the fitted artifacts come from different versions.
    pub fn transform(&self, features: &FeatureVector) -> Result<Vec<f32>> {
        if features.len() != self.len() {
            return Err(EmoStressError::configuration(format!(
                "Feature vector has {} dimensions but scaler expects {}", features.len(), self.len()
            )));
        }
        Ok(features.as_slice().iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(&x, (&m, &s))| (x - m) / s)
            .collect())
    }
}
