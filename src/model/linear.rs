//! Linear model artifacts
//!
//! JSON exports of fitted linear models, laid out like scikit-learn's
//! `coef_`, `intercept_` and `classes_` attributes.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::error::{EmoStressError, Result};
use super::{EmotionClassifier, StressRegressor};

fn dot(weights: &[f32], features: &[f32]) -> f64 {
    weights.iter().zip(features).map(|(&w, &x)| w as f64 * x as f64).sum()
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path, what: &str) -> Result<T> {
    let file = File::open(path).map_err(|e| {
        EmoStressError::model_unavailable(format!("Cannot open {} {}: {}", what, path.display(), e))
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        EmoStressError::model_unavailable(format!("Cannot parse {} {}: {}", what, path.display(), e))
    })
}

fn check_input(features: &[f32], dim: usize) -> Result<()> {
    if features.len() != dim {
        return Err(EmoStressError::configuration(format!(
            "Model expects {} inputs, got {}", dim, features.len()
        )));
    }
    Ok(())
}

/// One-vs-rest linear classifier. A single coefficient row is the binary
/// case: a positive score selects `classes[1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearClassifier {
    coef: Vec<Vec<f32>>,
    intercept: Vec<f32>,
    classes: Vec<i64>,
}

impl LinearClassifier {
    pub fn new(coef: Vec<Vec<f32>>, intercept: Vec<f32>, classes: Vec<i64>) -> Result<Self> {
        let model = Self { coef, intercept, classes };
        model.check()?;
        Ok(model)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let model: Self = read_json(path, "emotion model")?;
        model.check()?;
        log::info!(
            "Loaded linear emotion model {} ({} classes, {} inputs)",
            path.display(), model.classes.len(), model.dim()
        );
        Ok(model)
    }

    fn check(&self) -> Result<()> {
        let dim = self.dim();
        if dim == 0 || self.coef.iter().any(|row| row.len() != dim) {
            return Err(EmoStressError::model_unavailable("Classifier coefficient rows are empty or ragged"));
        }
        if self.intercept.len() != self.coef.len() {
            return Err(EmoStressError::model_unavailable(format!(
                "Classifier has {} coefficient rows but {} intercepts", self.coef.len(), self.intercept.len()
            )));
        }
        let expected_classes = if self.coef.len() == 1 { 2 } else { self.coef.len() };
        if self.classes.len() != expected_classes {
            return Err(EmoStressError::model_unavailable(format!(
                "Classifier has {} classes, expected {}", self.classes.len(), expected_classes
            )));
        }
        let finite = self.coef.iter().flatten().chain(&self.intercept).all(|v| v.is_finite());
        if !finite {
            return Err(EmoStressError::model_unavailable("Classifier parameters are not finite"));
        }
        Ok(())
    }

    fn dim(&self) -> usize {
        self.coef.first().map_or(0, Vec::len)
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    /// Raw decision scores, one per coefficient row.
    pub fn decision_function(&self, features: &[f32]) -> Result<Vec<f64>> {
        check_input(features, self.dim())?;
        Ok(self.coef.iter()
            .zip(&self.intercept)
            .map(|(row, &b)| dot(row, features) + b as f64)
            .collect())
    }
}

impl EmotionClassifier for LinearClassifier {
    fn predict(&self, features: &[f32]) -> Result<i64> {
        let scores = self.decision_function(features)?;
        if scores.len() == 1 {
            let idx = usize::from(scores[0] > 0.0);
            return Ok(self.classes[idx]);
        }
        // First maximum wins on ties
        let mut best = 0;
        for (i, score) in scores.iter().enumerate().skip(1) {
            if *score > scores[best] {
                best = i;
            }
        }
        Ok(self.classes[best])
    }

    fn input_dim(&self) -> Option<usize> {
        Some(self.dim())
    }
}

/// Linear regressor, `coef . x + intercept`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegressor {
    coef: Vec<f32>,
    intercept: f32,
}

impl LinearRegressor {
    pub fn new(coef: Vec<f32>, intercept: f32) -> Result<Self> {
        let model = Self { coef, intercept };
        model.check()?;
        Ok(model)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let model: Self = read_json(path, "stress model")?;
        model.check()?;
        log::info!("Loaded linear stress model {} ({} inputs)", path.display(), model.coef.len());
        Ok(model)
    }

    fn check(&self) -> Result<()> {
        if self.coef.is_empty() {
            return Err(EmoStressError::model_unavailable("Regressor has no coefficients"));
        }
        if !self.intercept.is_finite() || self.coef.iter().any(|v| !v.is_finite()) {
            return Err(EmoStressError::model_unavailable("Regressor parameters are not finite"));
        }
        Ok(())
    }
}

impl StressRegressor for LinearRegressor {
    fn predict(&self, features: &[f32]) -> Result<f32> {
        check_input(features, self.coef.len())?;
        Ok((dot(&self.coef, features) + self.intercept as f64) as f32)
    }

    fn input_dim(&self) -> Option<usize> {
        Some(self.coef.len())
    }
}
