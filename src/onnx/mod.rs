//! ONNX Model Artifacts
//!
//! Classifier and regressor backed by ONNX Runtime. The classifier graph
//! must expose float class scores as its last output; the column order of
//! those scores is given by the configured class list.

pub mod session;

pub use session::OnnxSession;

use std::path::Path;
use crate::error::{EmoStressError, Result};
use crate::model::{EmotionClassifier, StressRegressor};

#[derive(Debug)]
pub struct OnnxClassifier {
    session: OnnxSession,
    classes: Vec<i64>,
}

impl OnnxClassifier {
    pub fn open(path: &Path, classes: Vec<i64>) -> Result<Self> {
        if classes.is_empty() {
            return Err(EmoStressError::model_unavailable("ONNX classifier needs at least one class"));
        }
        Ok(Self { session: OnnxSession::open(path)?, classes })
    }
}

impl EmotionClassifier for OnnxClassifier {
    fn predict(&self, features: &[f32]) -> Result<i64> {
        let outputs = self.session.run(features)?;
        let scores = outputs.last()
            .ok_or_else(|| EmoStressError::inference("Classifier produced no output"))?;
        if scores.len() != self.classes.len() {
            return Err(EmoStressError::inference(format!(
                "Classifier produced {} scores for {} classes", scores.len(), self.classes.len()
            )));
        }
        let best = argmax(scores)
            .ok_or_else(|| EmoStressError::inference("Classifier scores are not finite"))?;
        Ok(self.classes[best])
    }

    fn input_dim(&self) -> Option<usize> {
        self.session.input_dim()
    }
}

#[derive(Debug)]
pub struct OnnxRegressor {
    session: OnnxSession,
}

impl OnnxRegressor {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self { session: OnnxSession::open(path)? })
    }
}

impl StressRegressor for OnnxRegressor {
    fn predict(&self, features: &[f32]) -> Result<f32> {
        let outputs = self.session.run(features)?;
        outputs.first()
            .and_then(|values| values.first().copied())
            .ok_or_else(|| EmoStressError::inference("Regressor produced no value"))
    }

    fn input_dim(&self) -> Option<usize> {
        self.session.input_dim()
    }
}

/// Index of the first maximum; `None` if any score is NaN.
fn argmax(scores: &[f32]) -> Option<usize> {
    if scores.iter().any(|s| s.is_nan()) {
        return None;
    }
    let mut best = 0;
    for (i, &score) in scores.iter().enumerate().skip(1) {
        if score > scores[best] {
            best = i;
        }
    }
    (!scores.is_empty()).then_some(best)
}
