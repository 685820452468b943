//! Request Processing

pub mod pipeline;
pub mod postprocessor;

pub use pipeline::{InferencePipeline, PredictionResult};
pub use postprocessor::{clamp_stress, finalize_stress, EmotionLabel};
