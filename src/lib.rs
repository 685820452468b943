//! EmoStress - Speech Emotion and Stress Estimation Library
//!
//! Decodes a speech clip, summarizes it as a fixed 193-dimensional acoustic
//! descriptor and runs a pre-trained emotion classifier and stress regressor
//! on the standardized descriptor.

pub mod audio;
pub mod config;
pub mod error;
pub mod features;
pub mod model;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod processing;

pub use audio::AudioClip;
pub use config::{Args, Config};
pub use error::{EmoStressError, Result};
pub use features::{FeatureExtractor, FeatureVector, FEATURE_DIM};
pub use model::ModelBundle;
pub use processing::{EmotionLabel, InferencePipeline, PredictionResult};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Log to stderr at `info`, or `debug` when verbose. `RUST_LOG` still wins.
pub fn init_logging(verbose: bool) {
    let level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init()
        .ok();
}

pub fn get_library_info() -> LibraryInfo {
    LibraryInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

impl std::fmt::Display for LibraryInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} v{} - {}", self.name, self.version, self.description)
    }
}
