//! Error Types

use thiserror::Error;

/// Main error type
#[derive(Debug, Clone, Error)]
pub enum EmoStressError {
    /// Input is not readable audio. Recoverable per request.
    #[error("Decode error: {message}")]
    Decode { message: String },
    /// Numeric failure while computing descriptors. Not retried.
    #[error("Feature extraction error: {message}")]
    FeatureExtraction { message: String },
    /// Extractor, normalizer and models disagree on dimensionality.
    #[error("Configuration error: {message}")]
    Configuration { message: String },
    /// Artifacts failed to load at startup.
    #[error("Model unavailable: {message}")]
    ModelUnavailable { message: String },
    /// A loaded model failed on a well-formed vector.
    #[error("Inference error: {message}")]
    Inference { message: String },
    #[error("IO error: {message}")]
    Io { message: String },
}

impl EmoStressError {
    pub fn decode<S: Into<String>>(msg: S) -> Self { Self::Decode { message: msg.into() } }
    pub fn feature_extraction<S: Into<String>>(msg: S) -> Self { Self::FeatureExtraction { message: msg.into() } }
    pub fn configuration<S: Into<String>>(msg: S) -> Self { Self::Configuration { message: msg.into() } }
    pub fn model_unavailable<S: Into<String>>(msg: S) -> Self { Self::ModelUnavailable { message: msg.into() } }
    pub fn inference<S: Into<String>>(msg: S) -> Self { Self::Inference { message: msg.into() } }
    pub fn io<S: Into<String>>(msg: S) -> Self { Self::Io { message: msg.into() } }

    /// Fatal errors stop the process from serving any request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::ModelUnavailable { .. })
    }

    /// Stable tag for reporting.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "decode",
            Self::FeatureExtraction { .. } => "feature_extraction",
            Self::Configuration { .. } => "configuration",
            Self::ModelUnavailable { .. } => "model_unavailable",
            Self::Inference { .. } => "inference",
            Self::Io { .. } => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, EmoStressError>;

impl From<std::io::Error> for EmoStressError {
    fn from(err: std::io::Error) -> Self { Self::io(err.to_string()) }
}

impl From<serde_json::Error> for EmoStressError {
    fn from(err: serde_json::Error) -> Self { Self::configuration(format!("Invalid artifact JSON: {}", err)) }
}

#[cfg(feature = "onnx")]
impl From<onnxruntime::OrtError> for EmoStressError {
    fn from(err: onnxruntime::OrtError) -> Self { Self::inference(format!("ORT: {}", err)) }
}
