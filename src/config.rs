//! Configuration management for artifact loading and feature analysis

use crate::error::{EmoStressError, Result};
use crate::features::cqt::C1_HZ;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub artifacts: ArtifactConfig,
    pub features: FeatureConfig,
    pub processing: ProcessingConfig,
}

/// Storage format of a model artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFormat {
    /// JSON coefficients and intercepts
    Linear,
    /// ONNX graph (requires the `onnx` cargo feature)
    Onnx,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub emotion_model: PathBuf,
    pub emotion_format: ModelFormat,
    /// Class ids behind the columns of an ONNX score output
    pub emotion_classes: Vec<i64>,
    pub stress_model: PathBuf,
    pub stress_format: ModelFormat,
    pub scaler: PathBuf,
}

/// Analysis calibration. Must match the parameters the shipped
/// normalizer and models were fitted with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub calibration: String,
    pub n_fft: usize,
    pub hop_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub win_length: Option<usize>,
    pub contrast_fmin: f64,
    pub contrast_quantile: f64,
    pub hpss_kernel: usize,
    pub hpss_margin: f32,
    pub cqt_fmin: f64,
    /// Fixed tuning offset in fractions of a semitone; estimated per clip when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tuning: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub workers: usize,
    pub verbose: bool,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            emotion_model: PathBuf::from("./model/model_emotion.json"),
            emotion_format: ModelFormat::Linear,
            emotion_classes: vec![0, 1, 2, 3, 4],
            stress_model: PathBuf::from("./model/model_stress.json"),
            stress_format: ModelFormat::Linear,
            scaler: PathBuf::from("./model/scaler.json"),
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            calibration: "librosa-0.10-defaults".to_string(),
            n_fft: 2048,
            hop_length: 512,
            win_length: None,
            contrast_fmin: 200.0,
            contrast_quantile: 0.02,
            hpss_kernel: 31,
            hpss_margin: 1.0,
            cqt_fmin: C1_HZ,
            tuning: None,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: utils::cpu_count(),
            verbose: false,
        }
    }
}

impl FeatureConfig {
    pub fn win_length(&self) -> usize {
        self.win_length.unwrap_or(self.n_fft)
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_fft < 4 || self.n_fft % 2 != 0 {
            return Err(EmoStressError::configuration("FFT size must be an even number of at least 4"));
        }
        if self.hop_length == 0 {
            return Err(EmoStressError::configuration("Hop length must be greater than 0"));
        }
        let win = self.win_length();
        if win == 0 || win > self.n_fft {
            return Err(EmoStressError::configuration("Window length must be in 1..=n_fft"));
        }
        if self.contrast_fmin <= 0.0 {
            return Err(EmoStressError::configuration("Contrast fmin must be positive"));
        }
        if !(0.0 < self.contrast_quantile && self.contrast_quantile < 1.0) {
            return Err(EmoStressError::configuration("Contrast quantile must be in range (0.0, 1.0)"));
        }
        if self.hpss_kernel == 0 || self.hpss_kernel % 2 == 0 {
            return Err(EmoStressError::configuration("HPSS kernel must be odd"));
        }
        if self.hpss_margin < 1.0 {
            return Err(EmoStressError::configuration("HPSS margin must be at least 1.0"));
        }
        if self.cqt_fmin <= 0.0 {
            return Err(EmoStressError::configuration("CQT fmin must be positive"));
        }
        if let Some(tuning) = self.tuning {
            if !(-0.5..0.5).contains(&tuning) {
                return Err(EmoStressError::configuration("Tuning must be in range [-0.5, 0.5)"));
            }
        }
        Ok(())
    }
}

impl Config {
    //! Convenience accessors
    pub fn workers(&self) -> usize {
        self.processing.workers
    }

    pub fn verbose(&self) -> bool {
        self.processing.verbose
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "emostress", about = "Speech emotion and stress estimation", version, author)]
pub struct Args {
    #[arg(help = "Input audio files (WAV format)")]
    pub inputs: Vec<PathBuf>,

    #[arg(short = 'c', long = "config", help = "Config file path (TOML format)")]
    pub config_file: Option<PathBuf>,

    #[arg(long = "emotion-model", help = "Emotion classifier artifact")]
    pub emotion_model: Option<PathBuf>,

    #[arg(long = "stress-model", help = "Stress regressor artifact")]
    pub stress_model: Option<PathBuf>,

    #[arg(long = "scaler", help = "Normalization parameters artifact (JSON)")]
    pub scaler: Option<PathBuf>,

    #[arg(short = 'w', long = "workers", help = "Number of clips processed in parallel")]
    pub workers: Option<usize>,

    #[arg(short = 'v', long = "verbose", help = "Enable verbose output mode")]
    pub verbose: bool,

    #[arg(long = "print-default-config", help = "Print the default config as TOML and exit")]
    pub print_default_config: bool,
}

impl Config {
    //! Create config from command line arguments
    pub fn from_args() -> Result<Self> {
        let args = Args::parse();
        Self::from_args_and_config(args)
    }

    /// Create config from command line arguments and config file
    pub fn from_args_and_config(args: Args) -> Result<Self> {
        let mut config = if let Some(config_path) = &args.config_file {
            Self::from_file(config_path)?
        } else {
            Self::default()
        };

        // Command line arguments override config file settings
        if let Some(path) = args.emotion_model {
            config.artifacts.emotion_model = path;
        }
        if let Some(path) = args.stress_model {
            config.artifacts.stress_model = path;
        }
        if let Some(path) = args.scaler {
            config.artifacts.scaler = path;
        }
        if let Some(workers) = args.workers {
            config.processing.workers = workers;
        }
        config.processing.verbose |= args.verbose;

        config.validate()?;
        Ok(config)
    }

    /// Load config from a TOML file; relative artifact paths resolve against its directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| EmoStressError::configuration(format!("Failed to read config file: {}", e)))?;

        let mut config: Self = toml::from_str(&content)
            .map_err(|e| EmoStressError::configuration(format!("Failed to parse config file: {}", e)))?;

        if let Some(base) = path.parent() {
            config.artifacts.resolve_relative_to(base);
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;

        if self.artifacts.emotion_classes.is_empty() {
            return Err(EmoStressError::configuration("Emotion class list cannot be empty"));
        }
        if self.processing.workers == 0 {
            return Err(EmoStressError::configuration("Worker count must be greater than 0"));
        }
        if self.processing.workers > utils::cpu_count() * 2 {
            return Err(EmoStressError::configuration("Worker count cannot exceed 2x logical CPU cores"));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| EmoStressError::configuration(format!("Failed to serialize config: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_toml()?)
            .map_err(|e| EmoStressError::configuration(format!("Failed to write config file: {}", e)))
    }

    pub fn create_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
        Self::default().save_to_file(path)
    }
}

impl ArtifactConfig {
    fn resolve_relative_to(&mut self, base: &Path) {
        for path in [&mut self.emotion_model, &mut self.stress_model, &mut self.scaler] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

pub mod utils {
    pub fn cpu_count() -> usize {
        num_cpus::get()
    }
}
