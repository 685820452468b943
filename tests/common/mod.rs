#![allow(dead_code)]

use std::path::{Path, PathBuf};
use emostress::FEATURE_DIM;
use hound::{SampleFormat, WavSpec, WavWriter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    for &s in samples {
        writer.write_sample((s.clamp(-1.0, 1.0) * 32767.0) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

pub fn silence(seconds: f64, sample_rate: u32) -> Vec<f32> {
    vec![0.0; (seconds * sample_rate as f64) as usize]
}

/// A vowel-like harmonic tone over seeded noise.
pub fn voiced(seconds: f64, sample_rate: u32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = (seconds * sample_rate as f64) as usize;
    (0..n)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let tone: f32 = (1..=5)
                .map(|h| (2.0 * std::f32::consts::PI * 180.0 * h as f32 * t).sin() / h as f32)
                .sum();
            0.2 * tone + 0.02 * rng.gen_range(-1.0f32..1.0)
        })
        .collect()
}

/// Identity scaler plus linear models with zero weights, so the
/// predictions are fixed by the intercepts.
pub struct Artifacts {
    pub emotion: PathBuf,
    pub stress: PathBuf,
    pub scaler: PathBuf,
}

pub fn write_artifacts(dir: &Path, class_intercepts: &[f32], classes: &[i64], stress_intercept: f32) -> Artifacts {
    let artifacts = Artifacts {
        emotion: dir.join("model_emotion.json"),
        stress: dir.join("model_stress.json"),
        scaler: dir.join("scaler.json"),
    };
    write_scaler(&artifacts.scaler, FEATURE_DIM);

    let coef = vec![vec![0.0f32; FEATURE_DIM]; class_intercepts.len()];
    let emotion = serde_json::json!({ "coef": coef, "intercept": class_intercepts, "classes": classes });
    std::fs::write(&artifacts.emotion, emotion.to_string()).unwrap();

    let stress = serde_json::json!({ "coef": vec![0.0f32; FEATURE_DIM], "intercept": stress_intercept });
    std::fs::write(&artifacts.stress, stress.to_string()).unwrap();
    artifacts
}

pub fn write_scaler(path: &Path, dims: usize) {
    let scaler = serde_json::json!({ "mean": vec![0.0f32; dims], "scale": vec![1.0f32; dims] });
    std::fs::write(path, scaler.to_string()).unwrap();
}

/// Artifacts predicting class 4 (Neutral) with the given raw stress.
pub fn neutral_artifacts(dir: &Path, stress_intercept: f32) -> Artifacts {
    write_artifacts(dir, &[0.0, 0.0, 0.0, 0.0, 1.0], &[0, 1, 2, 3, 4], stress_intercept)
}

pub fn config_for(artifacts: &Artifacts) -> emostress::Config {
    let mut config = emostress::Config::default();
    config.artifacts.emotion_model = artifacts.emotion.clone();
    config.artifacts.stress_model = artifacts.stress.clone();
    config.artifacts.scaler = artifacts.scaler.clone();
    config
}
