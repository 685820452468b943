//! Feature Extraction Module
//!
//! Turns an [`AudioClip`] into a fixed 193-dimensional descriptor: the time
//! averages of MFCC (40), chroma (12), mel band energies (128), spectral
//! contrast (7) and tonnetz (6), concatenated in exactly that order.
//! Tonnetz is computed on the harmonic component only; the other four use
//! the raw waveform.

pub mod chroma;
pub mod contrast;
pub mod cqt;
pub mod hpss;
pub mod mel;
pub mod stft;
pub mod tonnetz;

use std::ops::Range;
use std::time::Instant;
use ndarray::{Array2, Axis};
use crate::audio::AudioClip;
use crate::config::FeatureConfig;
use crate::error::{EmoStressError, Result};

pub const MFCC_DIM: usize = 40;
pub const CHROMA_DIM: usize = chroma::N_CHROMA;
pub const MEL_DIM: usize = 128;
pub const CONTRAST_DIM: usize = contrast::N_BANDS + 1;
pub const TONNETZ_DIM: usize = tonnetz::N_TONNETZ;
pub const FEATURE_DIM: usize = MFCC_DIM + CHROMA_DIM + MEL_DIM + CONTRAST_DIM + TONNETZ_DIM;

/// One descriptor block of the feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Mfcc,
    Chroma,
    Mel,
    Contrast,
    Tonnetz,
}

impl FeatureKind {
    /// Concatenation order. Normalizers and models are fitted against it.
    pub const ORDER: [FeatureKind; 5] = [
        FeatureKind::Mfcc,
        FeatureKind::Chroma,
        FeatureKind::Mel,
        FeatureKind::Contrast,
        FeatureKind::Tonnetz,
    ];

    pub fn dim(self) -> usize {
        match self {
            FeatureKind::Mfcc => MFCC_DIM,
            FeatureKind::Chroma => CHROMA_DIM,
            FeatureKind::Mel => MEL_DIM,
            FeatureKind::Contrast => CONTRAST_DIM,
            FeatureKind::Tonnetz => TONNETZ_DIM,
        }
    }

    pub fn range(self) -> Range<usize> {
        let offset: usize = Self::ORDER.iter()
            .take_while(|&&kind| kind != self)
            .map(|kind| kind.dim())
            .sum();
        offset..offset + self.dim()
    }

    pub fn name(self) -> &'static str {
        match self {
            FeatureKind::Mfcc => "mfcc",
            FeatureKind::Chroma => "chroma",
            FeatureKind::Mel => "mel",
            FeatureKind::Contrast => "contrast",
            FeatureKind::Tonnetz => "tonnetz",
        }
    }
}

/// Fixed-length clip descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    /// Concatenate the five time-averaged blocks in [`FeatureKind::ORDER`].
    pub fn from_parts(mfcc: &[f32], chroma: &[f32], mel: &[f32], contrast: &[f32], tonnetz: &[f32]) -> Result<Self> {
        let parts = [mfcc, chroma, mel, contrast, tonnetz];
        let mut values = Vec::with_capacity(FEATURE_DIM);
        for (kind, part) in FeatureKind::ORDER.iter().zip(parts) {
            if part.len() != kind.dim() {
                return Err(EmoStressError::feature_extraction(format!(
                    "{} block has {} values, expected {}", kind.name(), part.len(), kind.dim()
                )));
            }
            values.extend_from_slice(part);
        }
        Self::from_vec(values)
    }

    /// Wrap a precomputed vector, checking its length and values.
    pub fn from_vec(values: Vec<f32>) -> Result<Self> {
        if values.len() != FEATURE_DIM {
            return Err(EmoStressError::feature_extraction(format!(
                "Feature vector has {} values, expected {}", values.len(), FEATURE_DIM
            )));
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(EmoStressError::feature_extraction(format!("Feature {} is not finite", i)));
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn segment(&self, kind: FeatureKind) -> &[f32] {
        &self.0[kind.range()]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Per-frame descriptors, each shaped `(dim, n_frames)`.
#[derive(Debug, Clone)]
pub struct FeatureFrames {
    pub mfcc: Array2<f32>,
    pub chroma: Array2<f32>,
    pub mel: Array2<f32>,
    pub contrast: Array2<f32>,
    pub tonnetz: Array2<f32>,
}

impl FeatureFrames {
    /// Collapse the time axis and concatenate.
    pub fn summarize(&self) -> Result<FeatureVector> {
        FeatureVector::from_parts(
            &time_mean(&self.mfcc),
            &time_mean(&self.chroma),
            &time_mean(&self.mel),
            &time_mean(&self.contrast),
            &time_mean(&self.tonnetz),
        )
    }
}

/// Mean of every row over the frame axis.
pub fn time_mean(frames: &Array2<f32>) -> Vec<f32> {
    let n_frames = frames.ncols().max(1) as f64;
    frames.axis_iter(Axis(0))
        .map(|row| (row.iter().map(|&v| v as f64).sum::<f64>() / n_frames) as f32)
        .collect()
}

/// Stateless extractor; holds only the analysis calibration.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn extract(&self, clip: &AudioClip) -> Result<FeatureVector> {
        self.extract_frames(clip)?.summarize()
    }

    pub fn extract_frames(&self, clip: &AudioClip) -> Result<FeatureFrames> {
        let start = Instant::now();
        let cfg = &self.config;
        let y = clip.samples();
        let sr = clip.sample_rate();
        let window = stft::hann_window(cfg.win_length());

        let spectrum = stft::stft(y, cfg.n_fft, cfg.hop_length, &window)?;
        let power = spectrum.mapv(|c| c.norm_sqr());
        let magnitude = spectrum.mapv(|c| c.norm());

        let mel = mel::melspectrogram(&power, sr, cfg.n_fft, MEL_DIM);
        let mfcc = mel::mfcc(&mel, MFCC_DIM);
        let chroma = chroma::chroma_stft(&power, sr, cfg.n_fft, cfg.tuning);
        let contrast = contrast::spectral_contrast(&magnitude, sr, cfg.n_fft, cfg.contrast_fmin, cfg.contrast_quantile)?;

        let harmonic = hpss::harmonic(y, cfg.n_fft, cfg.hop_length, &window, cfg.hpss_kernel, cfg.hpss_margin)?;
        let tonnetz = self.harmonic_tonnetz(&harmonic, sr, &window)?;

        log::debug!(
            "Extracted {} frames from {:.2}s at {} Hz in {:.1}ms",
            power.ncols(), clip.duration(), sr, start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(FeatureFrames { mfcc, chroma, mel, contrast, tonnetz })
    }

    fn harmonic_tonnetz(&self, harmonic: &[f32], sr: u32, window: &[f32]) -> Result<Array2<f32>> {
        let cfg = &self.config;
        let tuning = match cfg.tuning {
            Some(t) => t,
            None => {
                let magnitude = stft::stft(harmonic, cfg.n_fft, cfg.hop_length, window)?.mapv(|c| c.norm());
                chroma::estimate_tuning(&magnitude, sr, cfg.n_fft)
            }
        };
        let chroma = cqt::chroma_cqt(harmonic, sr, cfg.hop_length, cfg.cqt_fmin, tuning)?;
        Ok(tonnetz::tonnetz(&chroma))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_contiguous() {
        assert_eq!(FEATURE_DIM, 193);
        assert_eq!(FeatureKind::Mfcc.range(), 0..40);
        assert_eq!(FeatureKind::Chroma.range(), 40..52);
        assert_eq!(FeatureKind::Mel.range(), 52..180);
        assert_eq!(FeatureKind::Contrast.range(), 180..187);
        assert_eq!(FeatureKind::Tonnetz.range(), 187..193);
    }

    fn distinct_parts() -> [Vec<f32>; 5] {
        [
            vec![1.0; MFCC_DIM],
            vec![2.0; CHROMA_DIM],
            vec![3.0; MEL_DIM],
            vec![4.0; CONTRAST_DIM],
            vec![5.0; TONNETZ_DIM],
        ]
    }

    #[test]
    fn test_from_parts_keeps_order() {
        let [mfcc, chroma, mel, contrast, tonnetz] = distinct_parts();
        let v = FeatureVector::from_parts(&mfcc, &chroma, &mel, &contrast, &tonnetz).unwrap();
        assert_eq!(v.len(), FEATURE_DIM);
        for (i, kind) in FeatureKind::ORDER.iter().enumerate() {
            assert!(v.segment(*kind).iter().all(|&x| x == (i + 1) as f32));
        }
    }

    #[test]
    fn test_swapping_blocks_changes_vector() {
        let [mfcc, chroma, mel, contrast, tonnetz] = distinct_parts();
        let v = FeatureVector::from_parts(&mfcc, &chroma, &mel, &contrast, &tonnetz).unwrap();

        let mut swapped = Vec::new();
        for part in [&chroma, &mfcc, &mel, &contrast, &tonnetz] {
            swapped.extend_from_slice(part);
        }
        let swapped = FeatureVector::from_vec(swapped).unwrap();
        assert_eq!(swapped.len(), v.len());
        assert_ne!(swapped, v);
    }

    #[test]
    fn test_from_parts_rejects_wrong_block_size() {
        let [mfcc, chroma, mel, contrast, _] = distinct_parts();
        let err = FeatureVector::from_parts(&mfcc, &chroma, &mel, &contrast, &[0.0; 12]).unwrap_err();
        assert!(matches!(err, EmoStressError::FeatureExtraction { .. }));
    }

    #[test]
    fn test_from_vec_rejects_nan() {
        let mut values = vec![0.0; FEATURE_DIM];
        values[17] = f32::NAN;
        assert!(FeatureVector::from_vec(values).is_err());
    }

    #[test]
    fn test_time_mean() {
        let frames = Array2::from_shape_vec((2, 4), vec![1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0, 8.0]).unwrap();
        assert_eq!(time_mean(&frames), vec![2.5, 2.0]);
    }

    #[test]
    fn test_extractor_rejects_invalid_config() {
        let config = FeatureConfig { hop_length: 0, ..FeatureConfig::default() };
        assert!(FeatureExtractor::new(config).is_err());
    }
}
