//! Octave-band spectral contrast

use ndarray::Array2;
use crate::error::{EmoStressError, Result};
use super::mel::power_to_db;
use super::stft::fft_frequencies;

/// Octave bands above `fmin`; one more row is produced for everything below it.
pub const N_BANDS: usize = 6;

/// Peak/valley contrast in dB, shape `(N_BANDS + 1, n_frames)`.
///
/// Band 0 covers `[0, fmin]`, band `k` covers `[fmin * 2^(k-1), fmin * 2^k]`
/// plus the bin just below it, and the last band extends to Nyquist.
pub fn spectral_contrast(
    magnitude: &Array2<f32>,
    sample_rate: u32,
    n_fft: usize,
    fmin: f64,
    quantile: f64,
) -> Result<Array2<f32>> {
    if fmin <= 0.0 {
        return Err(EmoStressError::feature_extraction("Contrast fmin must be positive"));
    }
    if !(0.0 < quantile && quantile < 1.0) {
        return Err(EmoStressError::feature_extraction("Contrast quantile must lie in (0, 1)"));
    }

    let mut edges = vec![0.0f64];
    edges.extend((0..=N_BANDS).map(|i| fmin * 2f64.powi(i as i32)));
    let nyquist = sample_rate as f64 / 2.0;
    if edges[..edges.len() - 1].iter().any(|&e| e >= nyquist) {
        return Err(EmoStressError::feature_extraction(format!(
            "Contrast band edge {:.0} Hz reaches Nyquist at {} Hz sample rate",
            edges[edges.len() - 2], sample_rate
        )));
    }

    let freqs = fft_frequencies(sample_rate, n_fft);
    let n_frames = magnitude.ncols();
    let mut valley = Array2::<f32>::zeros((N_BANDS + 1, n_frames));
    let mut peak = Array2::<f32>::zeros((N_BANDS + 1, n_frames));

    for k in 0..=N_BANDS {
        let (f_low, f_high) = (edges[k], edges[k + 1]);
        let in_band: Vec<usize> = (0..freqs.len())
            .filter(|&i| freqs[i] >= f_low && freqs[i] <= f_high)
            .collect();
        let (Some(&first), Some(&last)) = (in_band.first(), in_band.last()) else {
            return Err(EmoStressError::feature_extraction(format!(
                "No FFT bins between {:.0} and {:.0} Hz; FFT size {} is too small", f_low, f_high, n_fft
            )));
        };

        let lo = if k > 0 { first.saturating_sub(1) } else { first };
        let hi = if k == N_BANDS { freqs.len() - 1 } else { last };
        let member_count = hi - lo + 1;
        // Interior bands drop their top bin from the statistics.
        let rows_end = if k < N_BANDS { hi } else { hi + 1 };

        let take = ((quantile * member_count as f64).round_ties_even() as usize).max(1);
        let mut column = Vec::with_capacity(rows_end - lo);
        for t in 0..n_frames {
            column.clear();
            column.extend((lo..rows_end).map(|i| magnitude[[i, t]]));
            if column.is_empty() {
                continue;
            }
            column.sort_by(|a, b| a.total_cmp(b));
            let take = take.min(column.len());
            valley[[k, t]] = column[..take].iter().sum::<f32>() / take as f32;
            peak[[k, t]] = column[column.len() - take..].iter().sum::<f32>() / take as f32;
        }
    }

    Ok(power_to_db(&peak) - power_to_db(&valley))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::stft::{hann_window, stft};

    #[test]
    fn test_shape_and_silence() {
        let magnitude = Array2::<f32>::zeros((1025, 5));
        let contrast = spectral_contrast(&magnitude, 22050, 2048, 200.0, 0.02).unwrap();
        assert_eq!(contrast.dim(), (7, 5));
        assert!(contrast.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_rejects_band_above_nyquist() {
        let magnitude = Array2::<f32>::zeros((513, 5));
        let err = spectral_contrast(&magnitude, 12000, 1024, 200.0, 0.02).unwrap_err();
        assert!(matches!(err, EmoStressError::FeatureExtraction { .. }));
        assert!(spectral_contrast(&magnitude, 16000, 1024, 200.0, 0.02).is_ok());
    }

    #[test]
    fn test_tone_raises_contrast_in_its_band() {
        let sr = 22050u32;
        // 1 kHz sits in the 800-1600 Hz band (row 3), over a faint white noise floor
        let mut state = 12345u32;
        let y: Vec<f32> = (0..sr as usize)
            .map(|i| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                let noise = (state >> 8) as f32 / (1u32 << 24) as f32 - 0.5;
                (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sr as f32).sin() + 0.002 * noise
            })
            .collect();
        let magnitude = stft(&y, 2048, 512, &hann_window(2048)).unwrap().mapv(|c| c.norm());
        let contrast = spectral_contrast(&magnitude, sr, 2048, 200.0, 0.02).unwrap();
        let mid = contrast.ncols() / 2;
        let tone_band = contrast[[3, mid]];
        assert!(tone_band > contrast[[1, mid]]);
        assert!(tone_band > 20.0, "contrast {}", tone_band);
    }

    #[test]
    fn test_parameter_validation() {
        let magnitude = Array2::<f32>::zeros((1025, 2));
        assert!(spectral_contrast(&magnitude, 22050, 2048, 0.0, 0.02).is_err());
        assert!(spectral_contrast(&magnitude, 22050, 2048, 200.0, 1.5).is_err());
    }
}
