//! Constant-Q transform and CQT chroma
//!
//! The transform is computed at the native sample rate by projecting a
//! rectangular-window STFT onto a sparse spectral kernel, one row per
//! constant-Q wavelet.

use std::f64::consts::PI;
use ndarray::Array2;
use rustfft::FftPlanner;
use rustfft::num_complex::Complex32;
use crate::error::{EmoStressError, Result};
use super::chroma::{N_CHROMA, normalize_columns_max};
use super::stft::{hann_window, stft};

/// Frequency of C1.
pub const C1_HZ: f64 = 32.703_195_662_574_764;
pub const BINS_PER_OCTAVE: usize = 12;
pub const N_OCTAVES: usize = 7;

/// Equivalent noise bandwidth of a Hann window, in bins.
const HANN_BANDWIDTH: f64 = 1.500_183_105_468_75;
/// Fraction of each kernel row's magnitude that may be discarded.
const SPARSITY: f64 = 0.01;

/// Precomputed spectral kernel for one sample rate.
#[derive(Debug, Clone)]
pub struct ConstantQ {
    n_fft: usize,
    hop_length: usize,
    lengths: Vec<f64>,
    rows: Vec<Vec<(usize, Complex32)>>,
}

impl ConstantQ {
    pub fn new(sample_rate: u32, fmin: f64, n_bins: usize, hop_length: usize) -> Result<Self> {
        if fmin <= 0.0 || n_bins == 0 || hop_length == 0 {
            return Err(EmoStressError::feature_extraction("Invalid constant-Q parameters"));
        }

        let sr = sample_rate as f64;
        let ratio = 2f64.powf(2.0 / BINS_PER_OCTAVE as f64);
        let alpha = (ratio - 1.0) / (ratio + 1.0);
        let q = 1.0 / alpha;

        let freqs: Vec<f64> = (0..n_bins)
            .map(|k| fmin * 2f64.powf(k as f64 / BINS_PER_OCTAVE as f64))
            .collect();
        let cutoff = freqs.iter().fold(0.0f64, |acc, f| acc.max(f * (1.0 + 0.5 * HANN_BANDWIDTH / q)));
        if cutoff > sr / 2.0 {
            return Err(EmoStressError::feature_extraction(format!(
                "Constant-Q filters reach {:.1} Hz, above Nyquist at {} Hz sample rate", cutoff, sample_rate
            )));
        }

        let lengths: Vec<f64> = freqs.iter().map(|f| q * sr / f).collect();
        let longest = lengths.iter().fold(0.0f64, |acc, &l| acc.max(l));
        let min_fft = 1usize << (1 + (hop_length as f64).log2().ceil() as u32);
        let n_fft = (longest.ceil() as usize).next_power_of_two().max(min_fft);

        let fft = FftPlanner::<f64>::new().plan_fft_forward(n_fft);
        let mut rows = Vec::with_capacity(n_bins);
        for (&freq, &length) in freqs.iter().zip(&lengths) {
            let row = wavelet_spectrum(freq, length, sr, n_fft, fft.as_ref());
            rows.push(sparsify(&row));
        }

        log::debug!("Constant-Q kernel: {} bins, FFT size {}, sample rate {}", n_bins, n_fft, sample_rate);
        Ok(Self { n_fft, hop_length, lengths, rows })
    }

    pub fn n_bins(&self) -> usize {
        self.rows.len()
    }

    /// CQT magnitudes of shape `(n_bins, 1 + len / hop_length)`.
    pub fn magnitude(&self, y: &[f32]) -> Result<Array2<f32>> {
        let spectrum = stft(y, self.n_fft, self.hop_length, &vec![1.0; self.n_fft])?;
        let n_frames = spectrum.ncols();
        let mut out = Array2::<f32>::zeros((self.rows.len(), n_frames));

        for (k, (row, &length)) in self.rows.iter().zip(&self.lengths).enumerate() {
            let scale = 1.0 / length.sqrt() as f32;
            for t in 0..n_frames {
                let response: Complex32 = row.iter()
                    .map(|&(bin, weight)| weight * spectrum[[bin, t]])
                    .sum();
                out[[k, t]] = response.norm() * scale;
            }
        }
        Ok(out)
    }
}

/// Spectrum of one Hann-windowed, L1-normalised complex wavelet centred in `n_fft`.
fn wavelet_spectrum(
    freq: f64,
    length: f64,
    sr: f64,
    n_fft: usize,
    fft: &dyn rustfft::Fft<f64>,
) -> Vec<rustfft::num_complex::Complex64> {
    use rustfft::num_complex::Complex64;

    let start = (-length / 2.0).floor();
    let count = ((length / 2.0).floor() - start) as usize;
    let window = hann_window(count);

    let mut wavelet: Vec<Complex64> = (0..count)
        .map(|n| {
            let phase = 2.0 * PI * freq * (start + n as f64) / sr;
            Complex64::from_polar(window[n] as f64, phase)
        })
        .collect();
    let l1: f64 = wavelet.iter().map(|c| c.norm()).sum();
    let gain = if l1 > 0.0 { length / (l1 * n_fft as f64) } else { 0.0 };
    wavelet.iter_mut().for_each(|c| *c *= gain);

    let mut buffer = vec![Complex64::new(0.0, 0.0); n_fft];
    let offset = (n_fft - count) / 2;
    buffer[offset..offset + count].copy_from_slice(&wavelet);
    fft.process(&mut buffer);
    buffer.truncate(n_fft / 2 + 1);
    buffer
}

/// Drop the smallest entries of a row, up to `SPARSITY` of its total magnitude.
fn sparsify(row: &[rustfft::num_complex::Complex64]) -> Vec<(usize, Complex32)> {
    let mags: Vec<f64> = row.iter().map(|c| c.norm()).collect();
    let total: f64 = mags.iter().sum();
    if total <= 0.0 {
        return Vec::new();
    }

    let mut sorted = mags.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mut cumulative = 0.0;
    let mut threshold = sorted[sorted.len() - 1];
    for &m in &sorted {
        cumulative += m / total;
        if cumulative >= SPARSITY {
            threshold = m;
            break;
        }
    }

    row.iter()
        .zip(&mags)
        .enumerate()
        .filter(|(_, (_, m))| **m >= threshold)
        .map(|(i, (c, _))| (i, Complex32::new(c.re as f32, c.im as f32)))
        .collect()
}

/// MIDI pitch class of `hz`, rounded to the nearest semitone.
fn pitch_class(hz: f64) -> usize {
    let midi = 12.0 * (hz / 440.0).log2() + 69.0;
    (midi.round() as i64).rem_euclid(N_CHROMA as i64) as usize
}

/// Fold CQT magnitudes into 12 C-based pitch classes, max-normalised per frame.
pub fn fold_to_chroma(cqt: &Array2<f32>, fmin: f64) -> Array2<f32> {
    let roll = pitch_class(fmin);
    let mut chroma = Array2::<f32>::zeros((N_CHROMA, cqt.ncols()));
    for (b, row) in cqt.rows().into_iter().enumerate() {
        let mut target = chroma.row_mut((b + roll) % N_CHROMA);
        target += &row;
    }
    normalize_columns_max(&mut chroma);
    chroma
}

/// Chroma from a 7-octave constant-Q transform starting at `fmin`, shifted by
/// `tuning` fractions of a bin.
pub fn chroma_cqt(y: &[f32], sample_rate: u32, hop_length: usize, fmin: f64, tuning: f64) -> Result<Array2<f32>> {
    let tuned_fmin = fmin * 2f64.powf(tuning / BINS_PER_OCTAVE as f64);
    let transform = ConstantQ::new(sample_rate, tuned_fmin, N_OCTAVES * BINS_PER_OCTAVE, hop_length)?;
    let magnitude = transform.magnitude(y)?;
    Ok(fold_to_chroma(&magnitude, fmin))
}
