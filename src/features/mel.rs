//! Mel spectrogram and MFCC computation
//!
//! Uses the Slaney mel scale (linear below 1 kHz, logarithmic above) with
//! Slaney area normalisation of each triangular filter.

use std::f64::consts::PI;
use ndarray::Array2;

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Mel filterbank of shape `(n_mels, 1 + n_fft / 2)` spanning 0 Hz to Nyquist.
pub fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Array2<f32> {
    let n_freqs = n_fft / 2 + 1;
    let nyquist = sample_rate as f64 / 2.0;
    let fft_freqs: Vec<f64> = (0..n_freqs)
        .map(|k| k as f64 * nyquist / (n_freqs - 1).max(1) as f64)
        .collect();

    let mel_max = hz_to_mel(nyquist);
    let mel_f: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
        .collect();

    let mut weights = Array2::<f32>::zeros((n_mels, n_freqs));
    for m in 0..n_mels {
        let (left, center, right) = (mel_f[m], mel_f[m + 1], mel_f[m + 2]);
        let enorm = 2.0 / (right - left);
        for (k, &freq) in fft_freqs.iter().enumerate() {
            let lower = (freq - left) / (center - left);
            let upper = (right - freq) / (right - center);
            let weight = lower.min(upper).max(0.0);
            weights[[m, k]] = (weight * enorm) as f32;
        }
    }
    weights
}

/// Project a power spectrogram onto the mel filterbank.
pub fn melspectrogram(power: &Array2<f32>, sample_rate: u32, n_fft: usize, n_mels: usize) -> Array2<f32> {
    mel_filterbank(sample_rate, n_fft, n_mels).dot(power)
}

/// Power to decibels with `ref = 1`, `amin = 1e-10` and an 80 dB dynamic range floor.
pub fn power_to_db(power: &Array2<f32>) -> Array2<f32> {
    const AMIN: f32 = 1e-10;
    const TOP_DB: f32 = 80.0;

    let log_spec = power.mapv(|p| 10.0 * p.max(AMIN).log10());
    let peak = log_spec.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    log_spec.mapv(|v| v.max(peak - TOP_DB))
}

/// Orthonormal DCT-II basis keeping the first `n_out` coefficients.
pub fn dct_basis(n_out: usize, n_in: usize) -> Array2<f32> {
    let mut basis = Array2::<f32>::zeros((n_out, n_in));
    for k in 0..n_out {
        let norm = if k == 0 { (1.0 / n_in as f64).sqrt() } else { (2.0 / n_in as f64).sqrt() };
        for n in 0..n_in {
            let angle = PI * k as f64 * (2 * n + 1) as f64 / (2 * n_in) as f64;
            basis[[k, n]] = (norm * angle.cos()) as f32;
        }
    }
    basis
}

/// MFCCs from a mel power spectrogram.
pub fn mfcc(mel_power: &Array2<f32>, n_mfcc: usize) -> Array2<f32> {
    let log_mel = power_to_db(mel_power);
    dct_basis(n_mfcc, log_mel.nrows()).dot(&log_mel)
}
