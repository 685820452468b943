//! Short-time Fourier analysis and resynthesis
//!
//! Frames are centered: the signal is zero-padded by `n_fft / 2` on both sides,
//! so a clip of `n` samples yields `1 + n / hop_length` frames.

use std::f64::consts::PI;
use ndarray::Array2;
use rustfft::FftPlanner;
use rustfft::num_complex::Complex32;
use crate::error::{EmoStressError, Result};

/// Periodic Hann window.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| (0.5 - 0.5 * (2.0 * PI * i as f64 / size as f64).cos()) as f32)
        .collect()
}

/// Zero-pad `data` symmetrically up to `size`.
pub fn pad_center(data: &[f32], size: usize) -> Vec<f32> {
    let mut out = vec![0.0; size];
    let offset = (size - data.len()) / 2;
    out[offset..offset + data.len()].copy_from_slice(data);
    out
}

/// Centre frequency of every non-negative FFT bin.
pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f64> {
    (0..=n_fft / 2)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect()
}

/// Complex STFT of shape `(1 + n_fft / 2, n_frames)`.
pub fn stft(y: &[f32], n_fft: usize, hop_length: usize, window: &[f32]) -> Result<Array2<Complex32>> {
    if y.is_empty() {
        return Err(EmoStressError::feature_extraction("Cannot analyse an empty signal"));
    }
    if n_fft == 0 || hop_length == 0 {
        return Err(EmoStressError::feature_extraction("FFT size and hop length must be positive"));
    }
    if window.len() > n_fft {
        return Err(EmoStressError::feature_extraction(format!(
            "Window length {} exceeds FFT size {}", window.len(), n_fft
        )));
    }

    let window = pad_center(window, n_fft);
    let pad = n_fft / 2;
    let mut padded = vec![0.0f32; y.len() + 2 * pad];
    padded[pad..pad + y.len()].copy_from_slice(y);

    let n_frames = 1 + (padded.len() - n_fft) / hop_length;
    let n_bins = n_fft / 2 + 1;
    let fft = FftPlanner::<f32>::new().plan_fft_forward(n_fft);

    let mut spectrum = Array2::from_elem((n_bins, n_frames), Complex32::new(0.0, 0.0));
    let mut buffer = vec![Complex32::new(0.0, 0.0); n_fft];

    for t in 0..n_frames {
        let frame = &padded[t * hop_length..t * hop_length + n_fft];
        for ((slot, &sample), &w) in buffer.iter_mut().zip(frame).zip(&window) {
            *slot = Complex32::new(sample * w, 0.0);
        }
        fft.process(&mut buffer);
        for (k, value) in buffer[..n_bins].iter().enumerate() {
            spectrum[[k, t]] = *value;
        }
    }

    Ok(spectrum)
}

/// Inverse STFT by weighted overlap-add, trimmed to `length` samples.
pub fn istft(spectrum: &Array2<Complex32>, hop_length: usize, window: &[f32], length: usize) -> Result<Vec<f32>> {
    let (n_bins, n_frames) = spectrum.dim();
    if n_bins < 2 || hop_length == 0 {
        return Err(EmoStressError::feature_extraction("Spectrum too small to invert"));
    }
    let n_fft = 2 * (n_bins - 1);
    if window.len() > n_fft {
        return Err(EmoStressError::feature_extraction("Window longer than the inverse FFT"));
    }
    let window = pad_center(window, n_fft);

    let ifft = FftPlanner::<f32>::new().plan_fft_inverse(n_fft);
    let expected = n_fft + hop_length * n_frames.saturating_sub(1);
    let mut y = vec![0.0f32; expected];
    let mut norm = vec![0.0f32; expected];
    let mut buffer = vec![Complex32::new(0.0, 0.0); n_fft];
    let scale = 1.0 / n_fft as f32;

    for t in 0..n_frames {
        // Hermitian fill; imaginary parts of DC and Nyquist are discarded.
        buffer[0] = Complex32::new(spectrum[[0, t]].re, 0.0);
        buffer[n_fft / 2] = Complex32::new(spectrum[[n_bins - 1, t]].re, 0.0);
        for k in 1..n_bins - 1 {
            let value = spectrum[[k, t]];
            buffer[k] = value;
            buffer[n_fft - k] = value.conj();
        }
        ifft.process(&mut buffer);

        let start = t * hop_length;
        for j in 0..n_fft {
            y[start + j] += buffer[j].re * scale * window[j];
            norm[start + j] += window[j] * window[j];
        }
    }

    for (sample, &weight) in y.iter_mut().zip(&norm) {
        if weight > f32::MIN_POSITIVE {
            *sample /= weight;
        }
    }

    let offset = n_fft / 2;
    let mut out: Vec<f32> = y.into_iter().skip(offset).take(length).collect();
    out.resize(length, 0.0);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window_is_periodic() {
        let w = hann_window(4);
        assert_eq!(w.len(), 4);
        assert!(w[0].abs() < 1e-7);
        assert!((w[2] - 1.0).abs() < 1e-7);
        assert!((w[1] - 0.5).abs() < 1e-7);
    }

    #[test]
    fn test_frame_count_is_centered() {
        let y = vec![0.1f32; 5000];
        let spec = stft(&y, 512, 128, &hann_window(512)).unwrap();
        assert_eq!(spec.dim(), (257, 1 + 5000 / 128));
    }

    #[test]
    fn test_single_sample_signal() {
        let spec = stft(&[1.0], 64, 16, &hann_window(64)).unwrap();
        assert_eq!(spec.dim(), (33, 1));
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let sr = 8000u32;
        let n_fft = 256;
        // Bin 16 of a 256-point FFT at 8 kHz is 500 Hz
        let y: Vec<f32> = (0..4000)
            .map(|i| (2.0 * std::f32::consts::PI * 500.0 * i as f32 / sr as f32).sin())
            .collect();
        let spec = stft(&y, n_fft, 64, &hann_window(n_fft)).unwrap();
        let column = spec.column(20);
        let peak = column.iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
            .map(|(k, _)| k)
            .unwrap();
        assert_eq!(peak, 16);
        assert!((fft_frequencies(sr, n_fft)[peak] - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_istft_reconstructs_signal() {
        let n_fft = 256;
        let window = hann_window(n_fft);
        let y: Vec<f32> = (0..3000).map(|i| ((i as f32) * 0.05).sin() * 0.5).collect();
        let spec = stft(&y, n_fft, 64, &window).unwrap();
        let rebuilt = istft(&spec, 64, &window, y.len()).unwrap();
        assert_eq!(rebuilt.len(), y.len());
        let max_err = y.iter().zip(&rebuilt).map(|(a, b)| (a - b).abs()).fold(0.0f32, f32::max);
        assert!(max_err < 1e-3, "max reconstruction error {}", max_err);
    }

    #[test]
    fn test_rejects_empty_signal() {
        assert!(stft(&[], 64, 16, &hann_window(64)).is_err());
    }
}
