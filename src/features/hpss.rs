//! Harmonic/percussive separation by median filtering
//!
//! Harmonic energy is smooth along time, percussive energy is smooth along
//! frequency. Each is estimated with a median filter on the magnitude
//! spectrogram and turned into a soft mask for the complex STFT.

use ndarray::{Array2, Axis};
use rustfft::num_complex::Complex32;
use crate::error::{EmoStressError, Result};
use super::stft::{istft, stft};

/// Median filter along `axis` with a centered odd-length kernel and
/// half-sample symmetric boundaries (`d c b a | a b c d | d c b a`).
pub fn median_filter(input: &Array2<f32>, kernel: usize, axis: Axis) -> Array2<f32> {
    let mut output = Array2::<f32>::zeros(input.dim());
    let half = (kernel / 2) as isize;
    let mut scratch = vec![0.0f32; kernel];

    for (lane_in, mut lane_out) in input.lanes(axis).into_iter().zip(output.lanes_mut(axis)) {
        let n = lane_in.len() as isize;
        for i in 0..n {
            for (slot, offset) in scratch.iter_mut().zip(-half..=half) {
                *slot = lane_in[reflect_index(i + offset, n)];
            }
            let (_, median, _) = scratch.select_nth_unstable_by(kernel / 2, |a, b| a.total_cmp(b));
            lane_out[i as usize] = *median;
        }
    }
    output
}

fn reflect_index(index: isize, len: isize) -> usize {
    let period = 2 * len;
    let mut i = index.rem_euclid(period);
    if i >= len {
        i = period - 1 - i;
    }
    i as usize
}

/// Wiener-style soft mask `x^p / (x^p + reference^p)`. Where both vanish the
/// mask is 0.5 with `split_zeros`, else 0.
pub fn softmask(x: &Array2<f32>, reference: &Array2<f32>, power: f32, split_zeros: bool) -> Array2<f32> {
    let empty = if split_zeros { 0.5 } else { 0.0 };
    let mut mask = Array2::<f32>::zeros(x.dim());
    ndarray::Zip::from(&mut mask)
        .and(x)
        .and(reference)
        .for_each(|m, &a, &b| {
            let z = a.max(b);
            if z < f32::MIN_POSITIVE {
                *m = empty;
                return;
            }
            let a = (a / z).powf(power);
            let b = (b / z).powf(power);
            *m = a / (a + b);
        });
    mask
}

/// Harmonic component of a complex spectrogram.
pub fn harmonic_spectrum(spectrum: &Array2<Complex32>, kernel: usize, margin: f32) -> Result<Array2<Complex32>> {
    if kernel == 0 || kernel % 2 == 0 {
        return Err(EmoStressError::feature_extraction(format!(
            "Median kernel must be odd and positive, got {}", kernel
        )));
    }
    if margin < 1.0 {
        return Err(EmoStressError::feature_extraction("Separation margin must be at least 1"));
    }

    let magnitude = spectrum.mapv(|c| c.norm());
    let harmonic = median_filter(&magnitude, kernel, Axis(1));
    let percussive = median_filter(&magnitude, kernel, Axis(0));
    // Without a margin the split is symmetric, so empty bins go half each way
    let mask = softmask(&harmonic, &(percussive * margin), 2.0, margin == 1.0);

    Ok(ndarray::Zip::from(spectrum)
        .and(&mask)
        .map_collect(|&c, &m| c * m))
}

/// Harmonic waveform of `y`, the same length as `y`.
pub fn harmonic(y: &[f32], n_fft: usize, hop_length: usize, window: &[f32], kernel: usize, margin: f32) -> Result<Vec<f32>> {
    let spectrum = stft(y, n_fft, hop_length, window)?;
    let harmonic = harmonic_spectrum(&spectrum, kernel, margin)?;
    istft(&harmonic, hop_length, window, y.len())
}
