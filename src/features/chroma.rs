//! Pitch-class energy from the short-time spectrum

use ndarray::Array2;
use super::stft::fft_frequencies;

pub const N_CHROMA: usize = 12;

const PIP_FMIN: f64 = 150.0;
const PIP_FMAX: f64 = 4000.0;
const PIP_THRESHOLD: f32 = 0.1;
const TUNING_RESOLUTION: f64 = 0.01;

/// Octaves relative to C0, with A4 shifted by `tuning` fractions of a bin.
pub fn hz_to_octs(hz: f64, tuning: f64, bins_per_octave: usize) -> f64 {
    let a440 = 440.0 * 2f64.powf(tuning / bins_per_octave as f64);
    (hz / (a440 / 16.0)).log2()
}

/// Gaussian chroma filterbank of shape `(12, 1 + n_fft / 2)`, starting at C.
pub fn chroma_filterbank(sample_rate: u32, n_fft: usize, tuning: f64) -> Array2<f32> {
    const CENTER_OCTAVE: f64 = 5.0;
    const OCTAVE_WIDTH: f64 = 2.0;
    let n_chroma = N_CHROMA as f64;

    // Bin 0 has no pitch; it is placed 1.5 octaves below bin 1.
    let mut frqbins: Vec<f64> = (1..n_fft)
        .map(|k| {
            let hz = k as f64 * sample_rate as f64 / n_fft as f64;
            n_chroma * hz_to_octs(hz, tuning, N_CHROMA)
        })
        .collect();
    frqbins.insert(0, frqbins[0] - 1.5 * n_chroma);

    let mut binwidths: Vec<f64> = frqbins.windows(2).map(|w| (w[1] - w[0]).max(1.0)).collect();
    binwidths.push(1.0);

    let half = (n_chroma / 2.0).round();
    let mut weights = vec![vec![0.0f64; n_fft]; N_CHROMA];
    for (k, (&bin, &width)) in frqbins.iter().zip(&binwidths).enumerate() {
        for (c, row) in weights.iter_mut().enumerate() {
            let d = (bin - c as f64 + half + 10.0 * n_chroma).rem_euclid(n_chroma) - half;
            row[k] = (-0.5 * (2.0 * d / width).powi(2)).exp();
        }
    }

    for k in 0..n_fft {
        let norm = weights.iter().map(|row| row[k] * row[k]).sum::<f64>().sqrt();
        let octave_weight = (-0.5 * ((frqbins[k] / n_chroma - CENTER_OCTAVE) / OCTAVE_WIDTH).powi(2)).exp();
        for row in weights.iter_mut() {
            if norm > f64::MIN_POSITIVE {
                row[k] /= norm;
            }
            row[k] *= octave_weight;
        }
    }

    // Rows are built from A; rotate so row 0 is C.
    let n_bins = n_fft / 2 + 1;
    let mut filterbank = Array2::<f32>::zeros((N_CHROMA, n_bins));
    for c in 0..N_CHROMA {
        let source = &weights[(c + 3) % N_CHROMA];
        for k in 0..n_bins {
            filterbank[[c, k]] = source[k] as f32;
        }
    }
    filterbank
}

/// Divide every column by its largest magnitude; near-zero columns are left as-is.
pub fn normalize_columns_max(matrix: &mut Array2<f32>) {
    for mut column in matrix.columns_mut() {
        let peak = column.iter().fold(0.0f32, |acc, v| acc.max(v.abs()));
        if peak > f32::MIN_POSITIVE {
            column.mapv_inplace(|v| v / peak);
        }
    }
}

/// Parabolic-interpolated spectral peaks between 150 Hz and 4 kHz.
///
/// Returns `(pitches, magnitudes)`, both shaped like `spectrogram`, zero where
/// no peak was found.
pub fn piptrack(spectrogram: &Array2<f32>, sample_rate: u32, n_fft: usize) -> (Array2<f32>, Array2<f32>) {
    let (n_bins, n_frames) = spectrogram.dim();
    let mut pitches = Array2::<f32>::zeros((n_bins, n_frames));
    let mut mags = Array2::<f32>::zeros((n_bins, n_frames));
    if n_bins < 3 {
        return (pitches, mags);
    }

    let fmax = PIP_FMAX.min(sample_rate as f64 / 2.0);
    let freqs = fft_frequencies(sample_rate, n_fft);

    for t in 0..n_frames {
        let column = spectrogram.column(t);
        let frame_peak = column.iter().copied().fold(0.0f32, f32::max);
        let reference = PIP_THRESHOLD * frame_peak;
        let gated = |k: usize| if column[k] > reference { column[k] } else { 0.0 };

        for k in 1..n_bins - 1 {
            if !(PIP_FMIN <= freqs[k] && freqs[k] < fmax) {
                continue;
            }
            let here = gated(k);
            let is_peak = here > gated(k - 1) && here >= gated(k + 1);
            if !is_peak {
                continue;
            }

            let avg = 0.5 * (column[k + 1] - column[k - 1]);
            let curvature = 2.0 * column[k] - column[k + 1] - column[k - 1];
            let shift = if curvature.abs() < f32::MIN_POSITIVE { avg / (curvature + 1.0) } else { avg / curvature };
            let dskew = 0.5 * avg * shift;

            pitches[[k, t]] = ((k as f64 + shift as f64) * sample_rate as f64 / n_fft as f64) as f32;
            mags[[k, t]] = column[k] + dskew;
        }
    }

    (pitches, mags)
}

/// Deviation from A440 tuning, in fractions of a chroma bin within `[-0.5, 0.5)`.
pub fn estimate_tuning(spectrogram: &Array2<f32>, sample_rate: u32, n_fft: usize) -> f64 {
    let (pitches, mags) = piptrack(spectrogram, sample_rate, n_fft);

    let mut voiced: Vec<f32> = pitches.iter()
        .zip(mags.iter())
        .filter(|(p, _)| **p > 0.0)
        .map(|(_, m)| *m)
        .collect();
    if voiced.is_empty() {
        return 0.0;
    }
    let threshold = median(&mut voiced);

    let frequencies: Vec<f64> = pitches.iter()
        .zip(mags.iter())
        .filter(|(p, m)| **p > 0.0 && **m >= threshold)
        .map(|(p, _)| *p as f64)
        .collect();
    pitch_tuning(&frequencies, N_CHROMA)
}

/// Most common sub-bin deviation of `frequencies`, on a 0.01-bin histogram.
pub fn pitch_tuning(frequencies: &[f64], bins_per_octave: usize) -> f64 {
    let n_edges = (1.0 / TUNING_RESOLUTION).ceil() as usize + 1;
    let n_cells = n_edges - 1;
    let mut counts = vec![0usize; n_cells];
    let mut any = false;

    for &freq in frequencies.iter().filter(|f| **f > 0.0) {
        any = true;
        let mut residual = (bins_per_octave as f64 * hz_to_octs(freq, 0.0, bins_per_octave)).rem_euclid(1.0);
        if residual >= 0.5 {
            residual -= 1.0;
        }
        let cell = (((residual + 0.5) / TUNING_RESOLUTION).floor() as usize).min(n_cells - 1);
        counts[cell] += 1;
    }
    if !any {
        return 0.0;
    }

    let best = counts.iter()
        .enumerate()
        .fold((0, 0), |best, (i, &c)| if c > best.1 { (i, c) } else { best })
        .0;
    -0.5 + best as f64 / n_cells as f64
}

fn median(values: &mut [f32]) -> f32 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        0.5 * (values[mid - 1] + values[mid])
    } else {
        values[mid]
    }
}

/// Chromagram of a power spectrogram. `tuning = None` estimates it from the spectrum.
pub fn chroma_stft(power: &Array2<f32>, sample_rate: u32, n_fft: usize, tuning: Option<f64>) -> Array2<f32> {
    let tuning = tuning.unwrap_or_else(|| estimate_tuning(power, sample_rate, n_fft));
    let mut chroma = chroma_filterbank(sample_rate, n_fft, tuning).dot(power);
    normalize_columns_max(&mut chroma);
    chroma
}
