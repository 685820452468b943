//! Tonal centroid features
//!
//! Projects L1-normalised chroma onto three circles of the harmonic network:
//! fifths, minor thirds and major thirds, each as a (sin-like, cos-like) pair.

use std::f64::consts::PI;
use ndarray::Array2;
use super::chroma::N_CHROMA;

pub const N_TONNETZ: usize = 6;

/// Projection matrix of shape `(6, 12)`.
pub fn tonnetz_basis() -> Array2<f32> {
    const INTERVALS: [f64; N_TONNETZ] = [7.0 / 6.0, 7.0 / 6.0, 3.0 / 2.0, 3.0 / 2.0, 2.0 / 3.0, 2.0 / 3.0];
    const RADII: [f64; N_TONNETZ] = [1.0, 1.0, 1.0, 1.0, 0.5, 0.5];

    let mut basis = Array2::<f32>::zeros((N_TONNETZ, N_CHROMA));
    for r in 0..N_TONNETZ {
        // Even rows are phase-shifted by half a cycle.
        let shift = if r % 2 == 0 { 0.5 } else { 0.0 };
        for c in 0..N_CHROMA {
            let v = INTERVALS[r] * c as f64 - shift;
            basis[[r, c]] = (RADII[r] * (PI * v).cos()) as f32;
        }
    }
    basis
}

/// Tonnetz of shape `(6, n_frames)` from a chromagram.
pub fn tonnetz(chroma: &Array2<f32>) -> Array2<f32> {
    let mut normalized = chroma.clone();
    for mut column in normalized.columns_mut() {
        let l1: f32 = column.iter().map(|v| v.abs()).sum();
        if l1 > f32::MIN_POSITIVE {
            column.mapv_inplace(|v| v / l1);
        }
    }
    tonnetz_basis().dot(&normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basis_values() {
        let basis = tonnetz_basis();
        // Pitch class C sits at phase zero on the odd rows
        assert!((basis[[1, 0]] - 1.0).abs() < 1e-6);
        assert!(basis[[0, 0]].abs() < 1e-6);
        assert!((basis[[5, 0]] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_single_pitch_class_matches_basis_column() {
        let mut chroma = Array2::<f32>::zeros((12, 1));
        chroma[[7, 0]] = 0.25;
        let t = tonnetz(&chroma);
        let basis = tonnetz_basis();
        for r in 0..N_TONNETZ {
            assert!((t[[r, 0]] - basis[[r, 7]]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_silent_frame_projects_to_origin() {
        let t = tonnetz(&Array2::<f32>::zeros((12, 3)));
        assert!(t.iter().all(|&v| v == 0.0));
    }
}
