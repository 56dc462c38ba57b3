//! Standard scaling of encoded feature vectors.
//!
//! `ScalerStats` holds the per-column mean and standard deviation of the
//! training split. Transforming applies `(x - mean) / std` and refuses
//! vectors whose width differs from the fit-time width.

use serde::{Deserialize, Serialize};

use crate::codec::EncodedFeatureVector;
use crate::error::{PredictionError, Result};
use crate::math::Array2;

/// Per-column mean/std learned on the training split.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalerStats {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl ScalerStats {
    /// Minimum stddev to avoid division by zero when transforming.
    const MIN_STD: f32 = 1e-6;

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    /// Check that a deserialized scaler is usable.
    pub fn validate(&self) -> Result<()> {
        if self.mean.is_empty() || self.mean.len() != self.std.len() {
            return Err(PredictionError::CorruptArtifact(format!(
                "scaler has {} means and {} deviations",
                self.mean.len(),
                self.std.len()
            )));
        }
        if self.std.iter().any(|s| !s.is_finite() || *s <= 0.0)
            || self.mean.iter().any(|m| !m.is_finite())
        {
            return Err(PredictionError::CorruptArtifact(
                "scaler statistics contain non-finite or non-positive values".to_string(),
            ));
        }
        Ok(())
    }

    fn check_width(&self, actual: usize) -> Result<()> {
        if actual != self.width() {
            return Err(PredictionError::DimensionMismatch {
                expected: self.width(),
                actual,
            });
        }
        Ok(())
    }
}

/// Encoded vector after scaling; same width and order as the training matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct ScaledFeatureVector(Vec<f32>);

impl ScaledFeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }
}

/// Fit `ScalerStats` from a matrix where rows are samples and columns are
/// features. Uses the population standard deviation.
pub fn fit_scaler(x: &Array2<f32>) -> Result<ScalerStats> {
    let (nrows, ncols) = x.shape();
    if nrows == 0 || ncols == 0 {
        return Err(PredictionError::Training(
            "cannot fit scaler on an empty matrix".to_string(),
        ));
    }

    // Accumulate in f64; the training split can hold a few hundred thousand rows.
    let mut mean = vec![0.0f64; ncols];
    for row in x.rows() {
        for (m, &v) in mean.iter_mut().zip(row) {
            *m += v as f64;
        }
    }
    let nrows_f = nrows as f64;
    for m in mean.iter_mut() {
        *m /= nrows_f;
    }

    let mut var = vec![0.0f64; ncols];
    for row in x.rows() {
        for ((acc, &v), &m) in var.iter_mut().zip(row).zip(mean.iter()) {
            let d = v as f64 - m;
            *acc += d * d;
        }
    }

    let std = var
        .iter()
        .map(|v| ((v / nrows_f).sqrt() as f32).max(ScalerStats::MIN_STD))
        .collect();

    Ok(ScalerStats {
        mean: mean.into_iter().map(|m| m as f32).collect(),
        std,
    })
}

fn scale_row(row: &[f32], sc: &ScalerStats) -> Vec<f32> {
    row.iter()
        .zip(sc.mean.iter().zip(sc.std.iter()))
        .map(|(&v, (&m, &s))| (v - m) / s)
        .collect()
}

/// Scale a single encoded vector.
pub fn transform(vector: &EncodedFeatureVector, sc: &ScalerStats) -> Result<ScaledFeatureVector> {
    sc.check_width(vector.len())?;
    Ok(ScaledFeatureVector(scale_row(vector.as_slice(), sc)))
}

/// Transform all rows using the provided `ScalerStats`.
pub fn transform_matrix(x: &Array2<f32>, sc: &ScalerStats) -> Result<Array2<f32>> {
    sc.check_width(x.ncols())?;
    let mut out = Array2::with_width(x.ncols());
    for row in x.rows() {
        out.push_row(&scale_row(row, sc))
            .map_err(|e| PredictionError::Training(e.to_string()))?;
    }
    Ok(out)
}
