//! Synthetic minority oversampling (SMOTE).
//!
//! Only ever applied to the training split. Each synthetic row lies on the
//! segment between a minority sample and one of its nearest minority
//! neighbours.
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::data_handling::{class_counts, Label};
use crate::error::{PredictionError, Result};
use crate::math::Array2;

#[derive(Debug, Clone)]
pub struct Smote {
    pub k_neighbors: usize,
    pub seed: u64,
}

impl Default for Smote {
    fn default() -> Self {
        Self {
            k_neighbors: 5,
            seed: 42,
        }
    }
}

impl Smote {
    pub fn new(k_neighbors: usize, seed: u64) -> Self {
        Self { k_neighbors, seed }
    }

    /// Return `x`/`y` extended with synthetic minority rows until both
    /// classes have the same count. Inputs are left untouched.
    pub fn fit_resample(&self, x: &Array2<f32>, y: &[Label]) -> Result<(Array2<f32>, Vec<Label>)> {
        if x.nrows() != y.len() {
            return Err(PredictionError::Training(format!(
                "feature rows ({}) and labels ({}) differ",
                x.nrows(),
                y.len()
            )));
        }

        let (benign, malignant) = class_counts(y);
        if benign == malignant {
            log::debug!("Classes already balanced ({} each); skipping SMOTE", benign);
            return Ok((x.clone(), y.to_vec()));
        }

        let (minority_label, n_minority, n_majority) = if malignant < benign {
            (Label::Malignant, malignant, benign)
        } else {
            (Label::Benign, benign, malignant)
        };

        if n_minority < 2 {
            return Err(PredictionError::Training(format!(
                "SMOTE needs at least 2 {} samples, found {}",
                minority_label, n_minority
            )));
        }
        if self.k_neighbors == 0 {
            return Err(PredictionError::Training(
                "SMOTE requires k_neighbors >= 1".to_string(),
            ));
        }

        let k = self.k_neighbors.min(n_minority - 1);
        let minority_rows: Vec<usize> = y
            .iter()
            .enumerate()
            .filter_map(|(i, &l)| (l == minority_label).then_some(i))
            .collect();
        let minority = x.select_rows(&minority_rows);

        log::info!(
            "SMOTE: generating {} synthetic {} samples (k = {})",
            n_majority - n_minority,
            minority_label,
            k
        );

        let neighbors = nearest_neighbors(&minority, k);

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut x_out = x.clone();
        let mut y_out = y.to_vec();
        let mut synthetic = vec![0.0f32; x.ncols()];

        for _ in 0..(n_majority - n_minority) {
            let base = rng.gen_range(0..n_minority);
            let neighbor = neighbors[base][rng.gen_range(0..k)];
            let gap: f32 = rng.gen();

            let a = minority.row_slice(base);
            let b = minority.row_slice(neighbor);
            for ((s, &av), &bv) in synthetic.iter_mut().zip(a).zip(b) {
                *s = av + gap * (bv - av);
            }

            x_out
                .push_row(&synthetic)
                .map_err(|e| PredictionError::Training(e.to_string()))?;
            y_out.push(minority_label);
        }

        Ok((x_out, y_out))
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Indices (into `points`) of the `k` nearest other rows of every row.
fn nearest_neighbors(points: &Array2<f32>, k: usize) -> Vec<Vec<usize>> {
    let n = points.nrows();
    (0..n)
        .into_par_iter()
        .map(|i| {
            let row = points.row_slice(i);
            let mut dists: Vec<(f32, usize)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| (squared_distance(row, points.row_slice(j)), j))
                .collect();
            let by_distance =
                |a: &(f32, usize), b: &(f32, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
            if k < dists.len() {
                dists.select_nth_unstable_by(k - 1, by_distance);
                dists.truncate(k);
            }
            dists.sort_unstable_by(by_distance);
            dists.into_iter().map(|(_, j)| j).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imbalanced() -> (Array2<f32>, Vec<Label>) {
        let mut x = Array2::with_width(2);
        let mut y = Vec::new();
        for i in 0..12 {
            x.push_row(&[i as f32, 0.0]).unwrap();
            y.push(Label::Benign);
        }
        for i in 0..4 {
            x.push_row(&[100.0 + i as f32, 10.0]).unwrap();
            y.push(Label::Malignant);
        }
        (x, y)
    }

    #[test]
    fn balances_classes() {
        let (x, y) = imbalanced();
        let (xr, yr) = Smote::default().fit_resample(&x, &y).unwrap();
        assert_eq!(class_counts(&yr), (12, 12));
        assert_eq!(xr.nrows(), 24);
        // original rows are kept as-is at the front
        assert_eq!(xr.select_rows(&(0..16).collect::<Vec<_>>()), x);
    }

    #[test]
    fn synthetic_rows_stay_within_minority_hull() {
        let (x, y) = imbalanced();
        let (xr, _) = Smote::default().fit_resample(&x, &y).unwrap();
        for r in 16..xr.nrows() {
            let row = xr.row_slice(r);
            assert!((100.0..=103.0).contains(&row[0]), "row {:?}", row);
            assert_eq!(row[1], 10.0);
        }
    }

    #[test]
    fn is_deterministic_for_a_seed() {
        let (x, y) = imbalanced();
        let a = Smote::new(3, 9).fit_resample(&x, &y).unwrap();
        let b = Smote::new(3, 9).fit_resample(&x, &y).unwrap();
        assert_eq!(a.0, b.0);
    }

    #[test]
    fn balanced_input_is_unchanged() {
        let x = Array2::from_shape_vec((2, 1), vec![0.0, 1.0]).unwrap();
        let y = vec![Label::Benign, Label::Malignant];
        let (xr, yr) = Smote::default().fit_resample(&x, &y).unwrap();
        assert_eq!(xr, x);
        assert_eq!(yr, y);
    }

    #[test]
    fn single_minority_sample_is_an_error() {
        let x = Array2::from_shape_vec((3, 1), vec![0.0, 1.0, 2.0]).unwrap();
        let y = vec![Label::Benign, Label::Benign, Label::Malignant];
        assert!(Smote::default().fit_resample(&x, &y).is_err());
    }

    #[test]
    fn neighbors_exclude_self() {
        let x = Array2::from_shape_vec((3, 1), vec![0.0, 1.0, 5.0]).unwrap();
        let nn = nearest_neighbors(&x, 1);
        assert_eq!(nn, vec![vec![1], vec![0], vec![1]]);
    }
}
