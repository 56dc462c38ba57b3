//! Feature schema, patient records and the labeled training table.
//!
//! The column order in `FEATURE_COLUMNS` is the order every fitted artifact
//! (category map, scaler, classifier) expects. It never changes between
//! training and inference.
use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{PredictionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureColumn {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn numeric(name: &'static str) -> FeatureColumn {
    FeatureColumn {
        name,
        kind: ColumnKind::Numeric,
    }
}

const fn categorical(name: &'static str) -> FeatureColumn {
    FeatureColumn {
        name,
        kind: ColumnKind::Categorical,
    }
}

/// Model input columns, in fit order.
pub const FEATURE_COLUMNS: [FeatureColumn; 13] = [
    numeric("Age"),
    categorical("Gender"),
    categorical("Family_History"),
    categorical("Radiation_Exposure"),
    categorical("Iodine_Deficiency"),
    categorical("Smoking"),
    categorical("Obesity"),
    categorical("Diabetes"),
    numeric("TSH_Level"),
    numeric("T3_Level"),
    numeric("T4_Level"),
    numeric("Nodule_Size"),
    categorical("Thyroid_Cancer_Risk"),
];

pub const FEATURE_WIDTH: usize = FEATURE_COLUMNS.len();

pub const LABEL_COLUMN: &str = "Diagnosis";

/// Identifier and demographic columns that are never used as features.
pub const DROPPED_COLUMNS: [&str; 3] = ["Patient_ID", "Country", "Ethnicity"];

pub fn feature_names() -> Vec<String> {
    FEATURE_COLUMNS.iter().map(|c| c.name.to_string()).collect()
}

/// One raw feature value, before encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureCell {
    Numeric(f64),
    Category(String),
}

impl FeatureCell {
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            FeatureCell::Numeric(v) => Some(*v),
            FeatureCell::Category(_) => None,
        }
    }

    pub fn as_category(&self) -> Option<&str> {
        match self {
            FeatureCell::Category(s) => Some(s),
            FeatureCell::Numeric(_) => None,
        }
    }
}

/// One patient's inputs, as received from callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFeatureRecord {
    pub age: i32,
    pub gender: String,
    pub family_history: String,
    pub radiation_exposure: String,
    pub iodine_deficiency: String,
    pub smoking: String,
    pub obesity: String,
    pub diabetes: String,
    pub tsh_level: f64,
    pub t3_level: f64,
    pub t4_level: f64,
    pub nodule_size: f64,
    pub thyroid_cancer_risk: String,
}

impl RawFeatureRecord {
    /// Cells in `FEATURE_COLUMNS` order.
    pub fn cells(&self) -> Vec<FeatureCell> {
        vec![
            FeatureCell::Numeric(self.age as f64),
            FeatureCell::Category(self.gender.clone()),
            FeatureCell::Category(self.family_history.clone()),
            FeatureCell::Category(self.radiation_exposure.clone()),
            FeatureCell::Category(self.iodine_deficiency.clone()),
            FeatureCell::Category(self.smoking.clone()),
            FeatureCell::Category(self.obesity.clone()),
            FeatureCell::Category(self.diabetes.clone()),
            FeatureCell::Numeric(self.tsh_level),
            FeatureCell::Numeric(self.t3_level),
            FeatureCell::Numeric(self.t4_level),
            FeatureCell::Numeric(self.nodule_size),
            FeatureCell::Category(self.thyroid_cancer_risk.clone()),
        ]
    }

    /// Rebuild a record from cells in `FEATURE_COLUMNS` order.
    pub fn from_cells(cells: &[FeatureCell]) -> Result<Self> {
        if cells.len() != FEATURE_WIDTH {
            return Err(PredictionError::DimensionMismatch {
                expected: FEATURE_WIDTH,
                actual: cells.len(),
            });
        }

        let num = |i: usize| {
            cells[i].as_numeric().ok_or_else(|| {
                PredictionError::Dataset(format!(
                    "column '{}' must be numeric",
                    FEATURE_COLUMNS[i].name
                ))
            })
        };
        let cat = |i: usize| {
            cells[i].as_category().map(str::to_string).ok_or_else(|| {
                PredictionError::Dataset(format!(
                    "column '{}' must be categorical",
                    FEATURE_COLUMNS[i].name
                ))
            })
        };

        let age = num(0)?.round();
        if !age.is_finite() || age < i32::MIN as f64 || age > i32::MAX as f64 {
            return Err(PredictionError::Dataset(format!(
                "column '{}' value {} is not a valid age",
                FEATURE_COLUMNS[0].name, age
            )));
        }

        Ok(RawFeatureRecord {
            age: age as i32,
            gender: cat(1)?,
            family_history: cat(2)?,
            radiation_exposure: cat(3)?,
            iodine_deficiency: cat(4)?,
            smoking: cat(5)?,
            obesity: cat(6)?,
            diabetes: cat(7)?,
            tsh_level: num(8)?,
            t3_level: num(9)?,
            t4_level: num(10)?,
            nodule_size: num(11)?,
            thyroid_cancer_risk: cat(12)?,
        })
    }
}

/// Binary diagnosis. Class index 1 is malignant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Benign,
    Malignant,
}

impl Label {
    pub fn class_index(self) -> usize {
        match self {
            Label::Benign => 0,
            Label::Malignant => 1,
        }
    }

    pub fn from_class_index(index: usize) -> Self {
        if index == 1 {
            Label::Malignant
        } else {
            Label::Benign
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Benign => "Benign",
            Label::Malignant => "Malignant",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "benign" | "0" => Ok(Label::Benign),
            "malignant" | "1" => Ok(Label::Malignant),
            other => Err(format!("Unknown diagnosis label: '{}'", other)),
        }
    }
}

/// Labeled training table in `FEATURE_COLUMNS` order.
#[derive(Debug, Clone, Default)]
pub struct ThyroidDataset {
    pub rows: Vec<Vec<FeatureCell>>,
    pub labels: Vec<Label>,
    /// Numeric cells that failed to parse and were stored as NaN.
    pub coerced_values: usize,
}

impl ThyroidDataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn class_counts(&self) -> (usize, usize) {
        class_counts(&self.labels)
    }

    pub fn log_summary(&self) {
        let (benign, malignant) = self.class_counts();
        log::info!(
            "Dataset: {} rows ({} benign, {} malignant), {} feature columns",
            self.len(),
            benign,
            malignant,
            FEATURE_WIDTH
        );
        if self.coerced_values > 0 {
            log::warn!(
                "{} numeric values could not be parsed and were coerced to NaN",
                self.coerced_values
            );
        }
    }

    /// Remove rows holding a non-finite numeric value. Returns how many
    /// rows were dropped.
    pub fn drop_non_finite_rows(&mut self) -> usize {
        let before = self.rows.len();
        let keep: Vec<bool> = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .all(|cell| cell.as_numeric().map_or(true, f64::is_finite))
            })
            .collect();

        let mut idx = 0;
        self.rows.retain(|_| {
            let k = keep[idx];
            idx += 1;
            k
        });
        let mut idx = 0;
        self.labels.retain(|_| {
            let k = keep[idx];
            idx += 1;
            k
        });

        before - self.rows.len()
    }
}

/// (benign, malignant) counts.
pub fn class_counts(labels: &[Label]) -> (usize, usize) {
    let malignant = labels.iter().filter(|&&l| l == Label::Malignant).count();
    (labels.len() - malignant, malignant)
}

/// Row indices of a train/test partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Stratified train/test split with a fixed seed.
///
/// Each class contributes `round(n_class * test_fraction)` rows to the test
/// split, so class proportions are preserved in both partitions.
pub fn stratified_split(labels: &[Label], test_fraction: f64, seed: u64) -> Result<SplitIndices> {
    if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
        return Err(PredictionError::Training(format!(
            "test fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for class in [Label::Benign, Label::Malignant] {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter_map(|(i, &l)| (l == class).then_some(i))
            .collect();
        members.shuffle(&mut rng);

        let n_test = (members.len() as f64 * test_fraction).round() as usize;
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }

    train.shuffle(&mut rng);
    test.sort_unstable();

    if train.is_empty() || test.is_empty() {
        return Err(PredictionError::Training(format!(
            "split of {} rows produced an empty partition",
            labels.len()
        )));
    }

    Ok(SplitIndices { train, test })
}
