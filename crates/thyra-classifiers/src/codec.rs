//! Categorical feature encoding.
//!
//! A `CategoryMap` assigns every categorical column its own sorted list of
//! the values seen at fit time; a value's code is its position in that list.
//! Numeric columns pass through unchanged. Values outside the fitted set are
//! rejected rather than mapped to a fallback code.
use serde::{Deserialize, Serialize};

use crate::data_handling::{
    ColumnKind, FeatureCell, RawFeatureRecord, FEATURE_COLUMNS, FEATURE_WIDTH,
};
use crate::error::{PredictionError, Result};
use crate::math::Array2;

/// Fitted categories of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryColumn {
    pub name: String,
    /// Index of the column in the feature vector.
    pub position: usize,
    /// Sorted, de-duplicated training values. Code `i` is `values[i]`.
    pub values: Vec<String>,
}

impl CategoryColumn {
    pub fn code_of(&self, value: &str) -> Option<usize> {
        self.values.binary_search_by(|v| v.as_str().cmp(value)).ok()
    }

    pub fn value_of(&self, code: usize) -> Option<&str> {
        self.values.get(code).map(String::as_str)
    }
}

/// Per-column category codes, immutable once fit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMap {
    columns: Vec<CategoryColumn>,
}

impl CategoryMap {
    pub fn columns(&self) -> &[CategoryColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&CategoryColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn column_at(&self, position: usize) -> Option<&CategoryColumn> {
        self.columns.iter().find(|c| c.position == position)
    }

    /// Original string for `code` in `column`.
    pub fn decode(&self, column: &str, code: usize) -> Option<&str> {
        self.column(column).and_then(|c| c.value_of(code))
    }

    /// Check that a deserialized map matches the feature schema.
    pub fn validate(&self) -> Result<()> {
        let expected: Vec<(usize, &str)> = FEATURE_COLUMNS
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == ColumnKind::Categorical)
            .map(|(i, c)| (i, c.name))
            .collect();
        let actual: Vec<(usize, &str)> = self
            .columns
            .iter()
            .map(|c| (c.position, c.name.as_str()))
            .collect();
        if expected != actual {
            return Err(PredictionError::CorruptArtifact(format!(
                "category map columns {:?} do not match schema {:?}",
                actual, expected
            )));
        }
        for column in &self.columns {
            if column.values.is_empty() || column.values.windows(2).any(|w| w[0] >= w[1]) {
                return Err(PredictionError::CorruptArtifact(format!(
                    "category values of '{}' are empty or not strictly sorted",
                    column.name
                )));
            }
        }
        Ok(())
    }
}

/// Encoded feature row: categorical codes and raw numeric values, as `f32`.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFeatureVector(Vec<f32>);

impl EncodedFeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Learn the category set of every categorical column.
pub fn fit_category_map(rows: &[Vec<FeatureCell>]) -> Result<CategoryMap> {
    let mut columns = Vec::new();

    for (position, column) in FEATURE_COLUMNS.iter().enumerate() {
        if column.kind != ColumnKind::Categorical {
            continue;
        }

        let mut values: Vec<String> = Vec::new();
        for (row_idx, row) in rows.iter().enumerate() {
            let value = row.get(position).and_then(FeatureCell::as_category).ok_or_else(|| {
                PredictionError::Dataset(format!(
                    "row {} has no categorical value for '{}'",
                    row_idx + 1,
                    column.name
                ))
            })?;
            values.push(value.to_string());
        }
        values.sort_unstable();
        values.dedup();

        if values.is_empty() {
            return Err(PredictionError::Dataset(format!(
                "no values observed for categorical column '{}'",
                column.name
            )));
        }

        log::debug!("Column '{}' categories: {:?}", column.name, values);
        columns.push(CategoryColumn {
            name: column.name.to_string(),
            position,
            values,
        });
    }

    Ok(CategoryMap { columns })
}

/// Encode one row of cells in schema order.
pub fn encode_cells(cells: &[FeatureCell], map: &CategoryMap) -> Result<EncodedFeatureVector> {
    if cells.len() != FEATURE_WIDTH {
        return Err(PredictionError::DimensionMismatch {
            expected: FEATURE_WIDTH,
            actual: cells.len(),
        });
    }

    let mut out = Vec::with_capacity(FEATURE_WIDTH);
    for (position, (cell, column)) in cells.iter().zip(FEATURE_COLUMNS.iter()).enumerate() {
        let value = match (column.kind, cell) {
            (ColumnKind::Numeric, FeatureCell::Numeric(v)) => {
                if !v.is_finite() {
                    return Err(PredictionError::NonFiniteFeature {
                        column: column.name.to_string(),
                    });
                }
                *v as f32
            }
            (ColumnKind::Categorical, FeatureCell::Category(s)) => {
                let fitted = map.column_at(position).ok_or_else(|| {
                    PredictionError::CorruptArtifact(format!(
                        "category map has no entry for '{}'",
                        column.name
                    ))
                })?;
                let code = fitted.code_of(s).ok_or_else(|| PredictionError::UnknownCategory {
                    column: column.name.to_string(),
                    value: s.clone(),
                })?;
                code as f32
            }
            _ => {
                return Err(PredictionError::Dataset(format!(
                    "column '{}' has the wrong value kind",
                    column.name
                )))
            }
        };
        out.push(value);
    }

    Ok(EncodedFeatureVector(out))
}

pub fn encode_record(record: &RawFeatureRecord, map: &CategoryMap) -> Result<EncodedFeatureVector> {
    encode_cells(&record.cells(), map)
}

/// Encode every row into a dense matrix.
pub fn encode_rows(rows: &[Vec<FeatureCell>], map: &CategoryMap) -> Result<Array2<f32>> {
    let mut matrix = Array2::with_width(FEATURE_WIDTH);
    for row in rows {
        let encoded = encode_cells(row, map)?;
        matrix
            .push_row(encoded.as_slice())
            .map_err(|e| PredictionError::Dataset(e.to_string()))?;
    }
    Ok(matrix)
}

/// Map an encoded vector back to a raw record, for diagnostics.
pub fn decode_vector(vector: &EncodedFeatureVector, map: &CategoryMap) -> Result<RawFeatureRecord> {
    if vector.len() != FEATURE_WIDTH {
        return Err(PredictionError::DimensionMismatch {
            expected: FEATURE_WIDTH,
            actual: vector.len(),
        });
    }

    let mut cells = Vec::with_capacity(FEATURE_WIDTH);
    for (position, (&value, column)) in vector
        .as_slice()
        .iter()
        .zip(FEATURE_COLUMNS.iter())
        .enumerate()
    {
        let cell = match column.kind {
            ColumnKind::Numeric => FeatureCell::Numeric(value as f64),
            ColumnKind::Categorical => {
                let fitted = map.column_at(position).ok_or_else(|| {
                    PredictionError::CorruptArtifact(format!(
                        "category map has no entry for '{}'",
                        column.name
                    ))
                })?;
                let decoded = fitted.value_of(value as usize).ok_or_else(|| {
                    PredictionError::CorruptArtifact(format!(
                        "code {} out of range for '{}'",
                        value, column.name
                    ))
                })?;
                FeatureCell::Category(decoded.to_string())
            }
        };
        cells.push(cell);
    }

    RawFeatureRecord::from_cells(&cells)
}
