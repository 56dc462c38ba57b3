//! CSV/TSV reader for the labeled thyroid cancer dataset.
use std::path::Path;

use csv::StringRecord;

use crate::data_handling::{
    ColumnKind, FeatureCell, Label, ThyroidDataset, DROPPED_COLUMNS, FEATURE_COLUMNS,
    LABEL_COLUMN,
};
use crate::error::{PredictionError, Result};

/// Configuration for reading the training table.
#[derive(Debug, Clone)]
pub struct DatasetReaderConfig {
    /// Column holding the `Benign` / `Malignant` diagnosis.
    pub label_column: String,
    /// Field delimiter. When `None` it is chosen from the file extension.
    pub delimiter: Option<u8>,
}

impl Default for DatasetReaderConfig {
    fn default() -> Self {
        Self {
            label_column: LABEL_COLUMN.to_string(),
            delimiter: None,
        }
    }
}

/// Read the training table from a CSV (or `.tsv`) file.
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<ThyroidDataset> {
    load_dataset_with_config(path, &DatasetReaderConfig::default())
}

pub fn load_dataset_with_config<P: AsRef<Path>>(
    path: P,
    config: &DatasetReaderConfig,
) -> Result<ThyroidDataset> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PredictionError::Dataset(format!(
            "dataset file does not exist: {}",
            path.display()
        )));
    }

    let delimiter = config.delimiter.unwrap_or_else(|| {
        let is_tsv = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("tsv"))
            .unwrap_or(false);
        if is_tsv {
            b'\t'
        } else {
            b','
        }
    });

    let reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    read_records(reader, config)
}

/// Read the training table from any reader. Used by tests with in-memory CSV.
pub fn load_dataset_from_reader<R: std::io::Read>(
    rdr: R,
    config: &DatasetReaderConfig,
) -> Result<ThyroidDataset> {
    let reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter.unwrap_or(b','))
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(rdr);
    read_records(reader, config)
}

fn read_records<R: std::io::Read>(
    mut reader: csv::Reader<R>,
    config: &DatasetReaderConfig,
) -> Result<ThyroidDataset> {
    let headers = reader.headers()?.clone();

    let label_idx = find_column(&headers, &config.label_column).ok_or_else(|| {
        PredictionError::Dataset(format!("missing label column '{}'", config.label_column))
    })?;

    let mut feature_indices = Vec::with_capacity(FEATURE_COLUMNS.len());
    for column in FEATURE_COLUMNS.iter() {
        let idx = find_column(&headers, column.name).ok_or_else(|| {
            PredictionError::Dataset(format!("missing feature column '{}'", column.name))
        })?;
        feature_indices.push(idx);
    }

    let ignored: Vec<&str> = headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != label_idx && !feature_indices.contains(idx))
        .map(|(_, h)| h)
        .collect();
    if !ignored.is_empty() {
        let unexpected: Vec<&str> = ignored
            .iter()
            .copied()
            .filter(|h| !DROPPED_COLUMNS.iter().any(|d| d.eq_ignore_ascii_case(h)))
            .collect();
        log::debug!("Dropping non-feature columns: {:?}", ignored);
        if !unexpected.is_empty() {
            log::warn!("Ignoring unrecognised dataset columns: {:?}", unexpected);
        }
    }

    let mut dataset = ThyroidDataset::default();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result?;
        let row_no = row_idx + 1;

        let label_value = record.get(label_idx).ok_or_else(|| {
            PredictionError::Dataset(format!("missing label value at row {}", row_no))
        })?;
        let label: Label = label_value
            .parse()
            .map_err(|e| PredictionError::Dataset(format!("{} at row {}", e, row_no)))?;

        let mut cells = Vec::with_capacity(FEATURE_COLUMNS.len());
        for (column, &idx) in FEATURE_COLUMNS.iter().zip(feature_indices.iter()) {
            let value = record.get(idx).unwrap_or("");
            let cell = match column.kind {
                ColumnKind::Numeric => match value.parse::<f64>() {
                    Ok(v) => FeatureCell::Numeric(v),
                    Err(_) => {
                        log::trace!(
                            "Coercing '{}' in column '{}' at row {} to NaN",
                            value,
                            column.name,
                            row_no
                        );
                        dataset.coerced_values += 1;
                        FeatureCell::Numeric(f64::NAN)
                    }
                },
                ColumnKind::Categorical => FeatureCell::Category(value.to_string()),
            };
            cells.push(cell);
        }

        dataset.rows.push(cells);
        dataset.labels.push(label);
    }

    if dataset.is_empty() {
        return Err(PredictionError::Dataset("dataset has no rows".to_string()));
    }

    Ok(dataset)
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.eq_ignore_ascii_case(name))
}
