//! Prediction history.
//!
//! Each successful prediction is stored with the inputs that produced it.
//! `recent` returns newest first; rows created in the same instant are
//! ordered by id, newest first.
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use thyra_classifiers::{Label, RawFeatureRecord};

#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// A stored prediction and the record it was made for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub id: i64,
    #[serde(flatten)]
    pub record: RawFeatureRecord,
    pub prediction: Label,
    pub created_at: DateTime<Utc>,
}

pub trait RecordStore: Send + Sync {
    fn save(
        &self,
        record: &RawFeatureRecord,
        prediction: Label,
    ) -> Result<PredictionOutcome, RecordStoreError>;

    fn recent(&self, limit: usize) -> Result<Vec<PredictionOutcome>, RecordStoreError>;
}

/// SQLite-backed history.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, RecordStoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory database, for tests.
    pub fn in_memory() -> Result<Self, RecordStoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), RecordStoreError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS thyroid_cancer_predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                age INTEGER NOT NULL,
                gender TEXT NOT NULL,
                family_history TEXT NOT NULL,
                radiation_exposure TEXT NOT NULL,
                iodine_deficiency TEXT NOT NULL,
                smoking TEXT NOT NULL,
                obesity TEXT NOT NULL,
                diabetes TEXT NOT NULL,
                tsh_level REAL NOT NULL,
                t3_level REAL NOT NULL,
                t4_level REAL NOT NULL,
                nodule_size REAL NOT NULL,
                thyroid_cancer_risk TEXT NOT NULL,
                prediction TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_predictions_created
                ON thyroid_cancer_predictions(created_at DESC);
            ",
        )?;

        Ok(())
    }

    fn outcome_from_row(row: &Row<'_>) -> rusqlite::Result<PredictionOutcome> {
        let prediction: String = row.get(14)?;
        let prediction = prediction.parse::<Label>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(14, Type::Text, e.into())
        })?;
        let created_at: String = row.get(15)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(15, Type::Text, Box::new(e)))?;

        Ok(PredictionOutcome {
            id: row.get(0)?,
            record: RawFeatureRecord {
                age: row.get(1)?,
                gender: row.get(2)?,
                family_history: row.get(3)?,
                radiation_exposure: row.get(4)?,
                iodine_deficiency: row.get(5)?,
                smoking: row.get(6)?,
                obesity: row.get(7)?,
                diabetes: row.get(8)?,
                tsh_level: row.get(9)?,
                t3_level: row.get(10)?,
                t4_level: row.get(11)?,
                nodule_size: row.get(12)?,
                thyroid_cancer_risk: row.get(13)?,
            },
            prediction,
            created_at,
        })
    }
}

impl RecordStore for SqliteRecordStore {
    fn save(
        &self,
        record: &RawFeatureRecord,
        prediction: Label,
    ) -> Result<PredictionOutcome, RecordStoreError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let created_at = Utc::now();

        conn.execute(
            r"
            INSERT INTO thyroid_cancer_predictions (
                age, gender, family_history, radiation_exposure, iodine_deficiency,
                smoking, obesity, diabetes, tsh_level, t3_level, t4_level,
                nodule_size, thyroid_cancer_risk, prediction, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ",
            params![
                record.age,
                record.gender,
                record.family_history,
                record.radiation_exposure,
                record.iodine_deficiency,
                record.smoking,
                record.obesity,
                record.diabetes,
                record.tsh_level,
                record.t3_level,
                record.t4_level,
                record.nodule_size,
                record.thyroid_cancer_risk,
                prediction.as_str(),
                // fixed width so text order is time order
                created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )?;
        let id = conn.last_insert_rowid();

        log::debug!("Saved prediction {} ({})", id, prediction);
        Ok(PredictionOutcome {
            id,
            record: record.clone(),
            prediction,
            created_at,
        })
    }

    fn recent(&self, limit: usize) -> Result<Vec<PredictionOutcome>, RecordStoreError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);

        let mut stmt = conn.prepare(
            r"
            SELECT id, age, gender, family_history, radiation_exposure, iodine_deficiency,
                   smoking, obesity, diabetes, tsh_level, t3_level, t4_level,
                   nodule_size, thyroid_cancer_risk, prediction, created_at
            FROM thyroid_cancer_predictions
            ORDER BY created_at DESC, id DESC
            LIMIT ?1
            ",
        )?;

        let outcomes = stmt
            .query_map(params![limit as i64], Self::outcome_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(outcomes)
    }
}

/// History kept in process memory.
#[derive(Default)]
pub struct InMemoryRecordStore {
    outcomes: Mutex<Vec<PredictionOutcome>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for InMemoryRecordStore {
    fn save(
        &self,
        record: &RawFeatureRecord,
        prediction: Label,
    ) -> Result<PredictionOutcome, RecordStoreError> {
        let mut outcomes = self.outcomes.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = PredictionOutcome {
            id: outcomes.len() as i64 + 1,
            record: record.clone(),
            prediction,
            created_at: Utc::now(),
        };
        outcomes.push(outcome.clone());
        Ok(outcome)
    }

    fn recent(&self, limit: usize) -> Result<Vec<PredictionOutcome>, RecordStoreError> {
        let outcomes = self.outcomes.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(outcomes.iter().rev().take(limit).cloned().collect())
    }
}
