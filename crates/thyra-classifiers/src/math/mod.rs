//! Small dense matrix type used for feature tables.
//!
//! `Array2` is row-major and dependency-free; the feature tables here are a
//! few hundred thousand rows of 13 columns, which does not need a full
//! linear algebra crate.
pub mod matrix;

pub use matrix::{Array2, ShapeError};
