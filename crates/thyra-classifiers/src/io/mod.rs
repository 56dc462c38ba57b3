//! IO utilities for loading the training dataset.

pub mod dataset;

pub use dataset::{
    load_dataset, load_dataset_from_reader, load_dataset_with_config, DatasetReaderConfig,
};
