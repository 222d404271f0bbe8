//! Data types for fields, batches and classification results.

pub mod classification;
pub mod config;
pub mod field;
