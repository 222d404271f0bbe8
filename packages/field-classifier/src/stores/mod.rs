//! Storage implementations for batches and results.
//!
//! Available backends:
//! - `MemoryStore` - In-memory storage for tests
//! - `CsvStore` - One CSV file per batch on local disk

pub mod csv;
pub mod memory;

pub use self::csv::CsvStore;
pub use memory::MemoryStore;
