/*!
 * Database module for benchmark results.
 *
 * This module provides SQLite-based persistence for:
 * - Benchmarks and the protocols they were run with
 * - Batches and structures produced by each protocol
 * - Per-structure RMSD and score metrics
 * - Captured protocol output
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;
pub mod table;

// Re-export main types
pub use connection::{Database, DatabaseStats, DatabaseUrl};
pub use models::{
    Batch, Benchmark, BenchmarkProtocol, Protocol, ProtocolOutput, Record, RmsdMetric,
    ScoreMetric, Structure,
};
pub use repository::Repository;
pub use table::Table;
