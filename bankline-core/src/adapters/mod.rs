//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for durable ledger and user storage
//! - In-memory maps with per-account locks for tests and embedding

pub mod duckdb;
pub mod memory;
