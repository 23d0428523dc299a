//! # codegraph-storage
//!
//! SQLite persistence layer for the coordination fabric: connections in
//! WAL mode (write-serialized, read-pooled), the batched writer thread,
//! schema migrations, and the read-side queries the outbox publisher
//! and evidence tracker need.

pub mod batch;
pub mod connection;
pub mod engine;
pub mod migrations;
pub mod queries;

pub use batch::{BatchWriter, WriterPolicy, WriteStats};
pub use connection::DatabaseManager;
pub use engine::StorageEngine;
