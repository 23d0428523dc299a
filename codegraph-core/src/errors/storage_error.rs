//! Storage-layer errors for the batched writer and relational store.

use super::{Classify, ErrorCategory, ErrorCode};

/// Errors that can occur writing to or reading from the relational store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {message}")]
    SqliteError { message: String },

    #[error("database busy (another operation in progress)")]
    DbBusy,

    #[error("transient transaction failure: {message}")]
    TransientTransaction { message: String },

    #[error("migration failed at version {version}: {message}")]
    MigrationFailed { version: u32, message: String },

    #[error(
        "constraint violation on {table}: {detail} — remediation: check for a \
         duplicate key or a dangling foreign key before retrying"
    )]
    ConstraintViolation { table: String, detail: String },

    #[error("schema mismatch: {detail} — remediation: run pending migrations")]
    SchemaMismatch { detail: String },

    #[error("database corrupt: {details} — remediation: restore from the last checkpoint")]
    DbCorrupt { details: String },

    #[error("disk full — remediation: free space before retrying writes")]
    DiskFull,

    #[error("writer shut down with {lost} buffered command(s) lost: {detail}")]
    LossOnShutdown { lost: usize, detail: String },
}

impl Classify for StorageError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::DbBusy | Self::TransientTransaction { .. } => ErrorCategory::Transient,
            Self::ConstraintViolation { .. } => ErrorCategory::Validation,
            Self::SqliteError { .. }
            | Self::MigrationFailed { .. }
            | Self::SchemaMismatch { .. }
            | Self::DbCorrupt { .. }
            | Self::DiskFull
            | Self::LossOnShutdown { .. } => ErrorCategory::Terminal,
        }
    }
}

impl ErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::SqliteError { .. } => "STORAGE_SQLITE_ERROR",
            Self::DbBusy => "STORAGE_DB_BUSY",
            Self::TransientTransaction { .. } => "STORAGE_TRANSIENT_TRANSACTION",
            Self::MigrationFailed { .. } => "STORAGE_MIGRATION_FAILED",
            Self::ConstraintViolation { .. } => "STORAGE_CONSTRAINT_VIOLATION",
            Self::SchemaMismatch { .. } => "STORAGE_SCHEMA_MISMATCH",
            Self::DbCorrupt { .. } => "STORAGE_DB_CORRUPT",
            Self::DiskFull => "STORAGE_DISK_FULL",
            Self::LossOnShutdown { .. } => "STORAGE_LOSS_ON_SHUTDOWN",
        }
    }
}

impl StorageError {
    pub fn from_sqlite(e: impl std::fmt::Display) -> Self {
        let message = e.to_string();
        let lower = message.to_ascii_lowercase();
        if lower.contains("database is locked") || lower.contains("busy") {
            Self::DbBusy
        } else if lower.contains("constraint") {
            Self::ConstraintViolation {
                table: "unknown".to_string(),
                detail: message,
            }
        } else if lower.contains("disk") && lower.contains("full") {
            Self::DiskFull
        } else if lower.contains("malformed") || lower.contains("corrupt") {
            Self::DbCorrupt { details: message }
        } else {
            Self::SqliteError { message }
        }
    }
}
