use redb::{CommitError, DatabaseError, StorageError, TableError, TransactionError};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

use crate::models::{Order, OrderItem};

pub mod memory_db_operations;
pub mod records;
pub mod sqlite_db_operations;

pub use memory_db_operations::MemoryStore;
pub use sqlite_db_operations::SqliteStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(rusqlite::Error),
    #[error("R2D2 pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Redb database error: {0}")]
    RedbDatabase(#[from] DatabaseError),
    #[error("Redb storage error: {0}")]
    RedbStorage(#[from] StorageError),
    #[error("Redb transaction error: {0}")]
    RedbTransaction(#[from] TransactionError),
    #[error("Redb table error: {0}")]
    RedbTable(#[from] TableError),
    #[error("Redb commit error: {0}")]
    RedbCommit(#[from] CommitError),
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("Unique constraint violated on '{field}'")]
    ConstraintViolation { field: String },
    #[error("Referenced record is missing: {0}")]
    MissingReference(String),
    #[error("Invalid store operation: {0}")]
    Invalid(String),
}

impl From<rusqlite::Error> for StoreError {
    /// Constraint failures are lifted into the backend-neutral variants so both
    /// stores report them identically.
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &e {
            if failure.code == rusqlite::ErrorCode::ConstraintViolation {
                if let Some(columns) = message.strip_prefix("UNIQUE constraint failed: ") {
                    let field = columns
                        .split(", ")
                        .map(|qualified| qualified.rsplit('.').next().unwrap_or(qualified))
                        .collect::<Vec<_>>()
                        .join(", ");
                    return StoreError::ConstraintViolation { field };
                }
                if message.starts_with("FOREIGN KEY constraint failed") {
                    return StoreError::MissingReference(message.clone());
                }
            }
        }
        StoreError::Rusqlite(e)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Separator for composite unique-key values.
pub const KEY_SEPARATOR: char = '\u{1f}';

pub fn composite_key(parts: &[&str]) -> String {
    parts.join(&KEY_SEPARATOR.to_string())
}

/// An entity the record store can hold.
///
/// The relational backend maps it to the columns in `COLUMNS` (always `id`
/// first); the keyed-map backend stores the serde representation.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> &str;

    /// Values in `COLUMNS` order.
    fn to_sql_values(&self) -> StoreResult<Vec<Value>>;

    /// Reads a row selected with `COLUMNS` in order.
    fn from_sql_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Named secondary keys that must be unique across the table. Composite
    /// keys name their columns joined by ", " and join their values with
    /// [`composite_key`].
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

/// Storage primitives shared by every backend. No operation here filters,
/// joins or sorts; the catalog repository does that on top of `scan`.
pub trait RecordStore: Send + Sync {
    /// Fails with `ConstraintViolation` when the id or a unique key is taken.
    fn insert<R: Record>(&self, record: &R) -> StoreResult<()>;

    fn get<R: Record>(&self, id: &str) -> StoreResult<Option<R>>;

    /// Point read by a unique secondary key (see [`Record::unique_keys`]).
    fn find_unique<R: Record>(&self, key: &str, value: &str) -> StoreResult<Option<R>>;

    /// Atomic read-modify-write of one record. A missing id yields `Ok(None)`.
    /// The closure must not change the record id.
    fn update<R: Record, F: FnOnce(&mut R)>(&self, id: &str, change: F) -> StoreResult<Option<R>>;

    fn delete<R: Record>(&self, id: &str) -> StoreResult<bool>;

    fn scan<R: Record>(&self) -> StoreResult<Vec<R>>;

    /// Writes an order together with its items, or nothing at all.
    fn insert_order(&self, order: &Order, items: &[OrderItem]) -> StoreResult<()>;
}

/// Backend selected once at startup.
pub enum Storage {
    Sqlite(SqliteStore),
    Memory(MemoryStore),
}

impl Storage {
    pub fn sqlite(path: &Path) -> StoreResult<Self> {
        Ok(Storage::Sqlite(SqliteStore::open(path)?))
    }

    pub fn sqlite_in_memory() -> StoreResult<Self> {
        Ok(Storage::Sqlite(SqliteStore::in_memory()?))
    }

    pub fn memory() -> StoreResult<Self> {
        Ok(Storage::Memory(MemoryStore::new()?))
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Storage::Sqlite(_) => "sqlite",
            Storage::Memory(_) => "memory",
        }
    }
}

impl RecordStore for Storage {
    fn insert<R: Record>(&self, record: &R) -> StoreResult<()> {
        match self {
            Storage::Sqlite(store) => store.insert(record),
            Storage::Memory(store) => store.insert(record),
        }
    }

    fn get<R: Record>(&self, id: &str) -> StoreResult<Option<R>> {
        match self {
            Storage::Sqlite(store) => store.get(id),
            Storage::Memory(store) => store.get(id),
        }
    }

    fn find_unique<R: Record>(&self, key: &str, value: &str) -> StoreResult<Option<R>> {
        match self {
            Storage::Sqlite(store) => store.find_unique(key, value),
            Storage::Memory(store) => store.find_unique(key, value),
        }
    }

    fn update<R: Record, F: FnOnce(&mut R)>(&self, id: &str, change: F) -> StoreResult<Option<R>> {
        match self {
            Storage::Sqlite(store) => store.update(id, change),
            Storage::Memory(store) => store.update(id, change),
        }
    }

    fn delete<R: Record>(&self, id: &str) -> StoreResult<bool> {
        match self {
            Storage::Sqlite(store) => store.delete::<R>(id),
            Storage::Memory(store) => store.delete::<R>(id),
        }
    }

    fn scan<R: Record>(&self) -> StoreResult<Vec<R>> {
        match self {
            Storage::Sqlite(store) => store.scan(),
            Storage::Memory(store) => store.scan(),
        }
    }

    fn insert_order(&self, order: &Order, items: &[OrderItem]) -> StoreResult<()> {
        match self {
            Storage::Sqlite(store) => store.insert_order(order, items),
            Storage::Memory(store) => store.insert_order(order, items),
        }
    }
}
