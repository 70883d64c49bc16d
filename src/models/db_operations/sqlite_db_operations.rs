use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params_from_iter, OptionalExtension, TransactionBehavior};
use std::path::Path;

use super::{Record, RecordStore, StoreError, StoreResult, KEY_SEPARATOR};
use crate::models::{Order, OrderItem};
use crate::setup::db_setup;
use crate::DbPool;

/// Relational backend: one SQLite table per entity behind an r2d2 pool.
pub struct SqliteStore {
    pool: DbPool,
}

fn select_sql<R: Record>() -> String {
    format!("SELECT {} FROM {}", R::COLUMNS.join(", "), R::TABLE)
}

fn insert_sql<R: Record>() -> String {
    let placeholders: Vec<String> = (1..=R::COLUMNS.len()).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        R::TABLE,
        R::COLUMNS.join(", "),
        placeholders.join(", ")
    )
}

/// `id` stays in `?1`; every other column is rewritten.
fn update_sql<R: Record>() -> String {
    let assignments: Vec<String> = R::COLUMNS
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, column)| format!("{} = ?{}", column, i + 1))
        .collect();
    format!("UPDATE {} SET {} WHERE id = ?1", R::TABLE, assignments.join(", "))
}

impl SqliteStore {
    /// Opens (or creates) the database file and makes sure the schema exists.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA busy_timeout = 5000; PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;",
            )
        });
        let pool = Pool::builder().build(manager)?;
        Self::with_pool(pool)
    }

    /// A private in-memory database. The pool is capped at one connection so
    /// every caller sees the same data.
    pub fn in_memory() -> StoreResult<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder().max_size(1).build(manager)?;
        Self::with_pool(pool)
    }

    fn with_pool(pool: DbPool) -> StoreResult<Self> {
        {
            let mut conn = pool.get()?;
            db_setup::setup_catalog_db(&mut conn)
                .map_err(|e| StoreError::Invalid(format!("schema setup failed: {}", e)))?;
        }
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    fn conn(&self) -> StoreResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }
}

impl RecordStore for SqliteStore {
    fn insert<R: Record>(&self, record: &R) -> StoreResult<()> {
        let values = record.to_sql_values()?;
        let conn = self.conn()?;
        conn.execute(&insert_sql::<R>(), params_from_iter(values.iter()))?;
        Ok(())
    }

    fn get<R: Record>(&self, id: &str) -> StoreResult<Option<R>> {
        let conn = self.conn()?;
        let sql = format!("{} WHERE id = ?1", select_sql::<R>());
        let record = conn
            .query_row(&sql, [id], |row| R::from_sql_row(row))
            .optional()?;
        Ok(record)
    }

    fn find_unique<R: Record>(&self, key: &str, value: &str) -> StoreResult<Option<R>> {
        let columns: Vec<&str> = key.split(", ").collect();
        if let Some(unknown) = columns.iter().find(|c| !R::COLUMNS.contains(c)) {
            return Err(StoreError::Invalid(format!(
                "'{}' is not a column of {}",
                unknown,
                R::TABLE
            )));
        }
        let parts: Vec<&str> = value.split(KEY_SEPARATOR).collect();
        if parts.len() != columns.len() {
            return Err(StoreError::Invalid(format!(
                "key '{}' expects {} values, got {}",
                key,
                columns.len(),
                parts.len()
            )));
        }

        let conditions: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{} = ?{}", column, i + 1))
            .collect();
        let sql = format!("{} WHERE {}", select_sql::<R>(), conditions.join(" AND "));

        let conn = self.conn()?;
        let record = conn
            .query_row(&sql, params_from_iter(parts.iter()), |row| R::from_sql_row(row))
            .optional()?;
        Ok(record)
    }

    fn update<R: Record, F: FnOnce(&mut R)>(&self, id: &str, change: F) -> StoreResult<Option<R>> {
        let mut conn = self.conn()?;
        // Write lock up front so concurrent updaters queue on busy_timeout.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let sql = format!("{} WHERE id = ?1", select_sql::<R>());
        let current = tx
            .query_row(&sql, [id], |row| R::from_sql_row(row))
            .optional()?;
        let mut record = match current {
            Some(record) => record,
            None => return Ok(None),
        };

        change(&mut record);
        if record.id() != id {
            return Err(StoreError::Invalid("updates must not change the record id".to_string()));
        }

        let values = record.to_sql_values()?;
        tx.execute(&update_sql::<R>(), params_from_iter(values.iter()))?;
        tx.commit()?;
        Ok(Some(record))
    }

    fn delete<R: Record>(&self, id: &str) -> StoreResult<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(&format!("DELETE FROM {} WHERE id = ?1", R::TABLE), [id])?;
        Ok(removed > 0)
    }

    fn scan<R: Record>(&self) -> StoreResult<Vec<R>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&select_sql::<R>())?;
        let rows = stmt.query_map([], |row| R::from_sql_row(row))?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }

    fn insert_order(&self, order: &Order, items: &[OrderItem]) -> StoreResult<()> {
        if items.is_empty() {
            return Err(StoreError::Invalid("an order needs at least one item".to_string()));
        }

        let mut conn = self.conn()?;
        // Dropping the transaction on any error rolls back the order row too.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(&insert_sql::<Order>(), params_from_iter(order.to_sql_values()?.iter()))?;
        for item in items {
            if item.order_id != order.id {
                return Err(StoreError::Invalid(format!(
                    "item {} belongs to order {}",
                    item.id, item.order_id
                )));
            }
            tx.execute(
                &insert_sql::<OrderItem>(),
                params_from_iter(item.to_sql_values()?.iter()),
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
