use redb::{CommitError, Database, StorageError, TableDefinition, TableError, TransactionError};
use rusqlite::Connection;
use thiserror::Error;

use crate::models::db_operations::records::ALL_TABLES;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("Redb storage error: {0}")]
    RedbStorage(#[from] StorageError),
    #[error("Redb transaction error: {0}")]
    RedbTransaction(#[from] TransactionError),
    #[error("Redb table error: {0}")]
    RedbTable(#[from] TableError),
    #[error("Redb commit error: {0}")]
    RedbCommit(#[from] CommitError),
}

const CATALOG_SCHEMA: &[(&str, &str)] = &[
    (
        "users",
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('student', 'instructor', 'admin')),
            avatar TEXT,
            bio TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    ),
    (
        "categories",
        "CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            name_en TEXT NOT NULL,
            name_so TEXT NOT NULL,
            description TEXT,
            slug TEXT NOT NULL UNIQUE
        )",
    ),
    // Courses and posts carry no foreign keys: the catalog joins defensively
    // and drops rows whose instructor or author has gone missing.
    (
        "courses",
        "CREATE TABLE IF NOT EXISTS courses (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            title_en TEXT NOT NULL,
            title_so TEXT NOT NULL,
            description TEXT NOT NULL,
            description_en TEXT NOT NULL,
            description_so TEXT NOT NULL,
            instructor_id TEXT NOT NULL,
            category_id TEXT NOT NULL,
            thumbnail TEXT NOT NULL,
            price TEXT NOT NULL,
            original_price TEXT,
            level TEXT NOT NULL CHECK(level IN ('beginner', 'intermediate', 'advanced')),
            duration TEXT NOT NULL,
            language TEXT NOT NULL DEFAULT 'both' CHECK(language IN ('so', 'en', 'both')),
            is_published INTEGER NOT NULL DEFAULT 0,
            features TEXT NOT NULL DEFAULT '[]',
            requirements TEXT NOT NULL DEFAULT '[]',
            learning_outcomes TEXT NOT NULL DEFAULT '[]',
            student_count INTEGER NOT NULL DEFAULT 0,
            rating TEXT NOT NULL DEFAULT '0',
            review_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    ),
    (
        "lessons",
        "CREATE TABLE IF NOT EXISTS lessons (
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            title TEXT NOT NULL,
            title_en TEXT NOT NULL,
            title_so TEXT NOT NULL,
            description TEXT,
            video_url TEXT,
            duration INTEGER,
            sort_order INTEGER NOT NULL,
            is_preview INTEGER NOT NULL DEFAULT 0,
            content TEXT,
            created_at TEXT NOT NULL,
            UNIQUE(course_id, sort_order)
        )",
    ),
    (
        "enrollments",
        "CREATE TABLE IF NOT EXISTS enrollments (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            progress INTEGER NOT NULL DEFAULT 0,
            completed_lessons TEXT NOT NULL DEFAULT '[]',
            enrolled_at TEXT NOT NULL,
            completed_at TEXT,
            UNIQUE(user_id, course_id)
        )",
    ),
    (
        "reviews",
        "CREATE TABLE IF NOT EXISTS reviews (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            rating INTEGER NOT NULL CHECK(rating BETWEEN 1 AND 5),
            comment TEXT,
            is_published INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )",
    ),
    (
        "blog_posts",
        "CREATE TABLE IF NOT EXISTS blog_posts (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            title_en TEXT NOT NULL,
            title_so TEXT NOT NULL,
            excerpt TEXT NOT NULL,
            excerpt_en TEXT NOT NULL,
            excerpt_so TEXT NOT NULL,
            content TEXT NOT NULL,
            content_en TEXT NOT NULL,
            content_so TEXT NOT NULL,
            author_id TEXT NOT NULL,
            category_id TEXT,
            featured_image TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            is_published INTEGER NOT NULL DEFAULT 0,
            published_at TEXT,
            read_time INTEGER,
            view_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    ),
    (
        "blog_comments",
        "CREATE TABLE IF NOT EXISTS blog_comments (
            id TEXT PRIMARY KEY,
            post_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            content TEXT NOT NULL,
            parent_id TEXT,
            is_approved INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
    ),
    (
        "cart_items",
        "CREATE TABLE IF NOT EXISTS cart_items (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 1 CHECK(quantity >= 1),
            added_at TEXT NOT NULL,
            UNIQUE(user_id, course_id)
        )",
    ),
    (
        "orders",
        "CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            total TEXT NOT NULL,
            currency TEXT NOT NULL DEFAULT 'USD',
            payment_method TEXT NOT NULL CHECK(payment_method IN ('stripe', 'zaad', 'evcplus')),
            payment_status TEXT NOT NULL DEFAULT 'pending'
                CHECK(payment_status IN ('pending', 'completed', 'failed', 'refunded')),
            payment_intent_id TEXT,
            transaction_id TEXT,
            metadata TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id)
        )",
    ),
    (
        "order_items",
        "CREATE TABLE IF NOT EXISTS order_items (
            id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            price TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY (order_id) REFERENCES orders(id) ON DELETE CASCADE,
            FOREIGN KEY (course_id) REFERENCES courses(id)
        )",
    ),
];

/// Creates every catalog table inside one transaction. Safe to run twice.
pub fn setup_catalog_db(conn: &mut Connection) -> Result<(), SetupError> {
    let tx = conn.transaction()?;
    for (name, ddl) in CATALOG_SCHEMA {
        log::debug!("Ensuring '{}' table exists", name);
        tx.execute(ddl, [])?;
    }
    tx.commit()?;
    Ok(())
}

/// Opens each keyed-map table once so later read transactions can find it.
pub fn setup_keyed_tables(db: &Database) -> Result<(), SetupError> {
    let write_txn = db.begin_write()?;
    for name in ALL_TABLES.iter().copied() {
        let definition: TableDefinition<&str, &str> = TableDefinition::new(name);
        log::debug!("Ensuring '{}' table exists in redb", name);
        write_txn.open_table(definition)?;
    }
    write_txn.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_covers_every_record_table() {
        let declared: Vec<&str> = CATALOG_SCHEMA.iter().map(|(name, _)| *name).collect();
        assert_eq!(declared, ALL_TABLES.to_vec());
    }

    #[test]
    fn catalog_setup_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_catalog_db(&mut conn).unwrap();
        setup_catalog_db(&mut conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count as usize, ALL_TABLES.len());
    }
}
