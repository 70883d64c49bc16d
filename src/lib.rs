use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use helper::catalog_helpers::CatalogRepository;
use models::db_operations::Storage;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Shared with every actix worker through `web::Data`.
pub struct AppState {
    pub catalog: CatalogRepository,
}

impl AppState {
    pub fn new(store: Storage) -> Self {
        Self {
            catalog: CatalogRepository::new(store),
        }
    }
}

pub mod config;
pub mod helper;
pub mod models;
pub mod routes;
pub mod setup;
