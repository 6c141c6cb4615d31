//! Persistence layer for Noe Ops
//!
//! Provides:
//! - The `Store` abstraction used by handlers
//! - An in-memory store (no database configured, and tests)
//! - SeaORM entity models and a PostgreSQL repository
//! - Connection pool management

mod memory;
pub mod models;
mod repository;

pub use memory::MemoryStore;
pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use crate::models::{Document, DocumentType, Recipe, RecipeCategory};
use async_trait::async_trait;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Recipe list query
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub category: Option<RecipeCategory>,
    /// Case-insensitive name fragment
    pub search: Option<String>,
    pub include_inactive: bool,
    pub offset: u64,
    pub limit: u64,
}

/// Document list query
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub doc_type: Option<DocumentType>,
    /// Case-insensitive name fragment
    pub search: Option<String>,
    pub offset: u64,
    pub limit: u64,
}

/// Recipe and document persistence
#[async_trait]
pub trait Store: Send + Sync {
    /// Check backing storage connectivity
    async fn ping(&self) -> Result<()>;

    /// Name of the backend, for readiness reporting
    fn backend(&self) -> &'static str;

    /// List recipes ordered by name, with the total matching count
    async fn list_recipes(&self, filter: &RecipeFilter) -> Result<(Vec<Recipe>, u64)>;

    async fn find_recipe(&self, id: Uuid) -> Result<Option<Recipe>>;

    async fn insert_recipe(&self, recipe: Recipe) -> Result<Recipe>;

    /// Replace a stored recipe; `None` when it does not exist
    async fn update_recipe(&self, recipe: Recipe) -> Result<Option<Recipe>>;

    async fn delete_recipe(&self, id: Uuid) -> Result<bool>;

    /// List documents newest first, with the total matching count
    async fn list_documents(&self, filter: &DocumentFilter) -> Result<(Vec<Document>, u64)>;

    async fn find_document(&self, id: Uuid) -> Result<Option<Document>>;

    async fn insert_document(&self, document: Document) -> Result<Document>;

    /// Replace a stored document; `None` when it does not exist
    async fn update_document(&self, document: Document) -> Result<Option<Document>>;

    async fn delete_document(&self, id: Uuid) -> Result<bool>;
}

/// Open the configured store: PostgreSQL when a URL is set, memory otherwise
pub async fn connect_store(config: &DatabaseConfig) -> Result<Arc<dyn Store>> {
    match config.url {
        Some(_) => {
            let pool = DbPool::new(config).await?;
            pool.ensure_schema().await?;
            Ok(Arc::new(Repository::new(pool)))
        }
        None => {
            tracing::warn!("No database URL configured, using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Case-insensitive substring match used by list filters
pub(crate) fn name_matches(name: &str, search: Option<&str>) -> bool {
    match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(fragment) => name.to_lowercase().contains(&fragment.to_lowercase()),
        None => true,
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS recipes (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT 'other',
    ingredients JSONB NOT NULL DEFAULT '[]'::jsonb,
    instructions JSONB NOT NULL DEFAULT '""'::jsonb,
    prep_time INTEGER NOT NULL DEFAULT 0,
    cook_time INTEGER NOT NULL DEFAULT 0,
    servings INTEGER NOT NULL CHECK (servings > 0),
    q_factor_percentage DOUBLE PRECISION NOT NULL DEFAULT 0,
    base_cost DOUBLE PRECISION NOT NULL DEFAULT 0,
    q_factor_amount DOUBLE PRECISION NOT NULL DEFAULT 0,
    total_cost DOUBLE PRECISION NOT NULL DEFAULT 0,
    cost_per_serving DOUBLE PRECISION NOT NULL DEFAULT 0,
    notes TEXT,
    active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS recipes_name_idx ON recipes (lower(name));
CREATE TABLE IF NOT EXISTS documents (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    doc_type TEXT NOT NULL DEFAULT 'other',
    content TEXT,
    file_data TEXT,
    file_name TEXT,
    mime_type TEXT,
    size BIGINT NOT NULL DEFAULT 0,
    tags JSONB NOT NULL DEFAULT '[]'::jsonb,
    uploaded_at TIMESTAMPTZ NOT NULL,
    modified_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS documents_uploaded_idx ON documents (uploaded_at DESC);
"#;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    pub primary: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let url = config.url.as_deref().ok_or_else(|| AppError::Configuration {
            message: "database.url is not set".to_string(),
        })?;

        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(url);
        opts
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);

        let primary = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e)
            })?;

        info!("Database connection established");

        Ok(Self { primary })
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Create tables and indexes if they do not exist
    pub async fn ensure_schema(&self) -> Result<()> {
        self.primary.execute_unprepared(SCHEMA).await?;
        info!("Database schema ready");
        Ok(())
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;
        Ok(())
    }
}
