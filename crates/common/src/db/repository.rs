//! Repository pattern for database operations
//!
//! PostgreSQL-backed `Store` built on SeaORM.

use crate::db::models::*;
use crate::db::{DbPool, DocumentFilter, RecipeFilter, Store};
use crate::errors::Result;
use crate::models::{Document, Recipe};
use async_trait::async_trait;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select,
};
use uuid::Uuid;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }
}

fn like_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.to_lowercase()))
}

fn recipe_query(filter: &RecipeFilter) -> Select<RecipeEntity> {
    let mut query = RecipeEntity::find();

    if let Some(category) = filter.category {
        query = query.filter(RecipeColumn::Category.eq(category.as_str()));
    }
    if !filter.include_inactive {
        query = query.filter(RecipeColumn::Active.eq(true));
    }
    if let Some(pattern) = like_pattern(filter.search.as_deref()) {
        query = query.filter(Expr::expr(Func::lower(Expr::col(RecipeColumn::Name))).like(pattern));
    }

    query
}

fn document_query(filter: &DocumentFilter) -> Select<DocumentEntity> {
    let mut query = DocumentEntity::find();

    if let Some(doc_type) = filter.doc_type {
        query = query.filter(DocumentColumn::DocType.eq(doc_type.as_str()));
    }
    if let Some(pattern) = like_pattern(filter.search.as_deref()) {
        query = query.filter(Expr::expr(Func::lower(Expr::col(DocumentColumn::Name))).like(pattern));
    }

    query
}

/// Map "no row touched" on update to `None`
fn updated<T>(result: std::result::Result<T, DbErr>) -> Result<Option<T>> {
    match result {
        Ok(row) => Ok(Some(row)),
        Err(DbErr::RecordNotUpdated) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl Store for Repository {
    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }

    // ========================================================================
    // Recipe Operations
    // ========================================================================

    async fn list_recipes(&self, filter: &RecipeFilter) -> Result<(Vec<Recipe>, u64)> {
        let total = recipe_query(filter).count(self.conn()).await?;

        let rows = recipe_query(filter)
            .order_by(Expr::expr(Func::lower(Expr::col(RecipeColumn::Name))), Order::Asc)
            .order_by_asc(RecipeColumn::Id)
            .offset(filter.offset)
            .limit(filter.limit)
            .all(self.conn())
            .await?;

        let recipes = rows
            .into_iter()
            .map(Recipe::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok((recipes, total))
    }

    async fn find_recipe(&self, id: Uuid) -> Result<Option<Recipe>> {
        RecipeEntity::find_by_id(id)
            .one(self.conn())
            .await?
            .map(Recipe::try_from)
            .transpose()
    }

    async fn insert_recipe(&self, recipe: Recipe) -> Result<Recipe> {
        let row = recipe::to_active_model(&recipe)?
            .insert(self.conn())
            .await?;

        tracing::debug!(recipe_id = %row.id, "Recipe inserted");
        Recipe::try_from(row)
    }

    async fn update_recipe(&self, recipe: Recipe) -> Result<Option<Recipe>> {
        let result = recipe::to_active_model(&recipe)?.update(self.conn()).await;
        updated(result)?.map(Recipe::try_from).transpose()
    }

    async fn delete_recipe(&self, id: Uuid) -> Result<bool> {
        let result = RecipeEntity::delete_by_id(id).exec(self.conn()).await?;
        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Document Operations
    // ========================================================================

    async fn list_documents(&self, filter: &DocumentFilter) -> Result<(Vec<Document>, u64)> {
        let total = document_query(filter).count(self.conn()).await?;

        let rows = document_query(filter)
            .order_by_desc(DocumentColumn::UploadedAt)
            .offset(filter.offset)
            .limit(filter.limit)
            .all(self.conn())
            .await?;

        let documents = rows
            .into_iter()
            .map(Document::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok((documents, total))
    }

    async fn find_document(&self, id: Uuid) -> Result<Option<Document>> {
        DocumentEntity::find_by_id(id)
            .one(self.conn())
            .await?
            .map(Document::try_from)
            .transpose()
    }

    async fn insert_document(&self, document: Document) -> Result<Document> {
        let row = document::to_active_model(&document)?
            .insert(self.conn())
            .await?;

        tracing::debug!(document_id = %row.id, size = row.size, "Document inserted");
        Document::try_from(row)
    }

    async fn update_document(&self, document: Document) -> Result<Option<Document>> {
        let result = document::to_active_model(&document)?.update(self.conn()).await;
        updated(result)?.map(Document::try_from).transpose()
    }

    async fn delete_document(&self, id: Uuid) -> Result<bool> {
        let result = DocumentEntity::delete_by_id(id).exec(self.conn()).await?;
        Ok(result.rows_affected > 0)
    }
}
