//! In-memory `Store`, used when no database is configured and in tests

use crate::db::{name_matches, DocumentFilter, RecipeFilter, Store};
use crate::errors::{AppError, Result};
use crate::models::{Document, Recipe};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    recipes: RwLock<HashMap<Uuid, Recipe>>,
    documents: RwLock<HashMap<Uuid, Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn page<T>(items: Vec<T>, offset: u64, limit: u64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn list_recipes(&self, filter: &RecipeFilter) -> Result<(Vec<Recipe>, u64)> {
        let recipes = self.recipes.read().await;
        let mut matching: Vec<Recipe> = recipes
            .values()
            .filter(|r| filter.include_inactive || r.active)
            .filter(|r| filter.category.map_or(true, |c| r.category == c))
            .filter(|r| name_matches(&r.name, filter.search.as_deref()))
            .cloned()
            .collect();

        matching.sort_by_cached_key(|r| (r.name.to_lowercase(), r.id));
        let total = matching.len() as u64;

        Ok((page(matching, filter.offset, filter.limit), total))
    }

    async fn find_recipe(&self, id: Uuid) -> Result<Option<Recipe>> {
        Ok(self.recipes.read().await.get(&id).cloned())
    }

    async fn insert_recipe(&self, recipe: Recipe) -> Result<Recipe> {
        let mut recipes = self.recipes.write().await;
        if recipes.contains_key(&recipe.id) {
            return Err(AppError::Conflict {
                message: format!("Recipe {} already exists", recipe.id),
            });
        }
        recipes.insert(recipe.id, recipe.clone());
        Ok(recipe)
    }

    async fn update_recipe(&self, recipe: Recipe) -> Result<Option<Recipe>> {
        let mut recipes = self.recipes.write().await;
        match recipes.get_mut(&recipe.id) {
            Some(slot) => {
                *slot = recipe.clone();
                Ok(Some(recipe))
            }
            None => Ok(None),
        }
    }

    async fn delete_recipe(&self, id: Uuid) -> Result<bool> {
        Ok(self.recipes.write().await.remove(&id).is_some())
    }

    async fn list_documents(&self, filter: &DocumentFilter) -> Result<(Vec<Document>, u64)> {
        let documents = self.documents.read().await;
        let mut matching: Vec<Document> = documents
            .values()
            .filter(|d| filter.doc_type.map_or(true, |t| d.doc_type == t))
            .filter(|d| name_matches(&d.name, filter.search.as_deref()))
            .cloned()
            .collect();

        // Newest first
        matching.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(a.id.cmp(&b.id)));
        let total = matching.len() as u64;

        Ok((page(matching, filter.offset, filter.limit), total))
    }

    async fn find_document(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self.documents.read().await.get(&id).cloned())
    }

    async fn insert_document(&self, document: Document) -> Result<Document> {
        let mut documents = self.documents.write().await;
        if documents.contains_key(&document.id) {
            return Err(AppError::Conflict {
                message: format!("Document {} already exists", document.id),
            });
        }
        documents.insert(document.id, document.clone());
        Ok(document)
    }

    async fn update_document(&self, document: Document) -> Result<Option<Document>> {
        let mut documents = self.documents.write().await;
        match documents.get_mut(&document.id) {
            Some(slot) => {
                *slot = document.clone();
                Ok(Some(document))
            }
            None => Ok(None),
        }
    }

    async fn delete_document(&self, id: Uuid) -> Result<bool> {
        Ok(self.documents.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentType, RecipeCategory};
    use chrono::Duration;

    fn all_recipes() -> RecipeFilter {
        RecipeFilter {
            limit: 50,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_recipe_crud() {
        let store = MemoryStore::new();
        let recipe = Recipe::new("Miso Soup", RecipeCategory::Appetizer, 4);
        let id = recipe.id;

        store.insert_recipe(recipe.clone()).await.unwrap();
        assert_eq!(store.find_recipe(id).await.unwrap().unwrap().name, "Miso Soup");

        let mut changed = recipe.clone();
        changed.servings = 6;
        let saved = store.update_recipe(changed).await.unwrap().unwrap();
        assert_eq!(saved.servings, 6);

        assert!(store.delete_recipe(id).await.unwrap());
        assert!(!store.delete_recipe(id).await.unwrap());
        assert!(store.find_recipe(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_recipe_returns_none() {
        let store = MemoryStore::new();
        let recipe = Recipe::new("Ghost", RecipeCategory::Other, 1);
        assert!(store.update_recipe(recipe).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_conflicts() {
        let store = MemoryStore::new();
        let recipe = Recipe::new("Gyoza", RecipeCategory::Appetizer, 6);
        store.insert_recipe(recipe.clone()).await.unwrap();
        let err = store.insert_recipe(recipe).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_recipe_listing_filters_and_orders() {
        let store = MemoryStore::new();
        let mut retired = Recipe::new("Tempura Roll", RecipeCategory::Roll, 1);
        retired.active = false;

        for recipe in [
            Recipe::new("Spicy Tuna Roll", RecipeCategory::Roll, 1),
            Recipe::new("California Roll", RecipeCategory::Roll, 1),
            Recipe::new("Green Tea Ice Cream", RecipeCategory::Dessert, 1),
            retired,
        ] {
            store.insert_recipe(recipe).await.unwrap();
        }

        let (recipes, total) = store.list_recipes(&all_recipes()).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(recipes[0].name, "California Roll");

        let rolls = RecipeFilter {
            category: Some(RecipeCategory::Roll),
            include_inactive: true,
            ..all_recipes()
        };
        assert_eq!(store.list_recipes(&rolls).await.unwrap().1, 3);

        let search = RecipeFilter {
            search: Some("TUNA".into()),
            ..all_recipes()
        };
        let (found, _) = store.list_recipes(&search).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Spicy Tuna Roll");

        let paged = RecipeFilter {
            offset: 1,
            limit: 1,
            ..all_recipes()
        };
        let (page, total) = store.list_recipes(&paged).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page[0].name, "Green Tea Ice Cream");
    }

    #[tokio::test]
    async fn test_recipe_order_ignores_case() {
        let store = MemoryStore::new();
        for name in ["Mochi", "avocado maki", "Miso Soup"] {
            store
                .insert_recipe(Recipe::new(name, RecipeCategory::Other, 1))
                .await
                .unwrap();
        }

        let (recipes, _) = store.list_recipes(&all_recipes()).await.unwrap();
        let names: Vec<&str> = recipes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["avocado maki", "Miso Soup", "Mochi"]);
    }

    #[tokio::test]
    async fn test_documents_newest_first() {
        let store = MemoryStore::new();
        let mut older = Document::new("Opening checklist", DocumentType::Procedure);
        older.uploaded_at = older.uploaded_at - Duration::days(1);
        let newer = Document::new("Spring menu", DocumentType::Menu);

        store.insert_document(older).await.unwrap();
        store.insert_document(newer).await.unwrap();

        let filter = DocumentFilter {
            limit: 10,
            ..Default::default()
        };
        let (documents, total) = store.list_documents(&filter).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(documents[0].name, "Spring menu");

        let menus = DocumentFilter {
            doc_type: Some(DocumentType::Menu),
            ..filter
        };
        assert_eq!(store.list_documents(&menus).await.unwrap().1, 1);
    }
}
