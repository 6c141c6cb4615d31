//! Recipe management and costing handlers

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use super::{ApiJson, ApiPath, ApiQuery};
use crate::AppState;
use noe_common::{
    auth::AuthSession,
    costing::{self, CostBreakdown},
    db::{RecipeFilter, Store},
    errors::{AppError, Result},
    models::{sub_recipe_ids, Ingredient, Instructions, OdooProduct, Recipe, RecipeCategory},
    response::{clamp_limit, ApiResponse, Pagination},
};

/// Shortest word of an ingredient name searched on its own in Odoo
const MIN_TERM_CHARS: usize = 3;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRecipesQuery {
    pub category: Option<RecipeCategory>,
    pub search: Option<String>,
    pub include_inactive: Option<bool>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Recipe fields a client may set; derived costs are always recomputed
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecipeInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[serde(default)]
    pub category: RecipeCategory,

    #[serde(default)]
    pub ingredients: Vec<Ingredient>,

    #[serde(default)]
    pub instructions: Instructions,

    #[serde(default)]
    pub prep_time: u32,

    #[serde(default)]
    pub cook_time: u32,

    #[validate(range(min = 1))]
    pub servings: u32,

    /// Defaults to the configured Q-factor
    #[validate(range(min = 0.0, max = 1000.0))]
    pub q_factor_percentage: Option<f64>,

    #[validate(length(max = 5000))]
    pub notes: Option<String>,

    pub active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CalculateRequest {
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,

    #[validate(range(min = 1))]
    pub servings: u32,

    #[validate(range(min = 0.0, max = 1000.0))]
    pub q_factor_percentage: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateResponse {
    #[serde(flatten)]
    pub breakdown: CostBreakdown,
    /// Ingredients with resolved unit and line costs
    pub ingredients: Vec<Ingredient>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPricesResponse {
    pub recipe: Recipe,
    pub matched: usize,
    pub unmatched: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub id: Uuid,
}

/// Line-level checks the derive cannot express
fn validate_ingredients(ingredients: &mut [Ingredient]) -> Result<()> {
    for ingredient in ingredients.iter_mut() {
        if ingredient.name.trim().is_empty() {
            return Err(AppError::validation("ingredients", "ingredient name is required"));
        }
        if !ingredient.quantity.is_finite() || ingredient.quantity < 0.0 {
            return Err(AppError::validation(
                "ingredients",
                format!("quantity of '{}' must be zero or more", ingredient.name),
            ));
        }
        if !ingredient.unit_cost.is_finite() || ingredient.unit_cost < 0.0 {
            return Err(AppError::validation(
                "ingredients",
                format!("unit cost of '{}' must be zero or more", ingredient.name),
            ));
        }
        if ingredient.is_recipe && ingredient.recipe_id.is_none() {
            return Err(AppError::validation(
                "ingredients",
                format!("sub-recipe '{}' needs a recipeId", ingredient.name),
            ));
        }
        ingredient.is_recipe = ingredient.recipe_id.is_some();
    }
    Ok(())
}

/// Cost per serving of every resolvable sub-recipe in `ingredients`
async fn sub_recipe_costs(
    store: &dyn Store,
    ingredients: &[Ingredient],
    exclude: Option<Uuid>,
) -> Result<HashMap<Uuid, f64>> {
    let ids = sub_recipe_ids(ingredients);

    let mut costs = HashMap::with_capacity(ids.len());
    for id in ids.into_iter().filter(|id| Some(*id) != exclude) {
        match store.find_recipe(id).await? {
            Some(sub) => {
                costs.insert(id, sub.cost_per_serving);
            }
            None => tracing::warn!(sub_recipe_id = %id, "Sub-recipe not found, using stored unit cost"),
        }
    }
    Ok(costs)
}

/// Recompute derived fields from persisted sub-recipe costs
async fn cost_recipe(store: &dyn Store, recipe: &mut Recipe) -> Result<CostBreakdown> {
    let lookup = sub_recipe_costs(store, &recipe.ingredients, Some(recipe.id)).await?;
    costing::apply_costs(recipe, &lookup)
}

fn apply_input(recipe: &mut Recipe, input: RecipeInput, default_q_factor: f64) {
    recipe.name = input.name;
    recipe.category = input.category;
    recipe.ingredients = input.ingredients;
    recipe.instructions = input.instructions;
    recipe.prep_time = input.prep_time;
    recipe.cook_time = input.cook_time;
    recipe.servings = input.servings;
    recipe.q_factor_percentage = input.q_factor_percentage.unwrap_or(default_q_factor);
    recipe.notes = input.notes.filter(|n| !n.trim().is_empty());
    if let Some(active) = input.active {
        recipe.active = active;
    }
}

async fn load_recipe(state: &AppState, id: Uuid) -> Result<Recipe> {
    state
        .store
        .find_recipe(id)
        .await?
        .ok_or_else(|| AppError::RecipeNotFound { id: id.to_string() })
}

async fn save_recipe(state: &AppState, mut recipe: Recipe) -> Result<Recipe> {
    recipe.updated_at = Utc::now();
    let id = recipe.id;
    state
        .store
        .update_recipe(recipe)
        .await?
        .ok_or_else(|| AppError::RecipeNotFound { id: id.to_string() })
}

/// List recipes
pub async fn list_recipes(
    State(state): State<AppState>,
    _auth: AuthSession,
    ApiQuery(query): ApiQuery<ListRecipesQuery>,
) -> Result<ApiResponse<Vec<Recipe>>> {
    let filter = RecipeFilter {
        category: query.category,
        search: query.search,
        include_inactive: query.include_inactive.unwrap_or(false),
        offset: query.offset.unwrap_or(0),
        limit: clamp_limit(query.limit),
    };

    let (recipes, total) = state.store.list_recipes(&filter).await?;

    Ok(ApiResponse::ok(recipes).with_pagination(Pagination {
        total,
        limit: filter.limit,
        offset: filter.offset,
    }))
}

/// Create a recipe
pub async fn create_recipe(
    State(state): State<AppState>,
    auth: AuthSession,
    ApiJson(mut input): ApiJson<RecipeInput>,
) -> Result<(StatusCode, Json<ApiResponse<Recipe>>)> {
    input.name = input.name.trim().to_string();
    input.validate()?;
    validate_ingredients(&mut input.ingredients)?;

    let mut recipe = Recipe::new(input.name.clone(), input.category, input.servings);
    apply_input(&mut recipe, input, state.config.costing.default_q_factor_percentage);
    cost_recipe(state.store.as_ref(), &mut recipe).await?;

    let recipe = state.store.insert_recipe(recipe).await?;

    tracing::info!(
        recipe_id = %recipe.id,
        name = %recipe.name,
        total_cost = recipe.total_cost,
        user = %auth.session.username,
        "Recipe created"
    );

    Ok(ApiResponse::ok(recipe)
        .with_message("Recipe created")
        .with_status(StatusCode::CREATED))
}

/// Get a recipe by ID
pub async fn get_recipe(
    State(state): State<AppState>,
    _auth: AuthSession,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ApiResponse<Recipe>> {
    Ok(ApiResponse::ok(load_recipe(&state, id).await?))
}

/// Replace a recipe
pub async fn update_recipe(
    State(state): State<AppState>,
    auth: AuthSession,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(mut input): ApiJson<RecipeInput>,
) -> Result<ApiResponse<Recipe>> {
    input.name = input.name.trim().to_string();
    input.validate()?;
    validate_ingredients(&mut input.ingredients)?;

    let mut recipe = load_recipe(&state, id).await?;
    apply_input(&mut recipe, input, state.config.costing.default_q_factor_percentage);
    cost_recipe(state.store.as_ref(), &mut recipe).await?;

    let recipe = save_recipe(&state, recipe).await?;

    tracing::info!(recipe_id = %id, user = %auth.session.username, "Recipe updated");
    Ok(ApiResponse::ok(recipe).with_message("Recipe updated"))
}

/// Delete a recipe
pub async fn delete_recipe(
    State(state): State<AppState>,
    auth: AuthSession,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ApiResponse<DeletedResponse>> {
    if !state.store.delete_recipe(id).await? {
        return Err(AppError::RecipeNotFound { id: id.to_string() });
    }

    tracing::info!(recipe_id = %id, user = %auth.session.username, "Recipe deleted");
    Ok(ApiResponse::ok(DeletedResponse { id }).with_message("Recipe deleted"))
}

/// Preview a cost breakdown without saving anything
pub async fn calculate(
    State(state): State<AppState>,
    _auth: AuthSession,
    ApiJson(mut request): ApiJson<CalculateRequest>,
) -> Result<ApiResponse<CalculateResponse>> {
    request.validate()?;
    validate_ingredients(&mut request.ingredients)?;

    let lookup = sub_recipe_costs(state.store.as_ref(), &request.ingredients, None).await?;
    let q_factor = request
        .q_factor_percentage
        .unwrap_or(state.config.costing.default_q_factor_percentage);

    let breakdown = costing::calculate(&request.ingredients, request.servings, q_factor, &lookup)?;

    let ingredients = request
        .ingredients
        .into_iter()
        .map(|mut ingredient| {
            ingredient.unit_cost = costing::effective_unit_cost(&ingredient, &lookup);
            ingredient.total_cost = ingredient.quantity * ingredient.unit_cost;
            ingredient
        })
        .collect();

    Ok(ApiResponse::ok(CalculateResponse { breakdown, ingredients }))
}

/// Re-resolve sub-recipe costs and persist
pub async fn recalculate(
    State(state): State<AppState>,
    _auth: AuthSession,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ApiResponse<Recipe>> {
    let mut recipe = load_recipe(&state, id).await?;
    cost_recipe(state.store.as_ref(), &mut recipe).await?;
    let recipe = save_recipe(&state, recipe).await?;

    Ok(ApiResponse::ok(recipe).with_message("Recipe costs recalculated"))
}

/// Words of an ingredient name worth searching for on their own
fn search_terms(name: &str) -> Vec<String> {
    let mut terms: Vec<String> = name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= MIN_TERM_CHARS)
        .map(str::to_lowercase)
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

/// Products that could match an ingredient in either containment direction.
/// Odoo's `ilike` only finds names containing the query, so a product named
/// after one word of the ingredient needs a search for that word.
async fn price_candidates(state: &AppState, name: &str, limit: u32) -> Result<Vec<OdooProduct>> {
    let mut products = super::odoo::search_catalog(state, name, limit).await?;

    let full = name.trim().to_lowercase();
    for term in search_terms(name).into_iter().filter(|t| *t != full) {
        for product in super::odoo::search_catalog(state, &term, limit).await? {
            if !products.iter().any(|p| p.id == product.id) {
                products.push(product);
            }
        }
    }
    Ok(products)
}

/// Price ingredients from Odoo, then recalculate and persist
pub async fn sync_prices(
    State(state): State<AppState>,
    auth: AuthSession,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ApiResponse<SyncPricesResponse>> {
    state.catalog()?;
    let mut recipe = load_recipe(&state, id).await?;
    let limit = state.config.odoo.search_limit;

    let mut matched = 0;
    let mut unmatched = Vec::new();

    for ingredient in recipe.ingredients.iter_mut().filter(|i| !i.is_sub_recipe()) {
        let products = price_candidates(&state, &ingredient.name, limit).await?;
        if costing::apply_odoo_prices(std::slice::from_mut(ingredient), &products) > 0 {
            matched += 1;
        } else {
            unmatched.push(ingredient.name.clone());
        }
    }

    cost_recipe(state.store.as_ref(), &mut recipe).await?;
    let recipe = save_recipe(&state, recipe).await?;

    tracing::info!(
        recipe_id = %id,
        matched,
        unmatched = unmatched.len(),
        user = %auth.session.username,
        "Synced ingredient prices from Odoo"
    );

    Ok(ApiResponse::ok(SyncPricesResponse { recipe, matched, unmatched })
        .with_message(format!("Updated {} ingredient prices from Odoo", matched)))
}
