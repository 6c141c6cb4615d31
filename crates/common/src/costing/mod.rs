//! Recipe cost aggregation
//!
//! - base cost: Σ quantity × unit cost, sub-recipes priced at their cost per serving
//! - Q-factor: percentage markup for waste and overhead
//! - cost per serving: total cost / servings
//!
//! Sub-recipes are dereferenced one level, using the referenced recipe's
//! persisted cost per serving.

mod pricing;

pub use pricing::{apply_odoo_prices, match_product};

use crate::errors::{AppError, Result};
use crate::models::{Ingredient, Recipe};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Resolves the cost per serving of a referenced recipe
pub trait RecipeCostLookup {
    fn cost_per_serving(&self, recipe_id: Uuid) -> Option<f64>;
}

impl RecipeCostLookup for HashMap<Uuid, f64> {
    fn cost_per_serving(&self, recipe_id: Uuid) -> Option<f64> {
        self.get(&recipe_id).copied()
    }
}

/// Lookup for callers that have no sub-recipes to resolve
pub struct NoSubRecipes;

impl RecipeCostLookup for NoSubRecipes {
    fn cost_per_serving(&self, _recipe_id: Uuid) -> Option<f64> {
        None
    }
}

/// Result of a cost calculation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub base_cost: f64,
    pub q_factor_percentage: f64,
    pub q_factor_amount: f64,
    pub total_cost: f64,
    pub servings: u32,
    pub cost_per_serving: f64,
}

/// Unit cost used for an ingredient: the resolved sub-recipe cost when
/// available, otherwise the ingredient's own unit cost
pub fn effective_unit_cost(ingredient: &Ingredient, lookup: &impl RecipeCostLookup) -> f64 {
    ingredient
        .recipe_id
        .and_then(|id| lookup.cost_per_serving(id))
        .unwrap_or(ingredient.unit_cost)
}

fn ensure_finite(value: f64, field: &str) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(AppError::validation(field, format!("{} must be a finite number", field)))
    }
}

/// Compute the cost breakdown of an ingredient list
pub fn calculate(
    ingredients: &[Ingredient],
    servings: u32,
    q_factor_percentage: f64,
    lookup: &impl RecipeCostLookup,
) -> Result<CostBreakdown> {
    if servings == 0 {
        return Err(AppError::validation("servings", "servings must be at least 1"));
    }
    ensure_finite(q_factor_percentage, "qFactorPercentage")?;

    let mut base_cost = 0.0;
    for ingredient in ingredients {
        ensure_finite(ingredient.quantity, "quantity")?;
        let unit_cost = effective_unit_cost(ingredient, lookup);
        ensure_finite(unit_cost, "unitCost")?;
        base_cost += ingredient.quantity * unit_cost;
    }

    let q_factor_amount = base_cost * (q_factor_percentage / 100.0);
    let total_cost = base_cost + q_factor_amount;

    Ok(CostBreakdown {
        base_cost,
        q_factor_percentage,
        q_factor_amount,
        total_cost,
        servings,
        cost_per_serving: total_cost / servings as f64,
    })
}

/// Recompute every derived cost field of a recipe in place
pub fn apply_costs(recipe: &mut Recipe, lookup: &impl RecipeCostLookup) -> Result<CostBreakdown> {
    if recipe.ingredients.iter().any(|i| i.recipe_id == Some(recipe.id)) {
        return Err(AppError::validation(
            "ingredients",
            "a recipe cannot use itself as an ingredient",
        ));
    }

    let breakdown = calculate(
        &recipe.ingredients,
        recipe.servings,
        recipe.q_factor_percentage,
        lookup,
    )?;

    for ingredient in &mut recipe.ingredients {
        ingredient.unit_cost = effective_unit_cost(ingredient, lookup);
        ingredient.total_cost = ingredient.quantity * ingredient.unit_cost;
    }

    recipe.base_cost = breakdown.base_cost;
    recipe.q_factor_amount = breakdown.q_factor_amount;
    recipe.total_cost = breakdown.total_cost;
    recipe.cost_per_serving = breakdown.cost_per_serving;

    crate::metrics::record_cost_calculation(recipe.ingredients.len());

    Ok(breakdown)
}
