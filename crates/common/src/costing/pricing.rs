//! Odoo price matching
//!
//! Ingredient names are matched to Odoo products by name only. This is a
//! heuristic, not a join: exact match first, then containment either way.

use crate::models::{Ingredient, OdooProduct};

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Best product for an ingredient name, if any
pub fn match_product<'a>(ingredient_name: &str, products: &'a [OdooProduct]) -> Option<&'a OdooProduct> {
    let needle = normalize(ingredient_name);
    if needle.is_empty() {
        return None;
    }

    let candidates: Vec<(String, &OdooProduct)> = products
        .iter()
        .map(|p| (normalize(&p.name), p))
        .filter(|(name, _)| !name.is_empty())
        .collect();

    candidates
        .iter()
        .find(|(name, _)| *name == needle)
        .or_else(|| candidates.iter().find(|(name, _)| name.contains(&needle)))
        .or_else(|| candidates.iter().find(|(name, _)| needle.contains(name.as_str())))
        .map(|(_, product)| *product)
}

/// Price ingredients from Odoo's cost price. Sub-recipe lines are left alone.
/// Returns the number of ingredients that were matched.
pub fn apply_odoo_prices(ingredients: &mut [Ingredient], products: &[OdooProduct]) -> usize {
    let mut updated = 0;

    for ingredient in ingredients.iter_mut().filter(|i| !i.is_sub_recipe()) {
        if let Some(product) = match_product(&ingredient.name, products) {
            ingredient.unit_cost = product.standard_price;
            ingredient.total_cost = ingredient.quantity * product.standard_price;
            ingredient.is_from_odoo = true;
            ingredient.odoo_product_id = Some(product.id);
            updated += 1;

            tracing::debug!(
                ingredient = %ingredient.name,
                product = %product.name,
                price = product.standard_price,
                "Matched ingredient to Odoo product"
            );
        }
    }

    updated
}
