//! Recipes and their ingredients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Menu category of a recipe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeCategory {
    Appetizer,
    Sushi,
    Sashimi,
    Roll,
    Dessert,
    Beverage,
    #[default]
    Other,
}

impl RecipeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipeCategory::Appetizer => "appetizer",
            RecipeCategory::Sushi => "sushi",
            RecipeCategory::Sashimi => "sashimi",
            RecipeCategory::Roll => "roll",
            RecipeCategory::Dessert => "dessert",
            RecipeCategory::Beverage => "beverage",
            RecipeCategory::Other => "other",
        }
    }
}

impl fmt::Display for RecipeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecipeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "appetizer" => Ok(RecipeCategory::Appetizer),
            "sushi" => Ok(RecipeCategory::Sushi),
            "sashimi" => Ok(RecipeCategory::Sashimi),
            "roll" => Ok(RecipeCategory::Roll),
            "dessert" => Ok(RecipeCategory::Dessert),
            "beverage" => Ok(RecipeCategory::Beverage),
            "other" => Ok(RecipeCategory::Other),
            other => Err(format!("unknown recipe category: {}", other)),
        }
    }
}

/// Preparation steps, stored either as one text block or as a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Instructions {
    Text(String),
    Steps(Vec<String>),
}

impl Default for Instructions {
    fn default() -> Self {
        Instructions::Text(String::new())
    }
}

impl Instructions {
    /// Steps as a list; text is split on newlines and blank lines dropped
    pub fn steps(&self) -> Vec<String> {
        match self {
            Instructions::Text(text) => text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
            Instructions::Steps(steps) => steps
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps().is_empty()
    }
}

/// One line of a recipe: a raw ingredient or a sub-recipe reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub name: String,

    pub quantity: f64,

    #[serde(default)]
    pub unit: String,

    /// Cost per unit; for sub-recipes the referenced recipe's cost per serving
    #[serde(default)]
    pub unit_cost: f64,

    /// quantity × unit_cost
    #[serde(default)]
    pub total_cost: f64,

    #[serde(default)]
    pub is_from_odoo: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odoo_product_id: Option<i64>,

    #[serde(default)]
    pub is_recipe: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe_id: Option<Uuid>,
}

impl Ingredient {
    /// A plain ingredient with a known unit cost
    pub fn new(name: impl Into<String>, quantity: f64, unit: impl Into<String>, unit_cost: f64) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit: unit.into(),
            unit_cost,
            total_cost: quantity * unit_cost,
            is_from_odoo: false,
            odoo_product_id: None,
            is_recipe: false,
            recipe_id: None,
        }
    }

    /// A sub-recipe reference; the unit cost is resolved at calculation time
    pub fn sub_recipe(name: impl Into<String>, recipe_id: Uuid, servings_used: f64) -> Self {
        Self {
            name: name.into(),
            quantity: servings_used,
            unit: "serving".to_string(),
            unit_cost: 0.0,
            total_cost: 0.0,
            is_from_odoo: false,
            odoo_product_id: None,
            is_recipe: true,
            recipe_id: Some(recipe_id),
        }
    }

    pub fn is_sub_recipe(&self) -> bool {
        self.is_recipe || self.recipe_id.is_some()
    }
}

/// A recipe with its derived cost fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: Uuid,
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
    pub servings: u32,
    #[serde(default)]
    pub q_factor_percentage: f64,
    #[serde(default)]
    pub base_cost: f64,
    #[serde(default)]
    pub q_factor_amount: f64,
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default)]
    pub cost_per_serving: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool { true }

impl Recipe {
    /// A fresh recipe with no ingredients and zeroed costs
    pub fn new(name: impl Into<String>, category: RecipeCategory, servings: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            category,
            ingredients: Vec::new(),
            instructions: Instructions::default(),
            prep_time: 0,
            cook_time: 0,
            servings,
            q_factor_percentage: 0.0,
            base_cost: 0.0,
            q_factor_amount: 0.0,
            total_cost: 0.0,
            cost_per_serving: 0.0,
            notes: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Distinct sub-recipe ids referenced by a list of ingredient lines
pub fn sub_recipe_ids(ingredients: &[Ingredient]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = ingredients.iter().filter_map(|i| i.recipe_id).collect();
    ids.sort();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_recipe() -> Recipe {
        let mut recipe = Recipe::new("Spicy Tuna Roll", RecipeCategory::Roll, 4);
        recipe.ingredients = vec![
            Ingredient::new("Tuna", 0.5, "lb", 12.0),
            Ingredient::new("Sushi rice", 2.0, "cup", 0.8),
            Ingredient::sub_recipe("Spicy mayo", Uuid::new_v4(), 1.0),
        ];
        recipe.instructions = Instructions::Steps(vec!["Cut tuna".into(), "Roll".into()]);
        recipe.q_factor_percentage = 7.5;
        recipe.notes = Some("Serve chilled".into());
        recipe
    }

    #[test]
    fn test_recipe_json_round_trip() {
        let recipe = sample_recipe();
        let json = serde_json::to_string(&recipe).unwrap();
        let back: Recipe = serde_json::from_str(&json).unwrap();
        assert_eq!(recipe, back);
    }

    #[test]
    fn test_recipe_uses_camel_case() {
        let json = serde_json::to_value(sample_recipe()).unwrap();
        assert!(json.get("costPerServing").is_some());
        assert!(json.get("qFactorPercentage").is_some());
        assert!(json.get("prepTime").is_some());
        assert_eq!(json["category"], "roll");
        assert_eq!(json["ingredients"][2]["isRecipe"], true);
        assert!(json["ingredients"][0].get("recipeId").is_none());
    }

    #[test]
    fn test_instructions_accept_both_shapes() {
        let text: Instructions = serde_json::from_str("\"Rinse rice\\n\\nCook rice\"").unwrap();
        assert_eq!(text, Instructions::Text("Rinse rice\n\nCook rice".into()));
        assert_eq!(text.steps(), vec!["Rinse rice", "Cook rice"]);

        let list: Instructions = serde_json::from_str("[\"Slice\", \" \", \"Plate\"]").unwrap();
        assert_eq!(list.steps(), vec!["Slice", "Plate"]);
        assert_eq!(serde_json::to_string(&list).unwrap(), "[\"Slice\",\" \",\"Plate\"]");
    }

    #[test]
    fn test_ingredient_defaults_missing_price_to_zero() {
        let ingredient: Ingredient = serde_json::from_value(serde_json::json!({
            "name": "Nori",
            "quantity": 3
        }))
        .unwrap();
        assert_eq!(ingredient.unit_cost, 0.0);
        assert!(!ingredient.is_from_odoo);
        assert!(!ingredient.is_sub_recipe());
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("Sashimi".parse::<RecipeCategory>().unwrap(), RecipeCategory::Sashimi);
        assert!("pizza".parse::<RecipeCategory>().is_err());
        assert_eq!(RecipeCategory::default().to_string(), "other");
    }

    #[test]
    fn test_sub_recipe_ids_are_deduplicated() {
        let shared = Uuid::new_v4();
        let mut recipe = Recipe::new("Platter", RecipeCategory::Other, 2);
        recipe.ingredients = vec![
            Ingredient::sub_recipe("Rice", shared, 1.0),
            Ingredient::sub_recipe("Rice again", shared, 2.0),
            Ingredient::new("Wasabi", 1.0, "tsp", 0.1),
        ];
        assert_eq!(sub_recipe_ids(&recipe.ingredients), vec![shared]);
    }
}
