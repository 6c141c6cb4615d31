//! Recipe entity

use crate::errors::{self, AppError};
use crate::models::{Instructions, Recipe};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "recipes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[sea_orm(column_type = "Text")]
    pub category: String,

    /// Ingredient lines as JSONB
    #[sea_orm(column_type = "JsonBinary")]
    pub ingredients: serde_json::Value,

    /// Free text or a list of steps, as JSONB
    #[sea_orm(column_type = "JsonBinary")]
    pub instructions: serde_json::Value,

    pub prep_time: i32,
    pub cook_time: i32,
    pub servings: i32,

    pub q_factor_percentage: f64,
    pub base_cost: f64,
    pub q_factor_amount: f64,
    pub total_cost: f64,
    pub cost_per_serving: f64,

    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,

    pub active: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Recipe {
    type Error = AppError;

    fn try_from(model: Model) -> errors::Result<Self> {
        let instructions: Instructions = serde_json::from_value(model.instructions)?;

        Ok(Recipe {
            id: model.id,
            name: model.name,
            // Unknown stored categories fall back to `other`
            category: model.category.parse().unwrap_or_default(),
            ingredients: serde_json::from_value(model.ingredients)?,
            instructions,
            prep_time: model.prep_time.max(0) as u32,
            cook_time: model.cook_time.max(0) as u32,
            servings: model.servings.max(0) as u32,
            q_factor_percentage: model.q_factor_percentage,
            base_cost: model.base_cost,
            q_factor_amount: model.q_factor_amount,
            total_cost: model.total_cost,
            cost_per_serving: model.cost_per_serving,
            notes: model.notes,
            active: model.active,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }
}

/// Build a fully set active model from a domain recipe
pub fn to_active_model(recipe: &Recipe) -> errors::Result<ActiveModel> {
    Ok(ActiveModel {
        id: Set(recipe.id),
        name: Set(recipe.name.clone()),
        category: Set(recipe.category.as_str().to_string()),
        ingredients: Set(serde_json::to_value(&recipe.ingredients)?),
        instructions: Set(serde_json::to_value(&recipe.instructions)?),
        prep_time: Set(clamp_i32(recipe.prep_time)),
        cook_time: Set(clamp_i32(recipe.cook_time)),
        servings: Set(clamp_i32(recipe.servings)),
        q_factor_percentage: Set(recipe.q_factor_percentage),
        base_cost: Set(recipe.base_cost),
        q_factor_amount: Set(recipe.q_factor_amount),
        total_cost: Set(recipe.total_cost),
        cost_per_serving: Set(recipe.cost_per_serving),
        notes: Set(recipe.notes.clone()),
        active: Set(recipe.active),
        created_at: Set(recipe.created_at.into()),
        updated_at: Set(recipe.updated_at.into()),
    })
}

fn clamp_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
