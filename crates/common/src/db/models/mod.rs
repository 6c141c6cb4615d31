//! SeaORM entity models
//!
//! Database entities for Noe Ops

pub mod document;
pub mod recipe;

pub use recipe::{
    Entity as RecipeEntity,
    Model as RecipeRow,
    ActiveModel as RecipeActiveModel,
    Column as RecipeColumn,
};

pub use document::{
    Entity as DocumentEntity,
    Model as DocumentRow,
    ActiveModel as DocumentActiveModel,
    Column as DocumentColumn,
};
