//! Domain models exchanged over the API

mod document;
mod integrations;
mod recipe;

pub use document::{decode_payload, encode_payload, Document, DocumentType};
pub use integrations::{
    summarize_sales, OdooConnection, OdooProduct, SalesPage, SalesSummary, ToastConnection,
    ToastSalesItem,
};
pub use recipe::{sub_recipe_ids, Ingredient, Instructions, Recipe, RecipeCategory};
