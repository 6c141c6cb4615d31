//! Document entity

use crate::errors::{self, AppError};
use crate::models::Document;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[sea_orm(column_type = "Text")]
    pub doc_type: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub content: Option<String>,

    /// Base64 file payload
    #[sea_orm(column_type = "Text", nullable)]
    pub file_data: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub file_name: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub mime_type: Option<String>,

    pub size: i64,

    #[sea_orm(column_type = "JsonBinary")]
    pub tags: serde_json::Value,

    pub uploaded_at: DateTimeWithTimeZone,

    pub modified_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Document {
    type Error = AppError;

    fn try_from(model: Model) -> errors::Result<Self> {
        Ok(Document {
            id: model.id,
            name: model.name,
            doc_type: model.doc_type.parse().unwrap_or_default(),
            content: model.content,
            file_data: model.file_data,
            file_name: model.file_name,
            mime_type: model.mime_type,
            size: model.size.max(0) as u64,
            tags: serde_json::from_value(model.tags)?,
            uploaded_at: model.uploaded_at.into(),
            modified_at: model.modified_at.into(),
        })
    }
}

/// Build a fully set active model from a domain document
pub fn to_active_model(document: &Document) -> errors::Result<ActiveModel> {
    Ok(ActiveModel {
        id: Set(document.id),
        name: Set(document.name.clone()),
        doc_type: Set(document.doc_type.as_str().to_string()),
        content: Set(document.content.clone()),
        file_data: Set(document.file_data.clone()),
        file_name: Set(document.file_name.clone()),
        mime_type: Set(document.mime_type.clone()),
        size: Set(i64::try_from(document.size).unwrap_or(i64::MAX)),
        tags: Set(serde_json::to_value(&document.tags)?),
        uploaded_at: Set(document.uploaded_at.into()),
        modified_at: Set(document.modified_at.into()),
    })
}
