//! Per-source enable/disable switch

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::source::Source;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "source_configurations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text", unique)]
    pub source: String,

    pub is_enabled: bool,

    #[sea_orm(column_type = "Text", nullable)]
    pub display_name: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn new(source: Source, is_enabled: bool) -> Self {
        let now = chrono::Utc::now().fixed_offset();
        Self {
            id: Uuid::new_v4(),
            source: source.as_str().to_string(),
            is_enabled,
            display_name: Some(source.label().to_string()),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Configured display name or the built-in label
    pub fn label(&self) -> String {
        match (&self.display_name, self.source.parse::<Source>()) {
            (Some(name), _) if !name.is_empty() => name.clone(),
            (_, Ok(source)) => source.label().to_string(),
            _ => self.source.clone(),
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
