//! SeaORM entity models
//!
//! Database entities for Picture of the Day

mod picture;
mod source_config;

pub use picture::{
    Entity as PictureEntity,
    Model as Picture,
    ActiveModel as PictureActiveModel,
    Column as PictureColumn,
};

pub use source_config::{
    Entity as SourceConfigEntity,
    Model as SourceConfig,
    ActiveModel as SourceConfigActiveModel,
    Column as SourceConfigColumn,
};
