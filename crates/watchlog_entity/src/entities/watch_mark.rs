//! 已观看记录，以视频 id 为主键，重复写入视为无操作

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Default, Serialize, Deserialize)]
#[sea_orm(table_name = "watch_mark")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub video_id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub channel_title: String,
    pub published_at: Option<DateTimeUtc>,
    pub source_url: String,
    pub watched_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
