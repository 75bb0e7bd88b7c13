use std::collections::HashSet;

use anyhow::{Result, ensure};
use async_trait::async_trait;
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, QuerySelect};
use watchlog_entity::*;

use crate::history::WatchMark;

/// 单次远端存在性检查允许的最大 id 数量
pub const CHECK_BATCH_SIZE: usize = 100;

/// 持久化的观看记录存储，是跨设备、跨会话判断是否已观看的唯一依据
#[async_trait]
pub trait WatchStore: Send + Sync {
    /// 返回 `video_ids` 中已被记录为已观看的子集，输入不超过 [`CHECK_BATCH_SIZE`] 个
    async fn batch_check_watched(&self, video_ids: &[String]) -> Result<HashSet<String>>;

    /// 批量写入，主键冲突时静默忽略
    async fn record_watched(&self, marks: &[WatchMark]) -> Result<()>;

    async fn remove_watched(&self, video_ids: &[String]) -> Result<()>;
}

pub struct DatabaseWatchStore {
    connection: DatabaseConnection,
}

impl DatabaseWatchStore {
    pub fn new(connection: DatabaseConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl WatchStore for DatabaseWatchStore {
    async fn batch_check_watched(&self, video_ids: &[String]) -> Result<HashSet<String>> {
        ensure!(
            video_ids.len() <= CHECK_BATCH_SIZE,
            "at most {} ids can be checked at once, got {}",
            CHECK_BATCH_SIZE,
            video_ids.len()
        );
        if video_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let watched: Vec<String> = watch_mark::Entity::find()
            .select_only()
            .column(watch_mark::Column::VideoId)
            .filter(watch_mark::Column::VideoId.is_in(video_ids.iter().map(String::as_str)))
            .into_tuple()
            .all(&self.connection)
            .await?;
        Ok(watched.into_iter().collect())
    }

    async fn record_watched(&self, marks: &[WatchMark]) -> Result<()> {
        // sqlite 对单条语句的参数数量有限制，分块插入
        for chunk in marks.chunks(CHECK_BATCH_SIZE) {
            let models = chunk.iter().map(|mark| watch_mark::ActiveModel {
                video_id: Set(mark.video.id.clone()),
                title: Set(mark.video.title.clone()),
                thumbnail_url: Set(mark.video.thumbnail_url.clone()),
                channel_title: Set(mark.video.channel_title.clone()),
                published_at: Set(mark.video.published_at),
                source_url: Set(mark.video.source_url.clone()),
                watched_at: Set(mark.watched_at),
            });
            watch_mark::Entity::insert_many(models)
                .on_conflict(
                    OnConflict::column(watch_mark::Column::VideoId)
                        .do_nothing()
                        .to_owned(),
                )
                .do_nothing()
                .exec(&self.connection)
                .await?;
        }
        Ok(())
    }

    async fn remove_watched(&self, video_ids: &[String]) -> Result<()> {
        for chunk in video_ids.chunks(CHECK_BATCH_SIZE) {
            watch_mark::Entity::delete_many()
                .filter(watch_mark::Column::VideoId.is_in(chunk.iter().map(String::as_str)))
                .exec(&self.connection)
                .await?;
        }
        Ok(())
    }
}
