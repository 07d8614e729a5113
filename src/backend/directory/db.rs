/**
 * PostgreSQL Channel Directory
 *
 * Reads the `channel_members` table maintained by the channel service.
 */

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::ChannelDirectory;
use crate::backend::error::StoreError;

#[derive(Clone)]
pub struct PgChannelDirectory {
    pool: PgPool,
}

impl PgChannelDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelDirectory for PgChannelDirectory {
    async fn is_channel_member(&self, channel_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let is_member: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(SELECT 1 FROM channel_members WHERE channel_id = $1 AND user_id = $2)
            "#,
        )
        .bind(channel_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(is_member)
    }

    async fn user_channel_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT channel_id FROM channel_members WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
