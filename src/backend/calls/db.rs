/**
 * PostgreSQL Call Store
 *
 * Persists calls and participants to the tables created by
 * `migrations/20250101000000_calls.sql`.
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::store::CallStore;
use crate::backend::error::StoreError;
use crate::shared::{Call, CallStatus, CallType};

#[derive(sqlx::FromRow)]
struct CallRow {
    id: Uuid,
    channel_id: Uuid,
    initiator_id: Uuid,
    call_type: String,
    status: String,
    accepted_by: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CallRow> for Call {
    type Error = StoreError;

    fn try_from(row: CallRow) -> Result<Self, Self::Error> {
        Ok(Call {
            id: row.id,
            channel_id: row.channel_id,
            initiator_id: row.initiator_id,
            call_type: row.call_type.parse::<CallType>()?,
            status: row.status.parse::<CallStatus>()?,
            accepted_by: row.accepted_by,
            started_at: row.started_at,
            ended_at: row.ended_at,
            created_at: row.created_at,
        })
    }
}

const CALL_COLUMNS: &str =
    "id, channel_id, initiator_id, call_type, status, accepted_by, started_at, ended_at, created_at";

#[derive(Clone)]
pub struct PgCallStore {
    pool: PgPool,
}

impl PgCallStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CallStore for PgCallStore {
    async fn create(&self, call: &Call) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO calls (id, channel_id, initiator_id, call_type, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(call.id)
        .bind(call.channel_id)
        .bind(call.initiator_id)
        .bind(call.call_type.as_str())
        .bind(call.status.as_str())
        .bind(call.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, call_id: Uuid) -> Result<Option<Call>, StoreError> {
        let query = format!("SELECT {} FROM calls WHERE id = $1", CALL_COLUMNS);
        let row = sqlx::query_as::<_, CallRow>(&query)
            .bind(call_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Call::try_from).transpose()
    }

    async fn mark_started(&self, call_id: Uuid, accepted_by: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE calls
            SET status = 'in_progress', accepted_by = $2, started_at = $3
            WHERE id = $1 AND status = 'ringing'
            "#,
        )
        .bind(call_id)
        .bind(accepted_by)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_ended(
        &self,
        call_id: Uuid,
        status: CallStatus,
        from: &[CallStatus],
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let from: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();
        let result = sqlx::query(
            r#"
            UPDATE calls
            SET status = $2, ended_at = $3
            WHERE id = $1 AND status = ANY($4)
            "#,
        )
        .bind(call_id)
        .bind(status.as_str())
        .bind(at)
        .bind(&from)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn add_participant(&self, call_id: Uuid, user_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO call_participants (call_id, user_id, joined_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (call_id, user_id) DO UPDATE SET joined_at = $3, left_at = NULL
            "#,
        )
        .bind(call_id)
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_participant(&self, call_id: Uuid, user_id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE call_participants SET left_at = $3
            WHERE call_id = $1 AND user_id = $2 AND left_at IS NULL
            "#,
        )
        .bind(call_id)
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn count_active_participants(&self, call_id: Uuid) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM call_participants WHERE call_id = $1 AND left_at IS NULL
            "#,
        )
        .bind(call_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn find_active_for_channel(&self, channel_id: Uuid) -> Result<Option<Call>, StoreError> {
        let query = format!(
            "SELECT {} FROM calls WHERE channel_id = $1 AND status IN ('ringing', 'in_progress') \
             ORDER BY created_at DESC LIMIT 1",
            CALL_COLUMNS
        );
        let row = sqlx::query_as::<_, CallRow>(&query)
            .bind(channel_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Call::try_from).transpose()
    }

    async fn list_by_channel(&self, channel_id: Uuid, limit: i64) -> Result<Vec<Call>, StoreError> {
        let query = format!(
            "SELECT {} FROM calls WHERE channel_id = $1 ORDER BY created_at DESC LIMIT $2",
            CALL_COLUMNS
        );
        let rows = sqlx::query_as::<_, CallRow>(&query)
            .bind(channel_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Call::try_from).collect()
    }

    async fn expire_stale_ringing(&self, cutoff: DateTime<Utc>, at: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE calls SET status = 'missed', ended_at = $2
            WHERE status = 'ringing' AND created_at < $1
            "#,
        )
        .bind(cutoff)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
