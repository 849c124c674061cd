use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

pub mod kinds {
    pub const URGENT_MESSAGE: &str = "URGENT_MESSAGE";
    pub const URGENT_POST: &str = "URGENT_POST";
    pub const COMMUNITY_APPROVED: &str = "COMMUNITY_APPROVED";
    pub const COMMUNITY_REJECTED: &str = "COMMUNITY_REJECTED";
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub notification_id: String,
    pub user_id: String,
    pub kind: String,
    pub priority: String,
    pub title: String,
    pub body: String,
    pub community_id: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    pub unread_only: Option<bool>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub notification_id: String,
}

const NOTIFICATION_COLUMNS: &str = "notification_id, user_id, kind, priority, title, body, \
     community_id, is_read, created_at";

impl Notification {
    pub async fn create(
        pool: &PgPool,
        user_id: &str,
        kind: &str,
        priority: &str,
        title: &str,
        body: &str,
        community_id: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        let notification_id = Uuid::new_v4().to_string();

        sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications (
                notification_id, user_id, kind, priority, title, body,
                community_id, is_read, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, false, NOW())
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(&notification_id)
        .bind(user_id)
        .bind(kind)
        .bind(priority)
        .bind(title)
        .bind(body)
        .bind(community_id)
        .fetch_one(pool)
        .await
    }

    /// Insert one notification per recipient, concurrently. Individual
    /// failures are logged and skipped; returns how many landed.
    pub async fn fan_out(
        pool: &PgPool,
        recipients: &[String],
        kind: &str,
        priority: &str,
        title: &str,
        body: &str,
        community_id: Option<&str>,
    ) -> usize {
        let inserts = recipients.iter().map(|user_id| {
            Self::create(pool, user_id, kind, priority, title, body, community_id)
        });

        let mut delivered = 0;
        for result in join_all(inserts).await {
            match result {
                Ok(_) => delivered += 1,
                Err(e) => tracing::error!("Failed to insert notification: {}", e),
            }
        }
        delivered
    }

    pub async fn list(
        pool: &PgPool,
        user_id: &str,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {}
            FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR NOT is_read)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Marks one of the caller's notifications as read; someone else's id is
    /// indistinguishable from a missing one.
    pub async fn mark_read(
        pool: &PgPool,
        notification_id: &str,
        user_id: &str,
    ) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true WHERE notification_id = $1 AND user_id = $2",
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }

    pub async fn mark_all_read(pool: &PgPool, user_id: &str) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = true WHERE user_id = $1 AND NOT is_read")
                .bind(user_id)
                .execute(pool)
                .await?;

        Ok(result.rows_affected())
    }
}
