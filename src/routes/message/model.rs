use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::analysis::MessageAnalysis;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageInfo {
    pub message_id: String,
    pub community_id: String,
    pub user_id: String,
    pub content: String,
    pub tags: Option<Vec<String>>,
    pub ai_summary: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub sentiment: Option<String>,
    pub action_required: Option<bool>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct MessageWithNickname {
    pub message_id: String,
    pub community_id: String,
    pub user_id: String,
    pub nickname: String,
    pub content: String,
    pub tags: Option<Vec<String>>,
    pub ai_summary: Option<String>,
    pub priority: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub community_id: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesRequest {
    pub community_id: String,
    pub before_id: Option<String>,
    pub limit: Option<i64>,
}

const MESSAGE_COLUMNS: &str = "message_id, community_id, user_id, content, tags, ai_summary, \
     priority, category, sentiment, action_required, created_at";

impl MessageInfo {
    pub async fn create(
        pool: &PgPool,
        req: CreateMessageRequest,
        user_id: String,
    ) -> Result<Self, sqlx::Error> {
        let is_member = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM community_members
                WHERE community_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(&req.community_id)
        .bind(&user_id)
        .fetch_one(pool)
        .await?;

        if !is_member {
            return Err(sqlx::Error::Protocol(
                "User is not a member of this community".into(),
            ));
        }

        Self::insert(pool, &req.community_id, &user_id, &req.content).await
    }

    /// Insert without the membership check. Used for assistant-authored
    /// replies, which come from a synthetic account with no membership row.
    pub async fn insert(
        pool: &PgPool,
        community_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<Self, sqlx::Error> {
        let message_id = Uuid::new_v4().to_string();

        sqlx::query_as::<_, MessageInfo>(&format!(
            r#"
            INSERT INTO messages (message_id, community_id, user_id, content, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(&message_id)
        .bind(community_id)
        .bind(user_id)
        .bind(content)
        .fetch_one(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        req: ListMessagesRequest,
        user_id: &str,
    ) -> Result<Vec<MessageWithNickname>, sqlx::Error> {
        let is_member = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM community_members
                WHERE community_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(&req.community_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        if !is_member {
            return Err(sqlx::Error::Protocol(
                "User is not a member of this community".into(),
            ));
        }

        let limit = req.limit.unwrap_or(50).clamp(1, 100);

        let messages = sqlx::query_as::<_, MessageWithNickname>(
            r#"
            SELECT m.message_id, m.community_id, m.user_id, u.nickname,
                m.content, m.tags, m.ai_summary, m.priority, m.created_at
            FROM messages m
            JOIN users u ON u.user_id = m.user_id
            WHERE m.community_id = $1
                AND ($2::TEXT IS NULL OR m.created_at < (
                    SELECT created_at FROM messages WHERE message_id = $2
                ))
            ORDER BY m.created_at DESC
            LIMIT $3
            "#,
        )
        .bind(&req.community_id)
        .bind(&req.before_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    /// Write the analysis columns back once the detached classification task
    /// completes. Readers may observe the message without them in between.
    pub async fn store_analysis(
        pool: &PgPool,
        message_id: &str,
        analysis: &MessageAnalysis,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE messages
            SET tags = $2, ai_summary = $3, priority = $4, category = $5,
                sentiment = $6, action_required = $7
            WHERE message_id = $1
            "#,
        )
        .bind(message_id)
        .bind(&analysis.tags)
        .bind(&analysis.summary)
        .bind(analysis.priority.as_str())
        .bind(analysis.category.as_str())
        .bind(analysis.sentiment.as_str())
        .bind(analysis.action_required)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// The last few messages before `exclude_message_id`, oldest first,
    /// formatted as `nickname: content` lines for the classifier.
    pub async fn recent_context(
        pool: &PgPool,
        community_id: &str,
        exclude_message_id: &str,
        limit: i64,
    ) -> Result<Vec<String>, sqlx::Error> {
        let mut rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT u.nickname, m.content
            FROM messages m
            JOIN users u ON u.user_id = m.user_id
            WHERE m.community_id = $1 AND m.message_id != $2
            ORDER BY m.created_at DESC
            LIMIT $3
            "#,
        )
        .bind(community_id)
        .bind(exclude_message_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        rows.reverse();
        Ok(rows
            .into_iter()
            .map(|(nickname, content)| format!("{}: {}", nickname, content))
            .collect())
    }
}
