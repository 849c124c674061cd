use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::analysis::MessageAnalysis;

/// Forum post kinds selectable by the author. The AI category is derived
/// separately and does not overwrite this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostType {
    #[default]
    Discussion,
    Question,
    Announcement,
    Event,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Discussion => "DISCUSSION",
            PostType::Question => "QUESTION",
            PostType::Announcement => "ANNOUNCEMENT",
            PostType::Event => "EVENT",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostInfo {
    pub post_id: String,
    pub community_id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub post_type: String,
    pub tags: Option<Vec<String>>,
    pub ai_summary: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub sentiment: Option<String>,
    pub action_required: Option<bool>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub community_id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub post_type: PostType,
}

#[derive(Debug, Deserialize)]
pub struct ListPostsRequest {
    pub community_id: String,
    pub before_id: Option<String>,
    pub limit: Option<i64>,
}

const POST_COLUMNS: &str = "post_id, community_id, user_id, title, content, post_type, tags, \
     ai_summary, priority, category, sentiment, action_required, created_at";

impl PostInfo {
    pub async fn create(
        pool: &PgPool,
        req: CreatePostRequest,
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

        let post_id = Uuid::new_v4().to_string();

        sqlx::query_as::<_, PostInfo>(&format!(
            r#"
            INSERT INTO posts (post_id, community_id, user_id, title, content, post_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING {}
            "#,
            POST_COLUMNS
        ))
        .bind(&post_id)
        .bind(&req.community_id)
        .bind(&user_id)
        .bind(&req.title)
        .bind(&req.content)
        .bind(req.post_type.as_str())
        .fetch_one(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        req: ListPostsRequest,
        user_id: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
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

        sqlx::query_as::<_, PostInfo>(&format!(
            r#"
            SELECT {}
            FROM posts
            WHERE community_id = $1
                AND ($2::TEXT IS NULL OR created_at < (
                    SELECT created_at FROM posts WHERE post_id = $2
                ))
            ORDER BY created_at DESC
            LIMIT $3
            "#,
            POST_COLUMNS
        ))
        .bind(&req.community_id)
        .bind(&req.before_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn store_analysis(
        pool: &PgPool,
        post_id: &str,
        analysis: &MessageAnalysis,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE posts
            SET tags = $2, ai_summary = $3, priority = $4, category = $5,
                sentiment = $6, action_required = $7
            WHERE post_id = $1
            "#,
        )
        .bind(post_id)
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_type_defaults_to_discussion() {
        let req: CreatePostRequest = serde_json::from_str(
            r#"{"community_id": "c1", "title": "t", "content": "body"}"#,
        )
        .unwrap();
        assert_eq!(req.post_type, PostType::Discussion);
    }

    #[test]
    fn post_type_parses_screaming_case() {
        let req: CreatePostRequest = serde_json::from_str(
            r#"{"community_id": "c1", "title": "t", "content": "body", "post_type": "EVENT"}"#,
        )
        .unwrap();
        assert_eq!(req.post_type, PostType::Event);
        assert_eq!(req.post_type.as_str(), "EVENT");
    }
}
