use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::utils::hash_password;

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: String,
    pub nickname: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: String,
    pub subscription_tier: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user_id: String,
    pub password: String,
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_id: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLocationRequest {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user_id: String,
    pub nickname: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateLocationResponse {
    pub location_updated_at: DateTime<Utc>,
}

const USER_COLUMNS: &str = "user_id, nickname, password_hash, role, subscription_tier, \
     latitude, longitude, location_updated_at, created_at";

impl User {
    pub async fn create(pool: &PgPool, req: RegisterRequest) -> Result<Self, sqlx::Error> {
        let password_hash = hash_password(&req.password)
            .map_err(|e| sqlx::Error::Protocol(format!("Failed to hash password: {}", e)))?;

        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (user_id, nickname, password_hash, role, subscription_tier, created_at)
            VALUES ($1, $2, $3, 'USER', 'FREE', NOW())
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&req.user_id)
        .bind(&req.nickname)
        .bind(&password_hash)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, user_id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE user_id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn update_location(
        pool: &PgPool,
        user_id: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<DateTime<Utc>, sqlx::Error> {
        sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            UPDATE users
            SET latitude = $2, longitude = $3, location_updated_at = NOW()
            WHERE user_id = $1
            RETURNING location_updated_at
            "#,
        )
        .bind(user_id)
        .bind(latitude)
        .bind(longitude)
        .fetch_one(pool)
        .await
    }

    /// Last stored coordinates, if the user has ever reported any.
    pub async fn location(
        pool: &PgPool,
        user_id: &str,
    ) -> Result<Option<(f64, f64)>, sqlx::Error> {
        let row = sqlx::query_as::<_, (Option<f64>, Option<f64>)>(
            "SELECT latitude, longitude FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.and_then(|(lat, lon)| lat.zip(lon)))
    }
}
