use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Client as RedisClient};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::geo;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Community {
    pub community_id: String,
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: Option<f64>,
    pub is_active: bool,
    pub creator_id: String,
    pub created_at: DateTime<Utc>,
    pub member_count: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommunityRequest {
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct CommunityInfo {
    pub community_id: String,
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: Option<f64>,
    pub is_active: bool,
    pub member_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct NearbyCommunityInfo {
    pub community_id: String,
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: Option<f64>,
    pub member_count: i32,
    pub distance_km: f64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct MemberInfo {
    pub user_id: String,
    pub nickname: String,
    pub member_role: String,
    pub joined_at: DateTime<Utc>,
}

impl From<Community> for CommunityInfo {
    fn from(c: Community) -> Self {
        Self {
            community_id: c.community_id,
            name: c.name,
            description: c.description,
            latitude: c.latitude,
            longitude: c.longitude,
            radius_km: c.radius_km,
            is_active: c.is_active,
            member_count: c.member_count,
            created_at: c.created_at,
        }
    }
}

const COMMUNITY_CACHE_EXPIRE: u64 = 600;
const COMMUNITY_ID_CACHE_PREFIX: &str = "community:id:";

const COMMUNITY_COLUMNS: &str = "community_id, name, description, latitude, longitude, \
     radius_km, is_active, creator_id, created_at, member_count";

async fn invalidate_cache(redis: &Arc<RedisClient>, community_id: &str) {
    if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
        let cache_key = format!("{}{}", COMMUNITY_ID_CACHE_PREFIX, community_id);
        let _: Result<(), redis::RedisError> = conn.del(&cache_key).await;
    }
}

impl Community {
    /// New communities start inactive and wait for platform-admin approval.
    /// The creator is recorded as the community admin member.
    pub async fn create(
        pool: &PgPool,
        req: CreateCommunityRequest,
        creator_id: String,
    ) -> Result<Self, sqlx::Error> {
        let community_id = Uuid::new_v4().to_string();

        let mut tx = pool.begin().await?;

        let community = sqlx::query_as::<_, Community>(
            r#"
            INSERT INTO communities (
                community_id, name, description, latitude, longitude,
                radius_km, is_active, creator_id, created_at, member_count
            )
            VALUES ($1, $2, $3, $4, $5, $6, false, $7, NOW(), 1)
            RETURNING community_id, name, description, latitude, longitude,
                radius_km, is_active, creator_id, created_at, member_count
            "#,
        )
        .bind(&community_id)
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.latitude)
        .bind(req.longitude)
        .bind(req.radius_km)
        .bind(&creator_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO community_members (community_id, user_id, member_role, joined_at)
            VALUES ($1, $2, 'ADMIN', NOW())
            "#,
        )
        .bind(&community_id)
        .bind(&creator_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(community)
    }

    pub async fn find_by_id(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        community_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let cache_key = format!("{}{}", COMMUNITY_ID_CACHE_PREFIX, community_id);

        if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
            let cached: redis::RedisResult<String> = conn.get(&cache_key).await;

            if let Ok(json_str) = cached {
                if let Ok(community) = serde_json::from_str::<Community>(&json_str) {
                    tracing::debug!("Get community from cache: {}", cache_key);
                    return Ok(Some(community));
                }
            }
        }

        let community = sqlx::query_as::<_, Community>(&format!(
            "SELECT {} FROM communities WHERE community_id = $1",
            COMMUNITY_COLUMNS
        ))
        .bind(community_id)
        .fetch_optional(pool)
        .await?;

        if let Some(ref c) = community {
            if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
                if let Ok(json_str) = serde_json::to_string(c) {
                    let _: Result<(), redis::RedisError> = conn
                        .set_ex(&cache_key, json_str, COMMUNITY_CACHE_EXPIRE)
                        .await;
                    tracing::debug!("Set community to cache: {}", cache_key);
                }
            }
        }

        Ok(community)
    }

    pub async fn list_active(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Community>(&format!(
            "SELECT {} FROM communities WHERE is_active ORDER BY created_at DESC LIMIT $1",
            COMMUNITY_COLUMNS
        ))
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn list_pending(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Community>(&format!(
            "SELECT {} FROM communities WHERE NOT is_active ORDER BY created_at ASC",
            COMMUNITY_COLUMNS
        ))
        .fetch_all(pool)
        .await
    }

    /// Active communities whose own radius covers the given point, closest
    /// first. A degree-window prefilter in SQL keeps the candidate set small;
    /// the exact Haversine check runs in process.
    pub async fn find_nearby(
        pool: &PgPool,
        latitude: f64,
        longitude: f64,
        max_search_radius_km: f64,
        default_radius_km: f64,
    ) -> Result<Vec<(Self, f64)>, sqlx::Error> {
        let prefilter_km = max_search_radius_km.max(default_radius_km);
        let (lat_range, lon_range) = geo::bounding_box(latitude, longitude, prefilter_km);

        let candidates = sqlx::query_as::<_, Community>(&format!(
            r#"
            SELECT {}
            FROM communities
            WHERE is_active
                AND latitude BETWEEN ($1::DOUBLE PRECISION - $3::DOUBLE PRECISION)
                AND ($1::DOUBLE PRECISION + $3::DOUBLE PRECISION)
                AND longitude BETWEEN ($2::DOUBLE PRECISION - $4::DOUBLE PRECISION)
                AND ($2::DOUBLE PRECISION + $4::DOUBLE PRECISION)
            "#,
            COMMUNITY_COLUMNS
        ))
        .bind(latitude)
        .bind(longitude)
        .bind(lat_range)
        .bind(lon_range)
        .fetch_all(pool)
        .await?;

        Ok(Self::filter_by_distance(
            latitude,
            longitude,
            candidates,
            default_radius_km,
        ))
    }

    /// Exact distance filter and sort. A community is included when the
    /// requester sits inside its radius (or inside `default_radius_km` when
    /// the community has none).
    pub fn filter_by_distance(
        latitude: f64,
        longitude: f64,
        communities: Vec<Community>,
        default_radius_km: f64,
    ) -> Vec<(Community, f64)> {
        let mut nearby: Vec<(Community, f64)> = communities
            .into_iter()
            .filter_map(|c| {
                let distance = geo::haversine_km(latitude, longitude, c.latitude, c.longitude);
                let reach = geo::effective_radius_km(c.radius_km, default_radius_km);
                (distance <= reach).then_some((c, distance))
            })
            .collect();

        nearby.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        nearby
    }

    pub async fn is_member(
        pool: &PgPool,
        community_id: &str,
        user_id: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM community_members
                WHERE community_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(community_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    pub async fn member_ids(pool: &PgPool, community_id: &str) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM community_members WHERE community_id = $1",
        )
        .bind(community_id)
        .fetch_all(pool)
        .await
    }

    pub async fn members(pool: &PgPool, community_id: &str) -> Result<Vec<MemberInfo>, sqlx::Error> {
        sqlx::query_as::<_, MemberInfo>(
            r#"
            SELECT cm.user_id, u.nickname, cm.member_role, cm.joined_at
            FROM community_members cm
            JOIN users u ON u.user_id = cm.user_id
            WHERE cm.community_id = $1
            ORDER BY cm.joined_at ASC
            "#,
        )
        .bind(community_id)
        .fetch_all(pool)
        .await
    }

    /// One membership row per (user, community): a repeat join is an error,
    /// not a no-op.
    pub async fn join(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        community_id: &str,
        user_id: &str,
    ) -> Result<(), sqlx::Error> {
        let community = Self::find_by_id(pool, redis, community_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        if !community.is_active {
            return Err(sqlx::Error::Protocol(
                "Community is not active".into(),
            ));
        }

        if Self::is_member(pool, community_id, user_id).await? {
            return Err(sqlx::Error::Protocol(
                "Already a member of this community".into(),
            ));
        }

        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO community_members (community_id, user_id, member_role, joined_at)
            VALUES ($1, $2, 'MEMBER', NOW())
            "#,
        )
        .bind(community_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE communities SET member_count = member_count + 1 WHERE community_id = $1")
            .bind(community_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        invalidate_cache(redis, community_id).await;

        Ok(())
    }

    pub async fn leave(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        community_id: &str,
        user_id: &str,
    ) -> Result<(), sqlx::Error> {
        if !Self::is_member(pool, community_id, user_id).await? {
            return Err(sqlx::Error::Protocol(
                "User is not a member of this community".into(),
            ));
        }

        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM community_members WHERE community_id = $1 AND user_id = $2")
            .bind(community_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE communities SET member_count = member_count - 1 WHERE community_id = $1")
            .bind(community_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        invalidate_cache(redis, community_id).await;

        Ok(())
    }

    /// PENDING -> ACTIVE. Approving an already-active community is refused.
    pub async fn approve(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        community_id: &str,
    ) -> Result<Self, sqlx::Error> {
        let updated = sqlx::query_as::<_, Community>(&format!(
            r#"
            UPDATE communities SET is_active = true
            WHERE community_id = $1 AND NOT is_active
            RETURNING {}
            "#,
            COMMUNITY_COLUMNS
        ))
        .bind(community_id)
        .fetch_optional(pool)
        .await?;

        let community = match updated {
            Some(c) => c,
            None => {
                // Distinguish "missing" from "already active".
                let exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM communities WHERE community_id = $1)",
                )
                .bind(community_id)
                .fetch_one(pool)
                .await?;
                return Err(if exists {
                    sqlx::Error::Protocol("Community is not pending".into())
                } else {
                    sqlx::Error::RowNotFound
                });
            }
        };

        invalidate_cache(redis, community_id).await;

        Ok(community)
    }

    /// PENDING -> gone. Content and membership rows are purged with the
    /// community in one transaction; per-user notifications are left alone.
    pub async fn reject(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        community_id: &str,
    ) -> Result<Self, sqlx::Error> {
        let community = sqlx::query_as::<_, Community>(&format!(
            "SELECT {} FROM communities WHERE community_id = $1",
            COMMUNITY_COLUMNS
        ))
        .bind(community_id)
        .fetch_optional(pool)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;

        if community.is_active {
            return Err(sqlx::Error::Protocol("Community is not pending".into()));
        }

        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM messages WHERE community_id = $1")
            .bind(community_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM posts WHERE community_id = $1")
            .bind(community_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM community_members WHERE community_id = $1")
            .bind(community_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM communities WHERE community_id = $1")
            .bind(community_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        invalidate_cache(redis, community_id).await;

        Ok(community)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn community(id: &str, lat: f64, lon: f64, radius_km: Option<f64>) -> Community {
        Community {
            community_id: id.to_string(),
            name: format!("community-{}", id),
            description: String::new(),
            latitude: lat,
            longitude: lon,
            radius_km,
            is_active: true,
            creator_id: "creator".into(),
            created_at: Utc::now(),
            member_count: 1,
        }
    }

    #[test]
    fn colocated_community_is_included_first_with_zero_distance() {
        // Requester standing exactly at the community center.
        let communities = vec![
            community("far", 40.9, -74.5, Some(5.0)),
            community("here", 40.7128, -74.0060, Some(5.0)),
        ];

        let nearby = Community::filter_by_distance(40.7128, -74.0060, communities, 10.0);
        assert_eq!(nearby[0].0.community_id, "here");
        assert_eq!(nearby[0].1, 0.0);
    }

    #[test]
    fn never_returns_a_community_outside_its_radius() {
        // ~0.9 km per 0.008 degrees of latitude at this parallel.
        let communities = vec![
            community("tight", 40.7128, -74.0060, Some(0.5)),
            community("roomy", 40.7128, -74.0060, Some(50.0)),
        ];

        let nearby = Community::filter_by_distance(40.7210, -74.0060, communities, 10.0);
        for (c, distance) in &nearby {
            let reach = geo::effective_radius_km(c.radius_km, 10.0);
            assert!(*distance <= reach);
        }
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].0.community_id, "roomy");
    }

    #[test]
    fn unset_radius_behaves_as_ten_kilometers() {
        // ~8.3 km north of the center.
        let included = vec![community("a", 40.7128, -74.0060, None)];
        let nearby = Community::filter_by_distance(40.7878, -74.0060, included, 10.0);
        assert_eq!(nearby.len(), 1);

        // ~16.6 km north: outside the 10 km default.
        let excluded = vec![community("b", 40.7128, -74.0060, Some(0.0))];
        let nearby = Community::filter_by_distance(40.8628, -74.0060, excluded, 10.0);
        assert!(nearby.is_empty());
    }

    #[test]
    fn results_are_sorted_by_ascending_distance() {
        let communities = vec![
            community("mid", 40.75, -74.0060, Some(50.0)),
            community("near", 40.7128, -74.0060, Some(50.0)),
            community("far", 40.80, -74.0060, Some(50.0)),
        ];

        let nearby = Community::filter_by_distance(40.7128, -74.0060, communities, 10.0);
        let ids: Vec<&str> = nearby.iter().map(|(c, _)| c.community_id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
        assert!(nearby.windows(2).all(|w| w[0].1 <= w[1].1));
    }
}
