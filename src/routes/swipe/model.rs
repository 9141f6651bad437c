use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::routes::location::model::Location;

// 只追加的点选记录，匹配时只读
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Swipe {
    pub swipe_id: String,
    pub user_id: String,
    pub location_id: String,
    pub liked: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSwipeRequest {
    pub location_id: String,
    pub liked: bool,
}

impl Swipe {
    pub async fn create(
        pool: &PgPool,
        user_id: &str,
        req: &CreateSwipeRequest,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Swipe>(
            r#"
            INSERT INTO swipes (swipe_id, user_id, location_id, liked, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING swipe_id, user_id, location_id, liked, created_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(&req.location_id)
        .bind(req.liked)
        .fetch_one(pool)
        .await
    }

    // 左右滑都算已处理过，前端用来去重
    pub async fn swiped_location_ids(
        pool: &PgPool,
        user_id: &str,
    ) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT location_id FROM swipes WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn liked_locations(
        pool: &PgPool,
        user_id: &str,
    ) -> Result<Vec<Location>, sqlx::Error> {
        sqlx::query_as::<_, Location>(
            r#"
            SELECT l.location_id, l.name, l.activity, l.tags, l.sustainability_score,
                   l.image_url, l.created_at
            FROM swipes s
            JOIN locations l ON l.location_id = s.location_id
            WHERE s.user_id = $1 AND s.liked
            ORDER BY s.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    // 建组时回填地点用：最近一次点赞的地点
    pub async fn latest_liked_location(
        pool: &PgPool,
        user_id: &str,
    ) -> Result<Option<Location>, sqlx::Error> {
        sqlx::query_as::<_, Location>(
            r#"
            SELECT l.location_id, l.name, l.activity, l.tags, l.sustainability_score,
                   l.image_url, l.created_at
            FROM swipes s
            JOIN locations l ON l.location_id = s.location_id
            WHERE s.user_id = $1 AND s.liked
            ORDER BY s.created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }
}
