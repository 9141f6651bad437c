use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Location {
    pub location_id: String,
    pub name: String,
    pub activity: String,
    pub tags: Vec<String>,
    pub sustainability_score: i32,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateLocationRequest {
    pub name: String,
    pub activity: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub sustainability_score: i32,
    #[serde(default)]
    pub image_url: String,
}

#[derive(Debug, Deserialize)]
pub struct SuggestLocationRequest {
    pub group_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

const LOCATION_COLUMNS: &str =
    "location_id, name, activity, tags, sustainability_score, image_url, created_at";

impl Location {
    pub async fn create(pool: &PgPool, req: CreateLocationRequest) -> Result<Self, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO locations (
                location_id, name, activity, tags, sustainability_score, image_url, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING {LOCATION_COLUMNS}
            "#
        );

        let tags: Vec<String> = req.tags.iter().map(|t| t.to_lowercase()).collect();

        sqlx::query_as::<_, Location>(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(&req.name)
            .bind(&req.activity)
            .bind(&tags)
            .bind(req.sustainability_score)
            .bind(&req.image_url)
            .fetch_one(pool)
            .await
    }

    pub async fn all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!("SELECT {LOCATION_COLUMNS} FROM locations ORDER BY created_at DESC");
        sqlx::query_as::<_, Location>(&sql).fetch_all(pool).await
    }

    // 同活动里可持续评分最高的地点，可按标签再收窄
    pub async fn suggest(
        pool: &PgPool,
        activity: &str,
        tags: &[String],
    ) -> Result<Option<Self>, sqlx::Error> {
        let tags: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();
        let sql = format!(
            r#"
            SELECT {LOCATION_COLUMNS} FROM locations
            WHERE activity = $1
              AND (cardinality($2::text[]) = 0 OR tags && $2::text[])
            ORDER BY sustainability_score DESC
            LIMIT 1
            "#
        );
        sqlx::query_as::<_, Location>(&sql)
            .bind(activity)
            .bind(&tags)
            .fetch_optional(pool)
            .await
    }
}
