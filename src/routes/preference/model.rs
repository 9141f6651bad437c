use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Preference {
    pub user_id: String,
    pub activity: String,
    pub activities: Vec<String>,
    pub vibe: String,
    pub social_style: String,
    pub indoor_outdoor: String,
    pub sustainability: String,
    pub availability_days: Vec<String>,
    pub availability_times: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

// 客户端字段都是可选的，入库前统一补默认值
#[derive(Debug, Default, Deserialize)]
pub struct SavePreferenceRequest {
    pub activity: Option<String>,
    pub activities: Option<Vec<String>>,
    pub vibe: Option<String>,
    pub energy_level: Option<String>,
    pub social_style: Option<String>,
    pub indoor_outdoor: Option<String>,
    pub sustainability: Option<String>,
    pub availability_days: Option<Vec<String>>,
    pub availability_times: Option<Vec<String>>,
}

#[derive(Debug, PartialEq)]
pub struct NormalizedPreference {
    pub activity: String,
    pub activities: Vec<String>,
    pub vibe: String,
    pub social_style: String,
    pub indoor_outdoor: String,
    pub sustainability: String,
    pub availability_days: Vec<String>,
    pub availability_times: Vec<String>,
}

fn non_empty(values: Option<Vec<String>>) -> Vec<String> {
    values
        .unwrap_or_default()
        .into_iter()
        .filter(|v| !v.trim().is_empty())
        .collect()
}

impl SavePreferenceRequest {
    pub fn normalize(self) -> NormalizedPreference {
        let activities = non_empty(self.activities);

        // 主活动缺省时退回活动列表的第一项，再退回 study
        let activity = self
            .activity
            .filter(|a| !a.trim().is_empty())
            .or_else(|| activities.first().cloned())
            .unwrap_or_else(|| "study".to_string());

        let vibe = self
            .vibe
            .or(self.energy_level)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "balanced".to_string());

        NormalizedPreference {
            activity,
            activities,
            vibe,
            social_style: self.social_style.unwrap_or_else(|| "casual".to_string()),
            indoor_outdoor: self.indoor_outdoor.unwrap_or_else(|| "both".to_string()),
            sustainability: self.sustainability.unwrap_or_else(|| "low".to_string()),
            availability_days: non_empty(self.availability_days),
            availability_times: non_empty(self.availability_times),
        }
    }
}

const PREFERENCE_COLUMNS: &str = "user_id, activity, activities, vibe, social_style, \
     indoor_outdoor, sustainability, availability_days, availability_times, updated_at";

impl Preference {
    // 每个用户一条记录，后写覆盖
    pub async fn upsert(
        pool: &PgPool,
        user_id: &str,
        pref: NormalizedPreference,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO preferences (
                user_id, activity, activities, vibe, social_style,
                indoor_outdoor, sustainability, availability_days, availability_times, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                activity = EXCLUDED.activity,
                activities = EXCLUDED.activities,
                vibe = EXCLUDED.vibe,
                social_style = EXCLUDED.social_style,
                indoor_outdoor = EXCLUDED.indoor_outdoor,
                sustainability = EXCLUDED.sustainability,
                availability_days = EXCLUDED.availability_days,
                availability_times = EXCLUDED.availability_times,
                updated_at = NOW()
            RETURNING {PREFERENCE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Preference>(&sql)
            .bind(user_id)
            .bind(&pref.activity)
            .bind(&pref.activities)
            .bind(&pref.vibe)
            .bind(&pref.social_style)
            .bind(&pref.indoor_outdoor)
            .bind(&pref.sustainability)
            .bind(&pref.availability_days)
            .bind(&pref.availability_times)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_user(pool: &PgPool, user_id: &str) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {PREFERENCE_COLUMNS} FROM preferences WHERE user_id = $1");
        sqlx::query_as::<_, Preference>(&sql)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    // 排程时一次取出所有成员的偏好
    pub async fn find_for_members(
        pool: &PgPool,
        member_ids: &[String],
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!("SELECT {PREFERENCE_COLUMNS} FROM preferences WHERE user_id = ANY($1)");
        sqlx::query_as::<_, Preference>(&sql)
            .bind(member_ids)
            .fetch_all(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_fills_defaults() {
        let pref = SavePreferenceRequest::default().normalize();
        assert_eq!(pref.activity, "study");
        assert_eq!(pref.vibe, "balanced");
        assert_eq!(pref.social_style, "casual");
        assert_eq!(pref.indoor_outdoor, "both");
        assert_eq!(pref.sustainability, "low");
        assert!(pref.availability_days.is_empty());
    }

    #[test]
    fn activity_falls_back_to_first_listed() {
        let pref = SavePreferenceRequest {
            activities: Some(vec!["".into(), "hiking".into(), "coffee".into()]),
            ..Default::default()
        }
        .normalize();
        assert_eq!(pref.activity, "hiking");
        assert_eq!(pref.activities, vec!["hiking".to_string(), "coffee".to_string()]);
    }

    #[test]
    fn energy_level_backfills_vibe() {
        let pref = SavePreferenceRequest {
            energy_level: Some("chill".into()),
            ..Default::default()
        }
        .normalize();
        assert_eq!(pref.vibe, "chill");
    }

    #[test]
    fn blank_availability_tokens_dropped() {
        let pref = SavePreferenceRequest {
            availability_days: Some(vec!["Monday".into(), " ".into()]),
            availability_times: Some(vec!["".into()]),
            ..Default::default()
        }
        .normalize();
        assert_eq!(pref.availability_days, vec!["Monday".to_string()]);
        assert!(pref.availability_times.is_empty());
    }
}
