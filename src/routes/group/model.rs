use std::sync::Arc;

use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Client as RedisClient};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::routes::preference::model::Preference;
use crate::scheduling;

// 分组人数上限与触发排程的最低人数
pub const MAX_MEMBERS: usize = 4;
pub const QUORUM: usize = 3;

// 缓存相关常量
const GROUP_CACHE_EXPIRE: u64 = 600; // 分组缓存过期时间，单位秒
const GROUP_ID_CACHE_PREFIX: &str = "group:id:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "group_status", rename_all = "lowercase")]
pub enum GroupStatus {
    Forming,
    Confirmed,
    Scheduled,
    Completed,
    Cancelled,
}

impl GroupStatus {
    /// 已结束的分组不再参与匹配
    pub fn is_active(self) -> bool {
        matches!(
            self,
            GroupStatus::Forming | GroupStatus::Confirmed | GroupStatus::Scheduled
        )
    }

    // forming → confirmed/scheduled → completed，任意活跃状态可取消
    pub fn can_transition(self, next: GroupStatus) -> bool {
        matches!(
            (self, next),
            (
                GroupStatus::Forming,
                GroupStatus::Confirmed | GroupStatus::Scheduled | GroupStatus::Cancelled
            ) | (
                GroupStatus::Confirmed | GroupStatus::Scheduled,
                GroupStatus::Completed | GroupStatus::Cancelled
            )
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub group_id: String,
    pub members: Vec<String>,
    pub activity: String,
    pub vibe: String,
    pub availability_days: Vec<String>,
    pub availability_times: Vec<String>,
    pub event_time: Option<DateTime<Utc>>,
    pub location_id: Option<String>,
    pub location_name: String,
    pub status: GroupStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SetEventRequest {
    pub group_id: String,
    pub event_time: Option<DateTime<Utc>>,
    pub location_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub group_id: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub group_id: String,
    pub status: GroupStatus,
}

#[derive(Debug, Serialize)]
pub struct GroupMemberInfo {
    pub user_id: String,
    pub nickname: String,
}

#[derive(Debug, Serialize)]
pub struct GroupSummary {
    pub group_id: String,
    pub activity: String,
    pub members: Vec<GroupMemberInfo>,
    pub event_time: Option<DateTime<Utc>>,
    pub location_name: String,
    pub status: GroupStatus,
    pub created_at: DateTime<Utc>,
}

pub enum AddMemberOutcome {
    Added(Group),
    AlreadyMember(Group),
    Full,
}

pub enum LeaveOutcome {
    Left(Group),
    Deleted,
    NotMember(Group),
}

const GROUP_COLUMNS: &str = "group_id, members, activity, vibe, availability_days, \
     availability_times, event_time, location_id, location_name, status, created_at";

impl Group {
    pub async fn create(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        user_id: &str,
        pref: &Preference,
        location: Option<(String, String)>,
    ) -> Result<Self, sqlx::Error> {
        let group_id = Uuid::new_v4().to_string();
        let (location_id, location_name) = match location {
            Some((id, name)) => (Some(id), name),
            None => (None, String::new()),
        };

        let sql = format!(
            r#"
            INSERT INTO groups (
                group_id, members, activity, vibe, availability_days, availability_times,
                location_id, location_name, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'forming', NOW())
            RETURNING {GROUP_COLUMNS}
            "#
        );

        let group = sqlx::query_as::<_, Group>(&sql)
            .bind(&group_id)
            .bind(vec![user_id.to_string()])
            .bind(&pref.activity)
            .bind(&pref.vibe)
            .bind(&pref.availability_days)
            .bind(&pref.availability_times)
            .bind(location_id)
            .bind(location_name)
            .fetch_one(pool)
            .await?;

        invalidate_cache(redis, &group_id).await;
        Ok(group)
    }

    pub async fn find_by_id(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        group_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        // 先查缓存
        let cache_key = format!("{}{}", GROUP_ID_CACHE_PREFIX, group_id);

        if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
            let cached: redis::RedisResult<String> = conn.get(&cache_key).await;

            if let Ok(json_str) = cached {
                if let Ok(group) = serde_json::from_str::<Group>(&json_str) {
                    tracing::debug!("Get group from cache: {}", cache_key);
                    return Ok(Some(group));
                }
            }
        }

        let sql = format!("SELECT {GROUP_COLUMNS} FROM groups WHERE group_id = $1");
        let group = sqlx::query_as::<_, Group>(&sql)
            .bind(group_id)
            .fetch_optional(pool)
            .await?;

        if let Some(ref g) = group {
            if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
                if let Ok(json_str) = serde_json::to_string(g) {
                    let _: Result<(), redis::RedisError> =
                        conn.set_ex(&cache_key, json_str, GROUP_CACHE_EXPIRE).await;
                    tracing::debug!("Set group to cache: {}", cache_key);
                }
            }
        }

        Ok(group)
    }

    // 幂等短路：用户已有未结束的分组时直接返回
    pub async fn find_active_for_user(
        pool: &PgPool,
        user_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {GROUP_COLUMNS} FROM groups
            WHERE $1 = ANY(members) AND status IN ('forming', 'confirmed', 'scheduled')
            ORDER BY created_at
            LIMIT 1
            "#
        );
        sqlx::query_as::<_, Group>(&sql)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    // 列表排序：有活动时间的在前按时间升序，其余按创建时间倒序
    pub async fn list_for_user(pool: &PgPool, user_id: &str) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {GROUP_COLUMNS} FROM groups
            WHERE $1 = ANY(members)
            ORDER BY event_time ASC NULLS LAST, created_at DESC
            "#
        );
        sqlx::query_as::<_, Group>(&sql)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// 滚动匹配的加入步骤。筛选、选最早的候选分组、写入成员，
    /// 全部在一条 UPDATE 语句内完成，容量和去重约束在锁定行上复核，
    /// 并发加入不会超员也不会重复。没有合适分组时返回 None。
    pub async fn try_join(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        user_id: &str,
        pref: &Preference,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE groups g SET
                members = array_append(g.members, $1),
                vibe = CASE WHEN g.vibe = '' THEN $2 ELSE g.vibe END,
                availability_days = CASE
                    WHEN cardinality(g.availability_days) = 0 THEN $3
                    ELSE g.availability_days
                END,
                availability_times = CASE
                    WHEN cardinality(g.availability_times) = 0 THEN $4
                    ELSE g.availability_times
                END
            WHERE g.group_id = (
                SELECT group_id FROM groups
                WHERE activity = $5
                  AND status = 'forming'
                  AND NOT $1 = ANY(members)
                  AND cardinality(members) < $6
                  AND (vibe = '' OR vibe = $2)
                  AND (
                      cardinality(availability_days) = 0
                      OR cardinality($3::text[]) = 0
                      OR availability_days && $3::text[]
                  )
                  AND (
                      cardinality(availability_times) = 0
                      OR cardinality($4::text[]) = 0
                      OR availability_times && $4::text[]
                  )
                ORDER BY created_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
              AND g.status = 'forming'
              AND NOT $1 = ANY(g.members)
              AND cardinality(g.members) < $6
            RETURNING {GROUP_COLUMNS}
            "#
        );

        let group = sqlx::query_as::<_, Group>(&sql)
            .bind(user_id)
            .bind(&pref.vibe)
            .bind(&pref.availability_days)
            .bind(&pref.availability_times)
            .bind(&pref.activity)
            .bind(MAX_MEMBERS as i32)
            .fetch_optional(pool)
            .await?;

        if let Some(ref g) = group {
            invalidate_cache(redis, &g.group_id).await;
        }

        Ok(group)
    }

    /// 达到人数门槛后按成员偏好交集排程，成功切换时返回更新后的分组。
    /// 状态切换用带条件的 UPDATE 再校验一次，避免并发下重复排程；
    /// 没有共同时段时保持 forming，后续加入或列表查询会再试。
    pub async fn try_schedule_if_due(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        group: &Group,
    ) -> Result<Option<Group>, sqlx::Error> {
        if group.status != GroupStatus::Forming || group.members.len() < QUORUM {
            return Ok(None);
        }

        let prefs = Preference::find_for_members(pool, &group.members).await?;
        let day_sets: Vec<Vec<String>> =
            prefs.iter().map(|p| p.availability_days.clone()).collect();
        let time_sets: Vec<Vec<String>> =
            prefs.iter().map(|p| p.availability_times.clone()).collect();

        let resolved = scheduling::resolve(&day_sets, &time_sets, Utc::now());
        let Some(event_time) = resolved.next_event_time else {
            return Ok(None);
        };

        let sql = format!(
            r#"
            UPDATE groups SET status = 'scheduled', event_time = $2
            WHERE group_id = $1 AND status = 'forming' AND cardinality(members) >= $3
            RETURNING {GROUP_COLUMNS}
            "#
        );

        let updated = sqlx::query_as::<_, Group>(&sql)
            .bind(&group.group_id)
            .bind(event_time)
            .bind(QUORUM as i32)
            .fetch_optional(pool)
            .await?;

        if let Some(ref scheduled) = updated {
            invalidate_cache(redis, &scheduled.group_id).await;
            tracing::info!("group {} scheduled for {}", scheduled.group_id, event_time);
        }

        // None: 其他请求已经改过状态，以库里的为准
        Ok(updated)
    }

    // 手动指定活动时间/地点，绕过排程，不改状态
    pub async fn set_event(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        req: &SetEventRequest,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE groups SET
                event_time = COALESCE($2, event_time),
                location_name = COALESCE($3, location_name)
            WHERE group_id = $1
            RETURNING {GROUP_COLUMNS}
            "#
        );

        let group = sqlx::query_as::<_, Group>(&sql)
            .bind(&req.group_id)
            .bind(req.event_time)
            .bind(req.location_name.as_deref().map(str::trim))
            .fetch_optional(pool)
            .await?;

        if group.is_some() {
            invalidate_cache(redis, &req.group_id).await;
        }

        Ok(group)
    }

    // 手动拉人，复用与匹配相同的容量/去重守卫
    pub async fn add_member(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        group_id: &str,
        user_id: &str,
    ) -> Result<Option<AddMemberOutcome>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE groups SET members = array_append(members, $2)
            WHERE group_id = $1
              AND NOT $2 = ANY(members)
              AND cardinality(members) < $3
            RETURNING {GROUP_COLUMNS}
            "#
        );

        let updated = sqlx::query_as::<_, Group>(&sql)
            .bind(group_id)
            .bind(user_id)
            .bind(MAX_MEMBERS as i32)
            .fetch_optional(pool)
            .await?;

        if let Some(group) = updated {
            invalidate_cache(redis, group_id).await;
            return Ok(Some(AddMemberOutcome::Added(group)));
        }

        // 没更新到行：区分重复加入、已满、分组不存在
        match Self::find_by_id(pool, redis, group_id).await? {
            Some(group) if group.members.iter().any(|m| m == user_id) => {
                Ok(Some(AddMemberOutcome::AlreadyMember(group)))
            }
            Some(_) => Ok(Some(AddMemberOutcome::Full)),
            None => Ok(None),
        }
    }

    // 退出分组；清空成员的分组立即删除
    pub async fn leave(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        group_id: &str,
        user_id: &str,
    ) -> Result<Option<LeaveOutcome>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE groups SET members = array_remove(members, $2)
            WHERE group_id = $1 AND $2 = ANY(members)
            RETURNING {GROUP_COLUMNS}
            "#
        );

        let updated = sqlx::query_as::<_, Group>(&sql)
            .bind(group_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

        let outcome = match updated {
            Some(group) if group.members.is_empty() => {
                sqlx::query("DELETE FROM groups WHERE group_id = $1 AND cardinality(members) = 0")
                    .bind(group_id)
                    .execute(pool)
                    .await?;
                Some(LeaveOutcome::Deleted)
            }
            Some(group) => Some(LeaveOutcome::Left(group)),
            None => Self::find_by_id(pool, redis, group_id)
                .await?
                .map(LeaveOutcome::NotMember),
        };

        invalidate_cache(redis, group_id).await;
        Ok(outcome)
    }

    // 带期望旧状态的条件更新，防止并发下状态被覆盖
    pub async fn set_status(
        pool: &PgPool,
        redis: &Arc<RedisClient>,
        group_id: &str,
        from: GroupStatus,
        to: GroupStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE groups SET status = $3
            WHERE group_id = $1 AND status = $2
            RETURNING {GROUP_COLUMNS}
            "#
        );

        let group = sqlx::query_as::<_, Group>(&sql)
            .bind(group_id)
            .bind(from)
            .bind(to)
            .fetch_optional(pool)
            .await?;

        if group.is_some() {
            invalidate_cache(redis, group_id).await;
        }

        Ok(group)
    }
}

async fn invalidate_cache(redis: &Arc<RedisClient>, group_id: &str) {
    if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
        let cache_key = format!("{}{}", GROUP_ID_CACHE_PREFIX, group_id);
        let _: Result<(), redis::RedisError> = conn.del(&cache_key).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forming_can_schedule_or_confirm() {
        assert!(GroupStatus::Forming.can_transition(GroupStatus::Scheduled));
        assert!(GroupStatus::Forming.can_transition(GroupStatus::Confirmed));
        assert!(GroupStatus::Forming.can_transition(GroupStatus::Cancelled));
        assert!(!GroupStatus::Forming.can_transition(GroupStatus::Completed));
    }

    #[test]
    fn scheduled_can_complete_or_cancel() {
        assert!(GroupStatus::Scheduled.can_transition(GroupStatus::Completed));
        assert!(GroupStatus::Scheduled.can_transition(GroupStatus::Cancelled));
        assert!(!GroupStatus::Scheduled.can_transition(GroupStatus::Forming));
    }

    #[test]
    fn terminal_states_are_final() {
        for next in [
            GroupStatus::Forming,
            GroupStatus::Confirmed,
            GroupStatus::Scheduled,
            GroupStatus::Completed,
            GroupStatus::Cancelled,
        ] {
            assert!(!GroupStatus::Completed.can_transition(next));
            assert!(!GroupStatus::Cancelled.can_transition(next));
        }
    }

    #[test]
    fn active_statuses() {
        assert!(GroupStatus::Forming.is_active());
        assert!(GroupStatus::Confirmed.is_active());
        assert!(GroupStatus::Scheduled.is_active());
        assert!(!GroupStatus::Completed.is_active());
        assert!(!GroupStatus::Cancelled.is_active());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&GroupStatus::Forming).unwrap(),
            "\"forming\""
        );
        assert_eq!(
            serde_json::from_str::<GroupStatus>("\"scheduled\"").unwrap(),
            GroupStatus::Scheduled
        );
    }
}
