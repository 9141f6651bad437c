//! 需要本地 Postgres 与 Redis 的端到端测试，默认忽略。
//! 运行方式：
//!   DATABASE_URL=... REDIS_URL=... cargo test --test match_flow -- --ignored

use std::sync::Arc;

use backend::{
    AppState,
    config::Config,
    routes::group::model::{Group, GroupStatus, LeaveOutcome},
    routes::matchmaking::model::request_match,
    routes::preference::model::{NormalizedPreference, Preference},
};
use chrono::{Datelike, Timelike, Weekday};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

fn test_config(database_url: String, redis_url: String) -> Config {
    Config {
        database_url,
        redis_url,
        jwt_secret: "test-secret".into(),
        jwt_expiration_secs: 3600,
        temp_token_expiration_secs: 3600,
        rate_limit_window_secs: 60,
        rate_limit_requests: 10_000,
        server_host: "::".into(),
        server_port: 0,
        api_base_uri: "/api".into(),
    }
}

async fn test_state() -> AppState {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let redis_url = std::env::var("REDIS_URL").expect("REDIS_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("connect postgres");

    sqlx::migrate!().run(&pool).await.expect("run migrations");

    let redis = Arc::new(redis::Client::open(redis_url.clone()).expect("redis client"));

    AppState {
        pool,
        config: test_config(database_url, redis_url),
        redis,
    }
}

async fn save_pref(
    state: &AppState,
    user_id: &str,
    activity: &str,
    vibe: &str,
    days: &[&str],
    times: &[&str],
) {
    let pref = NormalizedPreference {
        activity: activity.to_string(),
        activities: vec![],
        vibe: vibe.to_string(),
        social_style: "casual".into(),
        indoor_outdoor: "both".into(),
        sustainability: "low".into(),
        availability_days: days.iter().map(|d| d.to_string()).collect(),
        availability_times: times.iter().map(|t| t.to_string()).collect(),
    };
    Preference::upsert(&state.pool, user_id, pref)
        .await
        .expect("save preference");
}

fn fresh_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

#[tokio::test]
#[ignore = "requires a running Postgres and Redis"]
async fn rolling_match_end_to_end() {
    let state = test_state().await;
    // 每次运行用独立的活动名，避免跟旧数据互相匹配
    let activity = fresh_id("study");

    let a = fresh_id("user_a");
    let b = fresh_id("user_b");
    let c = fresh_id("user_c");

    save_pref(&state, &a, &activity, "", &[], &[]).await;
    save_pref(&state, &b, &activity, "", &[], &[]).await;
    save_pref(&state, &c, &activity, "", &["Wednesday"], &["Evening"]).await;

    // A 建组
    let first = request_match(&state, &a).await.unwrap();
    assert_eq!(first.group.members, vec![a.clone()]);
    assert_eq!(first.group.status, GroupStatus::Forming);
    assert!(!first.match_found);

    // 重复请求幂等
    let again = request_match(&state, &a).await.unwrap();
    assert_eq!(again.group.group_id, first.group.group_id);
    assert_eq!(again.group.members.len(), 1);

    // B 加入
    let second = request_match(&state, &b).await.unwrap();
    assert_eq!(second.group.group_id, first.group.group_id);
    assert_eq!(second.group.members, vec![a.clone(), b.clone()]);
    assert!(second.match_found);
    assert_eq!(second.group.status, GroupStatus::Forming);

    // C 加入后达到门槛，交集为周三晚上
    let third = request_match(&state, &c).await.unwrap();
    assert_eq!(third.group.group_id, first.group.group_id);
    assert_eq!(third.group.members.len(), 3);
    assert_eq!(third.group.status, GroupStatus::Scheduled);

    let event = third.group.event_time.expect("event time set");
    assert_eq!(event.weekday(), Weekday::Wed);
    assert_eq!((event.hour(), event.minute()), (18, 0));
}

#[tokio::test]
#[ignore = "requires a running Postgres and Redis"]
async fn disjoint_availability_stays_forming() {
    let state = test_state().await;
    let activity = fresh_id("hiking");

    let users: Vec<String> = (0..3).map(|i| fresh_id(&format!("user{}", i))).collect();
    let days = [&["Monday"][..], &["Tuesday"][..], &["Wednesday"][..]];

    for (user, day) in users.iter().zip(days) {
        save_pref(&state, user, &activity, "", day, &[]).await;
    }

    let mut last = None;
    for user in &users {
        last = Some(request_match(&state, user).await.unwrap());
    }

    // 人数够了但没有共同时段，保持 forming 且没有活动时间
    let group = last.unwrap().group;
    assert_eq!(group.members.len(), 3);
    assert_eq!(group.status, GroupStatus::Forming);
    assert!(group.event_time.is_none());
}

#[tokio::test]
#[ignore = "requires a running Postgres and Redis"]
async fn concurrent_matching_preserves_invariants() {
    let state = test_state().await;
    let activity = fresh_id("climbing");

    let users: Vec<String> = (0..9).map(|i| fresh_id(&format!("cc{}", i))).collect();
    for user in &users {
        save_pref(&state, user, &activity, "", &[], &[]).await;
    }

    let mut handles = Vec::new();
    for user in users.clone() {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            request_match(&state, &user).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let groups: Vec<Group> = sqlx::query_as(
        "SELECT group_id, members, activity, vibe, availability_days, availability_times, \
         event_time, location_id, location_name, status, created_at \
         FROM groups WHERE activity = $1",
    )
    .bind(&activity)
    .fetch_all(&state.pool)
    .await
    .unwrap();

    let mut seen = std::collections::HashSet::new();
    let mut total = 0;
    for group in &groups {
        assert!(!group.members.is_empty());
        assert!(group.members.len() <= 4);
        for member in &group.members {
            // 没有用户同时出现在两个分组
            assert!(seen.insert(member.clone()), "duplicate member {}", member);
        }
        total += group.members.len();
    }
    assert_eq!(total, users.len());
}

#[tokio::test]
#[ignore = "requires a running Postgres and Redis"]
async fn leaving_last_member_deletes_group() {
    let state = test_state().await;
    let activity = fresh_id("solo");
    let user = fresh_id("loner");

    save_pref(&state, &user, &activity, "", &[], &[]).await;
    let outcome = request_match(&state, &user).await.unwrap();
    let group_id = outcome.group.group_id;

    let left = Group::leave(&state.pool, &state.redis, &group_id, &user)
        .await
        .unwrap();
    assert!(matches!(left, Some(LeaveOutcome::Deleted)));

    let gone = Group::find_by_id(&state.pool, &state.redis, &group_id)
        .await
        .unwrap();
    assert!(gone.is_none());
}

#[tokio::test]
#[ignore = "requires a running Postgres and Redis"]
async fn vibe_is_first_writer_wins() {
    let state = test_state().await;
    let activity = fresh_id("coffee");

    let a = fresh_id("calm");
    let b = fresh_id("loud");
    save_pref(&state, &a, &activity, "chill", &[], &[]).await;
    save_pref(&state, &b, &activity, "chill", &[], &[]).await;

    let first = request_match(&state, &a).await.unwrap();
    assert_eq!(first.group.vibe, "chill");

    // 不同气质的用户进不来
    let c = fresh_id("other");
    save_pref(&state, &c, &activity, "active", &[], &[]).await;
    let other = request_match(&state, &c).await.unwrap();
    assert_ne!(other.group.group_id, first.group.group_id);

    // 相同气质的正常加入且不覆盖
    let second = request_match(&state, &b).await.unwrap();
    assert_eq!(second.group.group_id, first.group.group_id);
    assert_eq!(second.group.vibe, "chill");
}
