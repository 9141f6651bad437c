use serde::Serialize;

use crate::{
    AppState,
    error::AppError,
    routes::group::model::{Group, GroupStatus, QUORUM},
    routes::preference::model::Preference,
    routes::swipe::model::Swipe,
};

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub message: &'static str,
    pub group: Group,
    pub match_found: bool,
}

// 凑够两人就算匹配成功
fn match_found(group: &Group) -> bool {
    group.members.len() >= 2
}

/// 滚动匹配入口：
/// 1. 已有未结束的分组直接返回（幂等）
/// 2. 原子加入最早建立的同活动开放分组
/// 3. 没有就新建分组，顺带从最近点赞的地点回填活动地点
/// 加入后达到人数门槛则尝试排程，排程失败不影响加入结果。
pub async fn request_match(state: &AppState, user_id: &str) -> Result<MatchResponse, AppError> {
    let pref = Preference::find_by_user(&state.pool, user_id)
        .await?
        .ok_or(AppError::PreferenceMissing)?;

    if let Some(group) = Group::find_active_for_user(&state.pool, user_id).await? {
        return Ok(MatchResponse {
            message: "Already in group",
            match_found: match_found(&group),
            group,
        });
    }

    if let Some(group) = Group::try_join(&state.pool, &state.redis, user_id, &pref).await? {
        let group = if group.members.len() >= QUORUM && group.status == GroupStatus::Forming {
            match Group::try_schedule_if_due(&state.pool, &state.redis, &group).await {
                Ok(Some(scheduled)) => scheduled,
                Ok(None) => group,
                // 排程读偏好失败时加入仍然成立，分组保持 forming
                Err(e) => {
                    tracing::warn!("scheduling after join failed for {}: {}", group.group_id, e);
                    group
                }
            }
        } else {
            group
        };

        return Ok(MatchResponse {
            message: "Joined existing group",
            match_found: match_found(&group),
            group,
        });
    }

    // 回填地点只是锦上添花，查不到就留空
    let location = match Swipe::latest_liked_location(&state.pool, user_id).await {
        Ok(loc) => loc.map(|l| (l.location_id, l.name)),
        Err(e) => {
            tracing::warn!("location backfill failed for {}: {}", user_id, e);
            None
        }
    };

    let group = Group::create(&state.pool, &state.redis, user_id, &pref, location).await?;
    Ok(MatchResponse {
        message: "Group created",
        match_found: false,
        group,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn group_with_members(members: &[&str]) -> Group {
        Group {
            group_id: "g1".into(),
            members: members.iter().map(|m| m.to_string()).collect(),
            activity: "study".into(),
            vibe: String::new(),
            availability_days: vec![],
            availability_times: vec![],
            event_time: None,
            location_id: None,
            location_name: String::new(),
            status: GroupStatus::Forming,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn solo_group_is_not_a_match() {
        assert!(!match_found(&group_with_members(&["a"])));
    }

    #[test]
    fn two_members_count_as_match() {
        assert!(match_found(&group_with_members(&["a", "b"])));
        assert!(match_found(&group_with_members(&["a", "b", "c"])));
    }
}
