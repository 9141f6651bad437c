use std::collections::HashMap;

use axum::{
    extract::{Extension, Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    AppState,
    error::AppError,
    routes::user::model::User,
    utils::{Claims, success_to_api_response},
};

use super::model::{
    AddMemberOutcome, AddMemberRequest, Group, GroupMemberInfo, GroupStatus, GroupSummary,
    LeaveOutcome, QUORUM, SetEventRequest, SetStatusRequest,
};

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub group_id: String,
}

#[axum::debug_handler]
pub async fn get_user_groups(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let mut groups = Group::list_for_user(&state.pool, &claims.sub).await?;

    // 列表时懒触发一次排程，失败不影响读取
    for group in &mut groups {
        if group.status == GroupStatus::Forming && group.members.len() >= QUORUM {
            match Group::try_schedule_if_due(&state.pool, &state.redis, group).await {
                Ok(Some(scheduled)) => *group = scheduled,
                Ok(None) => {}
                Err(e) => tracing::warn!("lazy scheduling failed for {}: {}", group.group_id, e),
            }
        }
    }

    let summaries = build_summaries(&state, groups).await?;
    Ok((StatusCode::OK, success_to_api_response(summaries)))
}

#[axum::debug_handler]
pub async fn find_by_id(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<impl IntoResponse, AppError> {
    let group = Group::find_by_id(&state.pool, &state.redis, &query.group_id)
        .await?
        .ok_or(AppError::NotFound("group"))?;
    Ok((StatusCode::OK, success_to_api_response(group)))
}

#[axum::debug_handler]
pub async fn set_event(
    State(state): State<AppState>,
    Json(req): Json<SetEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.group_id.trim().is_empty() {
        return Err(AppError::Validation("group_id is required".into()));
    }

    let group = Group::set_event(&state.pool, &state.redis, &req)
        .await?
        .ok_or(AppError::NotFound("group"))?;
    Ok((StatusCode::OK, success_to_api_response(group)))
}

#[axum::debug_handler]
pub async fn leave_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<IdQuery>,
) -> Result<impl IntoResponse, AppError> {
    match Group::leave(&state.pool, &state.redis, &req.group_id, &claims.sub).await? {
        Some(LeaveOutcome::Left(group)) => Ok((
            StatusCode::OK,
            success_to_api_response(serde_json::json!({
                "deleted": false,
                "members": group.members,
            })),
        )),
        Some(LeaveOutcome::Deleted) => Ok((
            StatusCode::OK,
            success_to_api_response(serde_json::json!({
                "deleted": true,
                "members": Vec::<String>::new(),
            })),
        )),
        // 不在分组里视为已经退出，不算失败
        Some(LeaveOutcome::NotMember(group)) => Ok((
            StatusCode::OK,
            success_to_api_response(serde_json::json!({
                "deleted": false,
                "members": group.members,
            })),
        )),
        None => Err(AppError::NotFound("group")),
    }
}

#[axum::debug_handler]
pub async fn add_member(
    State(state): State<AppState>,
    Json(req): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.user_id.trim().is_empty() {
        return Err(AppError::Validation("user_id is required".into()));
    }

    match Group::add_member(&state.pool, &state.redis, &req.group_id, &req.user_id).await? {
        Some(AddMemberOutcome::Added(group)) => {
            Ok((StatusCode::OK, success_to_api_response(group)))
        }
        // 重复加入返回现状，不算失败
        Some(AddMemberOutcome::AlreadyMember(group)) => {
            Ok((StatusCode::OK, success_to_api_response(group)))
        }
        Some(AddMemberOutcome::Full) => Err(AppError::GroupFull),
        None => Err(AppError::NotFound("group")),
    }
}

#[axum::debug_handler]
pub async fn set_status(
    State(state): State<AppState>,
    Json(req): Json<SetStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let group = Group::find_by_id(&state.pool, &state.redis, &req.group_id)
        .await?
        .ok_or(AppError::NotFound("group"))?;

    if group.status == req.status {
        return Ok((StatusCode::OK, success_to_api_response(group)));
    }

    if !group.status.can_transition(req.status) {
        return Err(AppError::Validation(format!(
            "invalid status transition: {:?} -> {:?}",
            group.status, req.status
        )));
    }

    let updated = Group::set_status(&state.pool, &state.redis, &req.group_id, group.status, req.status)
        .await?
        .ok_or_else(|| AppError::Validation("group status changed concurrently".into()))?;

    Ok((StatusCode::OK, success_to_api_response(updated)))
}

// 把成员ID批量换成昵称，注册表里查不到的退回占位名
async fn build_summaries(
    state: &AppState,
    groups: Vec<Group>,
) -> Result<Vec<GroupSummary>, AppError> {
    let mut member_ids: Vec<String> = groups
        .iter()
        .flat_map(|g| g.members.iter().cloned())
        .collect();
    member_ids.sort();
    member_ids.dedup();

    let names: HashMap<String, String> = User::find_nicknames(&state.pool, &member_ids)
        .await?
        .into_iter()
        .collect();

    Ok(groups
        .into_iter()
        .map(|group| GroupSummary {
            members: group
                .members
                .iter()
                .map(|id| GroupMemberInfo {
                    user_id: id.clone(),
                    nickname: names.get(id).cloned().unwrap_or_else(|| "Member".to_string()),
                })
                .collect(),
            group_id: group.group_id,
            activity: group.activity,
            event_time: group.event_time,
            location_name: group.location_name,
            status: group.status,
            created_at: group.created_at,
        })
        .collect())
}
