use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use kinboard_shared::api::{
    AssignmentDto, ChoreDto, CompletionDto, CreateChoreReq, ReviewCompletionReq,
    ReviewCompletionResp, SubmitCompletionReq,
};

use super::auth::{AuthCtx, user_dto};
use super::{AppError, AppState, rfc3339};
use crate::storage::models::ChoreCompletion;
use crate::storage::{
    AssignmentDetail, ChoreDetail, ChoreDraft, CompletionDraft, CreateChoreOutcome, ReviewOutcome,
    codec,
};

pub async fn api_list_chores(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<Vec<ChoreDto>>, AppError> {
    let rows = state
        .store
        .list_chores(&auth.claims.family_id)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(rows.into_iter().map(chore_dto).collect()))
}

/// Persists the chore and its per-assignee pending assignments in one
/// all-or-nothing transaction.
pub async fn api_create_chore(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<CreateChoreReq>,
) -> Result<(StatusCode, Json<ChoreDto>), AppError> {
    if body.title.trim().is_empty() {
        return Err(AppError::bad_request("Title is required"));
    }
    if body.points <= 0 {
        return Err(AppError::bad_request("Points must be positive"));
    }

    let mut seen = std::collections::HashSet::new();
    let assignees: Vec<String> = body
        .assignees
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect();

    let draft = ChoreDraft {
        title: body.title,
        description: body.description.unwrap_or_default(),
        points: body.points,
        schedule: body.schedule,
        difficulty: body.difficulty.as_str().to_string(),
        photos: body.photos,
    };

    let outcome = state
        .store
        .create_chore(&auth.claims.family_id, draft, assignees)
        .await
        .map_err(AppError::internal)?;
    let chore = match outcome {
        CreateChoreOutcome::AssigneeNotFound => {
            return Err(AppError::not_found("Assignee not found"));
        }
        CreateChoreOutcome::Created(chore) => chore,
    };

    let detail = state
        .store
        .chore_detail(&chore.id, &auth.claims.family_id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::internal("created chore vanished"))?;
    Ok((StatusCode::CREATED, Json(chore_dto(detail))))
}

pub async fn api_chore_detail(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<Json<ChoreDto>, AppError> {
    let detail = state
        .store
        .chore_detail(&id, &auth.claims.family_id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found("Chore not found"))?;
    Ok(Json(chore_dto(detail)))
}

/// A member may only submit completions for their own assignment; the
/// assignment is looked up by (chore, caller) and its absence is a 404.
pub async fn api_submit_completion(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
    Json(body): Json<SubmitCompletionReq>,
) -> Result<(StatusCode, Json<CompletionDto>), AppError> {
    let draft = CompletionDraft {
        before_photos: body.before_photos,
        after_photos: body.after_photos,
        notes: body.notes,
        time_spent: body.time_spent,
    };
    let completion = state
        .store
        .submit_completion(&id, &auth.claims.sub, draft)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found("Assignment not found"))?;
    Ok((StatusCode::CREATED, Json(completion_dto(completion))))
}

/// Parent-only (enforced by the capability gate). Reviewing is one-shot:
/// a completion that already left `pending` is refused with a conflict so
/// points cannot be awarded twice.
pub async fn api_review_completion(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(_chore_id): Path<String>,
    Json(body): Json<ReviewCompletionReq>,
) -> Result<Json<ReviewCompletionResp>, AppError> {
    let Some(completion_id) = body.completion_id.filter(|s| !s.trim().is_empty()) else {
        return Err(AppError::bad_request("Completion ID required"));
    };

    let outcome = state
        .store
        .review_completion(&completion_id, &auth.claims.family_id, body.approved)
        .await
        .map_err(AppError::internal)?;
    match outcome {
        ReviewOutcome::NotFound => Err(AppError::not_found("Completion not found")),
        ReviewOutcome::AlreadyReviewed => Err(AppError::conflict("Completion already reviewed")),
        ReviewOutcome::Reviewed { status } => Ok(Json(ReviewCompletionResp {
            success: true,
            status: status.as_str().to_string(),
        })),
    }
}

fn chore_dto(detail: ChoreDetail) -> ChoreDto {
    let assignments = detail.assignments.into_iter().map(assignment_dto).collect();
    let chore = detail.chore;
    ChoreDto {
        id: chore.id,
        family_id: chore.family_id,
        title: chore.title,
        description: chore.description,
        points: chore.points,
        schedule: codec::value_or_raw(&chore.schedule),
        difficulty: chore.difficulty,
        photos: codec::value_or_raw(&chore.photos),
        is_active: chore.is_active,
        created_at: rfc3339(chore.created_at),
        assignments,
    }
}

fn assignment_dto(detail: AssignmentDetail) -> AssignmentDto {
    let assignment = detail.assignment;
    AssignmentDto {
        id: assignment.id,
        chore_id: assignment.chore_id,
        user_id: assignment.user_id,
        status: assignment.status,
        due_date: assignment.due_date.map(rfc3339),
        user: user_dto(detail.user),
        completions: detail.completions.into_iter().map(completion_dto).collect(),
    }
}

fn completion_dto(completion: ChoreCompletion) -> CompletionDto {
    CompletionDto {
        id: completion.id,
        assignment_id: completion.assignment_id,
        user_id: completion.user_id,
        status: completion.status,
        before_photos: codec::value_or_raw(&completion.before_photos),
        after_photos: codec::value_or_raw(&completion.after_photos),
        notes: completion.notes,
        time_spent: completion.time_spent,
        submitted_at: rfc3339(completion.submitted_at),
        approved_at: completion.approved_at.map(rfc3339),
    }
}
