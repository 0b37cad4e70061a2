use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use kinboard_shared::api::{CreateRewardReq, RedemptionDto, RewardDto};

use super::auth::AuthCtx;
use super::{AppError, AppState, rfc3339};
use crate::storage::models::{Reward, RewardRedemption};
use crate::storage::{RedeemOutcome, RewardDraft, codec};

pub async fn api_list_rewards(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<Vec<RewardDto>>, AppError> {
    let rows = state
        .store
        .list_active_rewards(&auth.claims.family_id)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(rows.into_iter().map(reward_dto).collect()))
}

/// Parent-only (enforced by the capability gate).
pub async fn api_create_reward(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<CreateRewardReq>,
) -> Result<(StatusCode, Json<RewardDto>), AppError> {
    let (Some(title), Some(point_cost)) = (
        body.title.filter(|s| !s.trim().is_empty()),
        body.point_cost,
    ) else {
        return Err(AppError::bad_request("Title and point cost are required"));
    };
    if point_cost <= 0 {
        return Err(AppError::bad_request("Point cost must be positive"));
    }
    if matches!(body.stock, Some(stock) if stock < 0) {
        return Err(AppError::bad_request("Stock must not be negative"));
    }

    let reward = state
        .store
        .create_reward(
            &auth.claims.family_id,
            RewardDraft {
                title,
                description: body.description.unwrap_or_default(),
                point_cost,
                photos: body.photos,
                stock: body.stock,
            },
        )
        .await
        .map_err(AppError::internal)?;
    Ok((StatusCode::CREATED, Json(reward_dto(reward))))
}

/// Deducts the caller's points and the reward's stock atomically; losing a
/// race for the last unit fails cleanly with a conflict and no state change.
pub async fn api_redeem_reward(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<Json<RedemptionDto>, AppError> {
    let outcome = state
        .store
        .redeem_reward(&id, &auth.claims.sub, &auth.claims.family_id)
        .await
        .map_err(AppError::internal)?;
    match outcome {
        RedeemOutcome::RewardNotFound => Err(AppError::not_found("Reward not found")),
        RedeemOutcome::UserNotFound => Err(AppError::not_found("User not found")),
        RedeemOutcome::OutOfStock => Err(AppError::conflict("Out of stock")),
        RedeemOutcome::InsufficientPoints => Err(AppError::conflict("Insufficient points")),
        RedeemOutcome::Redeemed(redemption) => Ok(Json(redemption_dto(redemption))),
    }
}

fn reward_dto(reward: Reward) -> RewardDto {
    RewardDto {
        id: reward.id,
        family_id: reward.family_id,
        title: reward.title,
        description: reward.description,
        point_cost: reward.point_cost,
        photos: codec::value_or_raw(&reward.photos),
        stock: reward.stock,
        is_active: reward.is_active,
        created_at: rfc3339(reward.created_at),
    }
}

fn redemption_dto(redemption: RewardRedemption) -> RedemptionDto {
    RedemptionDto {
        id: redemption.id,
        reward_id: redemption.reward_id,
        user_id: redemption.user_id,
        status: redemption.status,
        created_at: rfc3339(redemption.created_at),
    }
}
