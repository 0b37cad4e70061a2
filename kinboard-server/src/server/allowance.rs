use axum::extract::State;
use axum::{Extension, Json};
use kinboard_shared::api::{DistributeReq, DistributeResp, TransactionDto};
use kinboard_shared::auth::Role;

use super::auth::{AuthCtx, user_dto};
use super::{AppError, AppState, rfc3339};
use crate::storage::codec;
use crate::storage::models::{AllowanceTransaction, User};

/// Children see their own ledger; parents see the whole family's.
pub async fn api_list_transactions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<Vec<TransactionDto>>, AppError> {
    let only_user = match auth.claims.role {
        Role::Child => Some(auth.claims.sub.as_str()),
        Role::Parent => None,
    };
    let rows = state
        .store
        .list_transactions(&auth.claims.family_id, only_user)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(
        rows.into_iter()
            .map(|(txn, user)| transaction_dto(txn, Some(user)))
            .collect(),
    ))
}

/// Parent-only (enforced by the capability gate). Deposits `amount` to each
/// target, splitting it across the jars by the given percentages; results
/// come back in the order the targets were given.
pub async fn api_distribute(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<DistributeReq>,
) -> Result<Json<DistributeResp>, AppError> {
    let (Some(amount), Some(split), Some(user_ids)) =
        (body.amount, body.distribution, body.user_ids)
    else {
        return Err(AppError::bad_request("Missing required fields"));
    };
    if !amount.is_positive() {
        return Err(AppError::bad_request("Amount must be positive"));
    }
    if !split.is_valid() {
        return Err(AppError::bad_request(
            "Distribution percentages must sum to 100",
        ));
    }
    if user_ids.is_empty() {
        return Err(AppError::bad_request("At least one target user required"));
    }

    // All targets are validated up front so a typo cannot leave a partial
    // batch behind.
    for target in &user_ids {
        let known = state
            .store
            .user_in_family(target, &auth.claims.family_id)
            .await
            .map_err(AppError::internal)?
            .is_some();
        if !known {
            return Err(AppError::not_found(format!("User not found: {target}")));
        }
    }

    let created = state
        .store
        .distribute_allowance(&auth.claims.family_id, user_ids, amount, split, body.note)
        .await
        .map_err(AppError::internal)?;

    Ok(Json(DistributeResp {
        success: true,
        transactions: created
            .into_iter()
            .map(|txn| transaction_dto(txn, None))
            .collect(),
    }))
}

fn transaction_dto(txn: AllowanceTransaction, user: Option<User>) -> TransactionDto {
    TransactionDto {
        id: txn.id,
        user_id: txn.user_id,
        kind: txn.kind,
        amount: kinboard_shared::domain::Cents(txn.amount_cents),
        jar_distribution: codec::value_or_raw(&txn.jar_distribution),
        source: txn.source,
        note: txn.note,
        created_at: rfc3339(txn.created_at),
        user: user.map(user_dto),
    }
}
