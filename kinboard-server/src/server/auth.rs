use axum::extract::State;
use axum::http::{Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;
use axum::{Extension, Json};
use chrono::{Duration, Utc};
use kinboard_shared::api::{
    FamilyDto, LoginReq, LoginResp, MeResp, RefreshReq, RefreshResp, RegisterFamilyReq,
    RegisterFamilyResp, RegisterMemberReq, UserDto,
};
use kinboard_shared::auth::Role;
use kinboard_shared::jwt::{self, AccessClaims, RefreshClaims};
use rand::Rng;
use std::str::FromStr;
use tracing::warn;

use super::{AppError, AppState, rfc3339};
use crate::storage::codec;
use crate::storage::models::{Family, User};

/// Access tokens are short-lived; clients rotate them through the refresh
/// endpoint.
const ACCESS_TOKEN_TTL_HOURS: i64 = 1;
/// Refresh tokens bound how long a session can survive without re-entering
/// the family PIN.
const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

const FAMILY_CODE_LEN: usize = 6;
const FAMILY_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const DEFAULT_PARENT_AVATAR: &str = "\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}\u{200D}\u{1F466}";
const DEFAULT_MEMBER_AVATAR: &str = "\u{1F464}";

#[derive(Clone, Debug)]
pub struct AuthCtx {
    pub claims: AccessClaims,
}

/// Bearer-token gate for every protected route. A missing header is
/// `401 Unauthorized`; a present but invalid or expired token is
/// `403 Forbidden`.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let header_val = match req.headers().get(header::AUTHORIZATION) {
        Some(v) => v,
        None => return Err(AppError::unauthorized()),
    };
    let header_str = header_val.to_str().map_err(|_| AppError::unauthorized())?;
    let prefix = "Bearer ";
    if !header_str.starts_with(prefix) {
        return Err(AppError::unauthorized());
    }
    let token = &header_str[prefix.len()..];

    let claims: AccessClaims =
        match jwt::decode_and_verify(token, state.config.jwt_secret.as_bytes()) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "auth: access token rejected");
                return Err(AppError::forbidden());
            }
        };

    req.extensions_mut().insert(AuthCtx { claims });
    Ok(next.run(req).await)
}

pub async fn api_auth_register(
    State(state): State<AppState>,
    Json(body): Json<RegisterFamilyReq>,
) -> Result<(StatusCode, Json<RegisterFamilyResp>), AppError> {
    let (Some(family_name), Some(pin), Some(parent_name)) = (
        non_empty(body.family_name),
        non_empty(body.pin),
        non_empty(body.parent_name),
    ) else {
        return Err(AppError::bad_request("Missing required fields"));
    };

    let cost = state.config.bcrypt_cost.unwrap_or(bcrypt::DEFAULT_COST);
    let pin_hash = bcrypt::hash(&pin, cost).map_err(AppError::internal)?;
    let code = unique_family_code(&state).await?;

    let (family, parent) = state
        .store
        .create_family_with_parent(
            &family_name,
            &code,
            &pin_hash,
            &parent_name,
            DEFAULT_PARENT_AVATAR,
        )
        .await
        .map_err(AppError::internal)?;

    let (token, refresh_token) = issue_token_pair(&state, &parent)?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterFamilyResp {
            token,
            refresh_token,
            family: family_dto(family, None),
            user: user_dto(parent),
        }),
    ))
}

pub async fn api_auth_login(
    State(state): State<AppState>,
    Json(body): Json<LoginReq>,
) -> Result<Json<LoginResp>, AppError> {
    let (Some(family_code), Some(pin)) = (non_empty(body.family_code), non_empty(body.pin)) else {
        return Err(AppError::bad_request("Missing family code or PIN"));
    };

    // Codes are stored uppercase; comparison is case-insensitive.
    let family = state
        .store
        .family_by_code(&family_code.to_uppercase())
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| {
            warn!(family_code = %family_code, "login: unknown family code");
            AppError::unauthorized()
        })?;

    if !bcrypt::verify(&pin, &family.pin_hash).map_err(|e| {
        tracing::error!(error = %e, "login: bcrypt verify failed");
        AppError::internal(e)
    })? {
        warn!(family_id = %family.id, "login: invalid PIN");
        return Err(AppError::unauthorized());
    }

    let members = state
        .store
        .list_members(&family.id)
        .await
        .map_err(AppError::internal)?;

    // Tokens are only minted once a concrete member has been selected; a
    // family-only login gets the member list and nothing more.
    let Some(user_id) = body.user_id else {
        let members = members.into_iter().map(user_dto).collect();
        return Ok(Json(LoginResp {
            token: None,
            refresh_token: None,
            family: family_dto(family, Some(members)),
            user: None,
        }));
    };

    let user = state
        .store
        .user_in_family(&user_id, &family.id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let (token, refresh_token) = issue_token_pair(&state, &user)?;
    let members = members.into_iter().map(user_dto).collect();
    Ok(Json(LoginResp {
        token: Some(token),
        refresh_token: Some(refresh_token),
        family: family_dto(family, Some(members)),
        user: Some(user_dto(user)),
    }))
}

pub async fn api_auth_refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshReq>,
) -> Result<Json<RefreshResp>, AppError> {
    let Some(refresh_token) = non_empty(body.refresh_token) else {
        return Err(AppError::unauthorized());
    };

    let claims: RefreshClaims =
        jwt::decode_and_verify(&refresh_token, state.config.refresh_secret.as_bytes()).map_err(
            |e| {
                warn!(error = %e, "refresh: token rejected");
                AppError::forbidden()
            },
        )?;

    // The refresh token deliberately carries no role; re-derive it from the
    // stored user so a role change invalidates old capabilities.
    let user = state
        .store
        .user_in_family(&claims.sub, &claims.family_id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| {
            warn!(user_id = %claims.sub, "refresh: user no longer exists");
            AppError::forbidden()
        })?;

    let token = issue_access_token(&state, &user)?;
    Ok(Json(RefreshResp { token }))
}

pub async fn api_auth_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<MeResp>, AppError> {
    let user = state
        .store
        .user_in_family(&auth.claims.sub, &auth.claims.family_id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let family = state
        .store
        .family_by_id(&auth.claims.family_id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found("Family not found"))?;
    Ok(Json(MeResp {
        user: user_dto(user),
        family: family_dto(family, None),
    }))
}

/// Parent-only (enforced by the capability gate).
pub async fn api_register_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<RegisterMemberReq>,
) -> Result<(StatusCode, Json<UserDto>), AppError> {
    let (Some(name), Some(role)) = (non_empty(body.name), body.role) else {
        return Err(AppError::bad_request("Name and role are required"));
    };
    let avatar = body
        .avatar
        .unwrap_or_else(|| DEFAULT_MEMBER_AVATAR.to_string());
    let user = state
        .store
        .create_member(&auth.claims.family_id, &name, role, &avatar)
        .await
        .map_err(AppError::internal)?;
    Ok((StatusCode::CREATED, Json(user_dto(user))))
}

fn issue_access_token(state: &AppState, user: &User) -> Result<String, AppError> {
    let claims = AccessClaims {
        sub: user.id.clone(),
        family_id: user.family_id.clone(),
        role: role_of(user),
        exp: (Utc::now() + Duration::hours(ACCESS_TOKEN_TTL_HOURS)).timestamp(),
    };
    jwt::encode(&claims, state.config.jwt_secret.as_bytes()).map_err(|e| {
        tracing::error!(user_id = %user.id, error = %e, "jwt encode failed");
        AppError::internal(e)
    })
}

fn issue_token_pair(state: &AppState, user: &User) -> Result<(String, String), AppError> {
    let token = issue_access_token(state, user)?;
    let refresh_claims = RefreshClaims {
        sub: user.id.clone(),
        family_id: user.family_id.clone(),
        exp: (Utc::now() + Duration::days(REFRESH_TOKEN_TTL_DAYS)).timestamp(),
    };
    let refresh_token = jwt::encode(&refresh_claims, state.config.refresh_secret.as_bytes())
        .map_err(|e| {
            tracing::error!(user_id = %user.id, error = %e, "refresh jwt encode failed");
            AppError::internal(e)
        })?;
    Ok((token, refresh_token))
}

async fn unique_family_code(state: &AppState) -> Result<String, AppError> {
    // Collisions are rare at household scale; a bounded retry keeps the
    // uniqueness constraint as the final arbiter.
    for _ in 0..16 {
        let code = generate_family_code();
        if state
            .store
            .family_by_code(&code)
            .await
            .map_err(AppError::internal)?
            .is_none()
        {
            return Ok(code);
        }
    }
    Err(AppError::internal("could not allocate a unique family code"))
}

fn generate_family_code() -> String {
    let mut rng = rand::thread_rng();
    (0..FAMILY_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..FAMILY_CODE_ALPHABET.len());
            FAMILY_CODE_ALPHABET[idx] as char
        })
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// The stored role string is produced by `Role::as_str`, so parse failures
/// only happen on a corrupted row; fall back to the least-privileged role.
pub(crate) fn role_of(user: &User) -> Role {
    Role::from_str(&user.role).unwrap_or_else(|_| {
        warn!(user_id = %user.id, role = %user.role, "unknown stored role; treating as child");
        Role::Child
    })
}

pub(crate) fn user_dto(user: User) -> UserDto {
    let role = role_of(&user);
    let jars = codec::jars_or_default(&user.jars);
    UserDto {
        id: user.id,
        family_id: user.family_id,
        name: user.name,
        role,
        avatar: user.avatar,
        points: user.points,
        streak: user.streak,
        jars,
        created_at: rfc3339(user.created_at),
    }
}

/// The PIN hash stays behind by construction; `FamilyDto` has no field for it.
pub(crate) fn family_dto(family: Family, members: Option<Vec<UserDto>>) -> FamilyDto {
    FamilyDto {
        id: family.id,
        name: family.name,
        family_code: family.family_code,
        members,
    }
}
