use jsonwebtoken::{self, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::Role;

/// Claims carried by a short-lived access token. `sub` is the acting user's
/// id; a token is only ever issued for a concrete, selected user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub family_id: String,
    pub role: Role,
    pub exp: i64,
}

/// Claims carried by a refresh token. The role is deliberately absent; it is
/// re-derived from storage when a new access token is minted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub family_id: String,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("invalid token: {0}")]
    Decode(String),
    #[error("encoding failed: {0}")]
    Encode(String),
}

pub fn encode<C: Serialize>(claims: &C, secret: &[u8]) -> Result<String, JwtError> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| JwtError::Encode(e.to_string()))
}

pub fn decode_and_verify<C: DeserializeOwned>(token: &str, secret: &[u8]) -> Result<C, JwtError> {
    let key = DecodingKey::from_secret(secret);
    let validation = Validation::new(Algorithm::HS256);
    jsonwebtoken::decode::<C>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| JwtError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn claims_expiring_in(secs: i64) -> AccessClaims {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        AccessClaims {
            sub: "user-1".into(),
            family_id: "family-1".into(),
            role: Role::Parent,
            exp: now + secs,
        }
    }

    #[test]
    fn round_trips_access_claims() {
        let claims = claims_expiring_in(3600);
        let token = encode(&claims, SECRET).unwrap();
        let decoded: AccessClaims = decode_and_verify(&token, SECRET).unwrap();
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.family_id, claims.family_id);
        assert_eq!(decoded.role, Role::Parent);
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = encode(&claims_expiring_in(3600), SECRET).unwrap();
        let res: Result<AccessClaims, _> = decode_and_verify(&token, b"other-secret");
        assert!(res.is_err());
    }

    #[test]
    fn rejects_expired_token() {
        // Past the default decode leeway.
        let token = encode(&claims_expiring_in(-120), SECRET).unwrap();
        let res: Result<AccessClaims, _> = decode_and_verify(&token, SECRET);
        assert!(res.is_err());
    }

    #[test]
    fn refresh_claims_do_not_carry_a_role() {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let claims = RefreshClaims {
            sub: "user-1".into(),
            family_id: "family-1".into(),
            exp: now + 3600,
        };
        let token = encode(&claims, SECRET).unwrap();
        // An access decode must fail: the refresh payload has no role claim.
        let as_access: Result<AccessClaims, _> = decode_and_verify(&token, SECRET);
        assert!(as_access.is_err());
        let back: RefreshClaims = decode_and_verify(&token, SECRET).unwrap();
        assert_eq!(back.sub, "user-1");
    }
}
