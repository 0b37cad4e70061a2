use super::{AppError, AppState, auth::AuthCtx};
use axum::response::Response;
use axum::{
    extract::{OriginalUri, State},
    http::{Method, Request},
    middleware::Next,
};
use kinboard_shared::auth::Role;

/// What a protected operation demands of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Capability {
    /// Any authenticated family member.
    Member,
    /// Parent role required.
    Parent,
}

/// Single authorization gate in front of every protected route. Each
/// operation declares its required capability in one table below; handlers
/// carry no inline role checks.
pub async fn enforce_capability(
    State(_state): State<AppState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|orig| orig.0.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let method = req.method().clone();
    let Some(auth) = req.extensions().get::<AuthCtx>() else {
        return Err(AppError::unauthorized());
    };

    let segs = segmented(&path);
    let required = match required_capability(&method, &segs) {
        Some(capability) => capability,
        None => {
            tracing::warn!(
                method = %method,
                path = %path,
                user_id = %auth.claims.sub,
                "capability gate: no rule for path; denying"
            );
            return Err(AppError::forbidden());
        }
    };

    if required == Capability::Parent && auth.claims.role != Role::Parent {
        tracing::warn!(
            method = %method,
            path = %path,
            user_id = %auth.claims.sub,
            role = ?auth.claims.role,
            "capability gate: parent required"
        );
        return Err(AppError::forbidden());
    }

    Ok(next.run(req).await)
}

/// Declarative capability table for the protected surface. Paths without a
/// rule are refused rather than silently allowed.
fn required_capability(method: &Method, segs: &[&str]) -> Option<Capability> {
    match segs {
        ["api", "auth", "me"] if *method == Method::GET => Some(Capability::Member),
        ["api", "auth", "register-member"] if *method == Method::POST => Some(Capability::Parent),
        ["api", "chores"] if *method == Method::GET || *method == Method::POST => {
            Some(Capability::Member)
        }
        ["api", "chores", _] if *method == Method::GET => Some(Capability::Member),
        ["api", "chores", _, "complete"] if *method == Method::POST => Some(Capability::Member),
        ["api", "chores", _, "approve"] if *method == Method::POST => Some(Capability::Parent),
        ["api", "allowance"] if *method == Method::GET => Some(Capability::Member),
        ["api", "allowance", "distribute"] if *method == Method::POST => Some(Capability::Parent),
        ["api", "rewards"] if *method == Method::GET => Some(Capability::Member),
        ["api", "rewards"] if *method == Method::POST => Some(Capability::Parent),
        ["api", "rewards", _, "redeem"] if *method == Method::POST => Some(Capability::Member),
        ["api", "chat"] if *method == Method::GET || *method == Method::POST => {
            Some(Capability::Member)
        }
        _ => None,
    }
}

fn segmented(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required(method: Method, path: &str) -> Option<Capability> {
        required_capability(&method, &segmented(path))
    }

    #[test]
    fn parent_only_operations() {
        for path in [
            "/api/auth/register-member",
            "/api/allowance/distribute",
            "/api/rewards",
            "/api/chores/abc/approve",
        ] {
            assert_eq!(
                required(Method::POST, path),
                Some(Capability::Parent),
                "{path}"
            );
        }
    }

    #[test]
    fn member_operations() {
        assert_eq!(required(Method::GET, "/api/chores"), Some(Capability::Member));
        assert_eq!(
            required(Method::POST, "/api/chores/abc/complete"),
            Some(Capability::Member)
        );
        assert_eq!(
            required(Method::POST, "/api/rewards/xyz/redeem"),
            Some(Capability::Member)
        );
        assert_eq!(required(Method::GET, "/api/rewards"), Some(Capability::Member));
        assert_eq!(required(Method::POST, "/api/chat"), Some(Capability::Member));
    }

    #[test]
    fn unknown_paths_are_denied() {
        assert_eq!(required(Method::GET, "/api/unknown"), None);
        assert_eq!(required(Method::POST, "/api/chores/abc"), None);
        assert_eq!(required(Method::GET, "/api/allowance/distribute"), None);
    }
}
