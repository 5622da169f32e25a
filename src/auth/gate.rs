use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::COOKIE, request::Parts, HeaderMap},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::{cookie::Cookie, Session};
use tracing::debug;

use crate::{
    auth::{
        dto::SessionUser,
        jwt::{Claims, JwtKeys},
        session::{current_user, AUTH_COOKIE},
    },
    state::AppState,
};

/// Token from the `Authorization` cookie, if it uses the Bearer scheme.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    for raw in headers.get_all(COOKIE).iter().filter_map(|v| v.to_str().ok()) {
        for cookie in Cookie::split_parse(raw).flatten() {
            if cookie.name() != AUTH_COOKIE {
                continue;
            }
            let value = cookie.value().trim_matches('"');
            let (scheme, token) = value.split_once(' ').unwrap_or((value, ""));
            let token = token.trim();
            if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }
    None
}

pub fn verified_claims(headers: &HeaderMap, keys: &JwtKeys) -> Option<Claims> {
    let token = bearer_token(headers)?;
    match keys.verify(&token) {
        Ok(claims) => Some(claims),
        Err(e) => {
            debug!(error = %e, "bearer cookie rejected");
            None
        }
    }
}

/// A request is authenticated only when its bearer token verifies.
pub fn is_authenticated(headers: &HeaderMap, keys: &JwtKeys) -> bool {
    verified_claims(headers, keys).is_some()
}

/// Identity of the caller when both the bearer token and the session agree.
pub struct MaybeUser(pub Option<SessionUser>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let Some(claims) = verified_claims(&parts.headers, &keys) else {
            return Ok(MaybeUser(None));
        };
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        let user = current_user(&session)
            .await
            .filter(|u| u.id == claims.user_id);
        Ok(MaybeUser(user))
    }
}

/// Required identity; anonymous callers are sent to the login page.
pub struct AuthUser(pub SessionUser);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match MaybeUser::from_request_parts(parts, state).await? {
            MaybeUser(Some(user)) => Ok(AuthUser(user)),
            MaybeUser(None) => Err(Redirect::to("/").into_response()),
        }
    }
}
