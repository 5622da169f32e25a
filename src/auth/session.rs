use tower_sessions::{
    cookie::{Cookie, SameSite},
    Session,
};
use tracing::{debug, warn};

use crate::{
    auth::{dto::SessionUser, jwt::JwtKeys},
    error::AppError,
};

/// Name of the cookie that carries `Bearer <token>`.
pub const AUTH_COOKIE: &str = "Authorization";

const SESSION_USER_KEY: &str = "user";

/// Log `user` in: rotate the session id, remember the identity and hand back
/// the bearer cookie the response must set.
pub async fn start(
    session: &Session,
    keys: &JwtKeys,
    user: SessionUser,
    secure: bool,
) -> Result<Cookie<'static>, AppError> {
    let token = keys.issue(user.id, &user.email)?;
    session.cycle_id().await?;
    session.insert(SESSION_USER_KEY, &user).await?;
    debug!(user_id = user.id, "session started");

    let max_age = time::Duration::seconds(keys.ttl.as_secs() as i64);
    Ok(Cookie::build((AUTH_COOKIE, format!("Bearer {token}")))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build())
}

/// Forget the session and return a cookie that deletes the bearer token.
pub async fn end(session: &Session) -> Result<Cookie<'static>, AppError> {
    session.flush().await?;
    let mut cookie = Cookie::build((AUTH_COOKIE, "")).path("/").http_only(true).build();
    cookie.make_removal();
    Ok(cookie)
}

pub async fn current_user(session: &Session) -> Option<SessionUser> {
    match session.get::<SessionUser>(SESSION_USER_KEY).await {
        Ok(user) => user,
        Err(e) => {
            warn!(error = %e, "failed to read session");
            None
        }
    }
}

/// Keep the session in step with a profile edit.
pub async fn refresh_email(session: &Session, email: &str) -> Result<(), AppError> {
    if let Some(mut user) = current_user(session).await {
        if user.email != email {
            user.email = email.to_string();
            session.insert(SESSION_USER_KEY, &user).await?;
        }
    }
    Ok(())
}
