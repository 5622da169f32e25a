use axum::{
    extract::{FromRef, Query, State},
    http::header::SET_COOKIE,
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginForm, SessionUser},
        gate::MaybeUser,
        jwt::JwtKeys,
        password::verify_password,
        session,
    },
    error::AppError,
    state::AppState,
    users::{dto::normalize_email, repo_types::User},
    views,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(login_page))
        .route("/login", post(login))
        .route("/logout", get(logout))
}

#[derive(Debug, Deserialize)]
pub struct LoginPageQuery {
    pub registered: Option<String>,
    #[serde(rename = "loginFailed")]
    pub login_failed: Option<String>,
}

/// Query flags arrive as `true`, `True` or `1`.
pub(crate) fn flag(value: &Option<String>) -> bool {
    value
        .as_deref()
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1"))
        .unwrap_or(false)
}

#[instrument(skip_all)]
pub async fn login_page(MaybeUser(user): MaybeUser, Query(q): Query<LoginPageQuery>) -> Response {
    if user.is_some() {
        return Redirect::to("/profile").into_response();
    }
    Html(views::login_page(flag(&q.registered), flag(&q.login_failed))).into_response()
}

#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let user = match authenticate(&state, form).await {
        Ok(u) => u,
        Err(AppError::InvalidCredentials) => {
            return Ok(Redirect::to("/?loginFailed=true").into_response());
        }
        Err(e) => {
            error!(error = %e, "login failed");
            return Err(e);
        }
    };

    let keys = JwtKeys::from_ref(&state);
    let identity = SessionUser {
        id: user.id,
        email: user.email.clone(),
    };
    let cookie = session::start(&session, &keys, identity, state.config.session.cookie_secure).await?;

    info!(user_id = user.id, email = %user.email, "user logged in");
    Ok((
        AppendHeaders([(SET_COOKIE, cookie.to_string())]),
        Redirect::to("/profile"),
    )
        .into_response())
}

/// Unknown email and wrong password are indistinguishable to the caller.
async fn authenticate(state: &AppState, form: LoginForm) -> Result<User, AppError> {
    let email = normalize_email(form.username.as_deref().unwrap_or_default());
    let password = form.password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        warn!("login with missing credentials");
        return Err(AppError::InvalidCredentials);
    }

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(&password, &user.hashed_password) {
        warn!(email = %email, user_id = user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }
    Ok(user)
}

#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<Response, AppError> {
    let removal = session::end(&session).await?;
    info!("user logged out");
    Ok((
        AppendHeaders([(SET_COOKIE, removal.to_string())]),
        Redirect::to("/"),
    )
        .into_response())
}
