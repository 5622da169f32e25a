use axum::{
    extract::{Query, State},
    http::header::SET_COOKIE,
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{error, instrument, warn};

use crate::{
    auth::{
        gate::{AuthUser, MaybeUser},
        session,
    },
    error::AppError,
    state::AppState,
    users::{
        dto::{RegisterForm, UpdateAction, UpdateForm},
        services,
    },
    views,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", get(register_page))
        .route("/create-user", post(create_user))
        .route("/profile", get(profile))
        .route("/update-user", post(update_user))
        .route("/list", get(list_users))
}

#[derive(Debug, Deserialize)]
pub struct ErrorQuery {
    pub error: Option<String>,
}

#[instrument(skip_all)]
pub async fn register_page(MaybeUser(user): MaybeUser, Query(q): Query<ErrorQuery>) -> Response {
    if user.is_some() {
        return Redirect::to("/profile").into_response();
    }
    Html(views::register_page(q.error.as_deref())).into_response()
}

#[instrument(skip(state, form))]
pub async fn create_user(State(state): State<AppState>, Form(form): Form<RegisterForm>) -> Redirect {
    match services::register_user(state.users.as_ref(), form).await {
        Ok(_) => Redirect::to("/?registered=true"),
        Err(AppError::DuplicateEmail) => {
            warn!("email already registered");
            Redirect::to("/register?error=duplicate")
        }
        Err(AppError::Validation(msg)) => {
            warn!(reason = %msg, "registration rejected");
            Redirect::to("/register?error=invalid")
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            Redirect::to("/register?error=server")
        }
    }
}

#[instrument(skip_all)]
pub async fn profile(
    State(state): State<AppState>,
    MaybeUser(identity): MaybeUser,
    session: Session,
    Query(q): Query<ErrorQuery>,
) -> Result<Response, AppError> {
    let Some(identity) = identity else {
        return Ok(Redirect::to("/").into_response());
    };

    match state.users.find_by_id(identity.id).await? {
        Some(user) => Ok(Html(views::profile_page(&user, q.error.as_deref())).into_response()),
        None => {
            warn!(user_id = identity.id, "session refers to a missing user");
            sign_out(&session).await
        }
    }
}

#[instrument(skip_all, fields(user_id = identity.id))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    session: Session,
    Form(form): Form<UpdateForm>,
) -> Result<Response, AppError> {
    match form.action()? {
        UpdateAction::Update => {
            let changes = form.changes()?;
            match services::update_user(state.users.as_ref(), identity.id, changes).await {
                Ok(user) => {
                    session::refresh_email(&session, &user.email).await?;
                    Ok(Redirect::to("/profile").into_response())
                }
                Err(AppError::DuplicateEmail) => {
                    Ok(Redirect::to("/profile?error=duplicate").into_response())
                }
                Err(AppError::NotFound) => sign_out(&session).await,
                Err(e) => Err(e),
            }
        }
        UpdateAction::Delete => {
            services::delete_user(state.users.as_ref(), identity.id).await?;
            sign_out(&session).await
        }
    }
}

#[instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    MaybeUser(identity): MaybeUser,
) -> Result<Html<String>, AppError> {
    let users = state.users.list_with_positive_quantity().await?;
    Ok(Html(views::list_page(&users, identity.is_some())))
}

async fn sign_out(session: &Session) -> Result<Response, AppError> {
    let removal = session::end(session).await?;
    Ok((
        AppendHeaders([(SET_COOKIE, removal.to_string())]),
        Redirect::to("/"),
    )
        .into_response())
}
