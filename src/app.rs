use std::net::SocketAddr;

use anyhow::Context;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tower_sessions::{
    cookie::{Key, SameSite},
    Expiry, MemoryStore, SessionManagerLayer,
};

use crate::state::AppState;
use crate::{auth, users};

pub fn build_app(state: AppState) -> anyhow::Result<Router> {
    with_layers(routes(), state)
}

fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(users::router())
        .route("/health", get(|| async { "ok" }))
}

fn with_layers(routes: Router<AppState>, state: AppState) -> anyhow::Result<Router> {
    let key = Key::try_from(state.config.session.secret.as_bytes())
        .context("SESSION_SECRET_KEY must be at least 64 bytes")?;
    let sessions = SessionManagerLayer::new(MemoryStore::default())
        .with_name("oleo_session")
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_secure(state.config.session.cookie_secure)
        .with_expiry(Expiry::OnInactivity(state.config.auth_ttl()))
        .with_signed(key);

    let app = routes
        .with_state(state)
        .layer(sessions)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        );
    Ok(app)
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use axum::{
        body::{to_bytes, Body},
        http::{
            header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
            Request, StatusCode,
        },
        response::Response,
    };
    use tower::ServiceExt;
    use tower_sessions::{cookie::Cookie, Session};

    use super::*;
    use crate::auth::session::current_user;

    /// Echoes the email stored in the server-side session, or "" when anonymous.
    async fn session_email(session: Session) -> String {
        current_user(&session)
            .await
            .map(|u| u.email)
            .unwrap_or_default()
    }

    /// Minimal browser cookie jar.
    #[derive(Default, Clone)]
    struct Jar(BTreeMap<String, String>);

    impl Jar {
        fn absorb(&mut self, res: &Response) {
            for raw in res.headers().get_all(SET_COOKIE) {
                let cookie = Cookie::parse(raw.to_str().unwrap().to_string()).unwrap();
                let removed = cookie.max_age() == Some(time::Duration::ZERO) || cookie.value().is_empty();
                if removed {
                    self.0.remove(cookie.name());
                } else {
                    self.0.insert(cookie.name().to_string(), cookie.value().to_string());
                }
            }
        }

        fn header(&self) -> String {
            self.0
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ")
        }
    }

    struct Client {
        app: Router,
        jar: Jar,
    }

    impl Client {
        fn new(state: AppState) -> Self {
            let routes = routes().route("/session-email", get(session_email));
            Self {
                app: with_layers(routes, state).expect("app builds"),
                jar: Jar::default(),
            }
        }

        async fn session_email(&mut self) -> String {
            body_text(self.get("/session-email").await).await
        }

        async fn send(&mut self, req: axum::http::request::Builder, body: Body) -> Response {
            let req = req.header(COOKIE, self.jar.header()).body(body).unwrap();
            let res = self.app.clone().oneshot(req).await.unwrap();
            self.jar.absorb(&res);
            res
        }

        async fn get(&mut self, uri: &str) -> Response {
            self.send(Request::get(uri), Body::empty()).await
        }

        async fn post_form(&mut self, uri: &str, form: &str) -> Response {
            let req = Request::post(uri).header(CONTENT_TYPE, "application/x-www-form-urlencoded");
            self.send(req, Body::from(form.to_string())).await
        }

        async fn register_ana(&mut self) -> Response {
            self.post_form(
                "/create-user",
                "name=Ana&city=Recife&district=Centro&oil_quantity=5&email=a%40x.com&hashed_password=secret1",
            )
            .await
        }

        async fn login(&mut self, email: &str, password: &str) -> Response {
            let body = format!("username={}&password={password}", email.replace('@', "%40"));
            self.post_form("/login", &body).await
        }
    }

    fn location(res: &Response) -> &str {
        res.headers().get(LOCATION).unwrap().to_str().unwrap()
    }

    fn sets_auth_cookie(res: &Response) -> bool {
        res.headers()
            .get_all(SET_COOKIE)
            .iter()
            .any(|v| v.to_str().unwrap().starts_with("Authorization=Bearer "))
    }

    async fn body_text(res: Response) -> String {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let mut client = Client::new(AppState::fake());
        let res = client.get("/health").await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn register_then_login_sets_cookie_and_session() {
        let mut client = Client::new(AppState::fake());

        let res = client.register_ana().await;
        assert!(res.status().is_redirection());
        assert_eq!(location(&res), "/?registered=true");

        let res = client.login("a@x.com", "secret1").await;
        assert!(res.status().is_redirection());
        assert_eq!(location(&res), "/profile");
        assert!(sets_auth_cookie(&res));
        let cookie = res
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap())
            .find(|v| v.starts_with("Authorization="))
            .unwrap();
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=1800"));
        assert_eq!(client.session_email().await, "a@x.com");

        let res = client.get("/profile").await;
        assert_eq!(res.status(), StatusCode::OK);
        let html = body_text(res).await;
        assert!(html.contains("a@x.com"));
        assert!(html.contains("Ana"));
    }

    #[tokio::test]
    async fn login_page_redirects_authenticated_users() {
        let mut client = Client::new(AppState::fake());
        client.register_ana().await;
        client.login("a@x.com", "secret1").await;

        let res = client.get("/").await;
        assert_eq!(location(&res), "/profile");
        let res = client.get("/register").await;
        assert_eq!(location(&res), "/profile");
    }

    #[tokio::test]
    async fn wrong_password_sets_no_cookie() {
        let mut client = Client::new(AppState::fake());
        client.register_ana().await;

        let res = client.login("a@x.com", "wrong").await;
        assert_eq!(location(&res), "/?loginFailed=true");
        assert!(!sets_auth_cookie(&res));

        let res = client.login("nobody@x.com", "secret1").await;
        assert_eq!(location(&res), "/?loginFailed=true");
        assert!(!sets_auth_cookie(&res));

        let res = client.get("/profile").await;
        assert_eq!(location(&res), "/");
    }

    #[tokio::test]
    async fn duplicate_registration_redirects_with_error() {
        let state = AppState::fake();
        let users = state.users.clone();
        let mut client = Client::new(state);

        client.register_ana().await;
        let res = client.register_ana().await;
        assert_eq!(location(&res), "/register?error=duplicate");

        let listed = users.list_with_positive_quantity().await.unwrap();
        assert_eq!(listed.iter().filter(|u| u.email == "a@x.com").count(), 1);
    }

    #[tokio::test]
    async fn incomplete_registration_redirects_with_error() {
        let mut client = Client::new(AppState::fake());
        let res = client
            .post_form("/create-user", "name=Ana&email=a%40x.com&hashed_password=secret1")
            .await;
        assert_eq!(location(&res), "/register?error=invalid");

        let res = client.get("/register?error=invalid").await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn zero_quantity_drops_user_from_list() {
        let mut client = Client::new(AppState::fake());
        client.register_ana().await;
        client.login("a@x.com", "secret1").await;

        let html = body_text(client.get("/list").await).await;
        assert!(html.contains("a@x.com"));

        let res = client
            .post_form("/update-user", "action=update&oil_quantity=0")
            .await;
        assert_eq!(location(&res), "/profile");

        let html = body_text(client.get("/list").await).await;
        assert!(!html.contains("a@x.com"));
    }

    #[tokio::test]
    async fn email_change_follows_into_session() {
        let mut client = Client::new(AppState::fake());
        client.register_ana().await;
        client.login("a@x.com", "secret1").await;
        assert_eq!(client.session_email().await, "a@x.com");

        let res = client
            .post_form("/update-user", "action=update&email=ana%40y.com")
            .await;
        assert_eq!(location(&res), "/profile");
        assert_eq!(client.session_email().await, "ana@y.com");

        let html = body_text(client.get("/profile").await).await;
        assert!(html.contains("ana@y.com"));

        client.get("/logout").await;
        assert_eq!(client.session_email().await, "");
        let res = client.login("ana@y.com", "secret1").await;
        assert_eq!(location(&res), "/profile");
        assert_eq!(client.session_email().await, "ana@y.com");
    }

    #[tokio::test]
    async fn delete_then_profile_requires_login() {
        let mut client = Client::new(AppState::fake());
        client.register_ana().await;
        client.login("a@x.com", "secret1").await;
        let stale = client.jar.clone();

        let res = client.post_form("/update-user", "action=delete").await;
        assert_eq!(location(&res), "/");
        assert!(!client.jar.0.contains_key("Authorization"));

        let res = client.get("/profile").await;
        assert_eq!(location(&res), "/");

        // Replaying the old cookies does not resurrect the session.
        client.jar = stale;
        let res = client.get("/profile").await;
        assert_eq!(location(&res), "/");
    }

    #[tokio::test]
    async fn logout_clears_auth() {
        let mut client = Client::new(AppState::fake());
        client.register_ana().await;
        client.login("a@x.com", "secret1").await;

        let res = client.get("/logout").await;
        assert_eq!(location(&res), "/");
        assert!(!client.jar.0.contains_key("Authorization"));

        let res = client.get("/profile").await;
        assert_eq!(location(&res), "/");
    }

    #[tokio::test]
    async fn forged_cookie_is_not_authenticated() {
        let mut client = Client::new(AppState::fake());
        client.register_ana().await;
        client
            .jar
            .0
            .insert("Authorization".into(), "Bearer not-a-token".into());

        let res = client.get("/profile").await;
        assert_eq!(location(&res), "/");
        let res = client.post_form("/update-user", "action=delete").await;
        assert_eq!(location(&res), "/");
    }

    #[tokio::test]
    async fn unknown_update_action_is_bad_request() {
        let mut client = Client::new(AppState::fake());
        client.register_ana().await;
        client.login("a@x.com", "secret1").await;

        let res = client.post_form("/update-user", "action=archive").await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
