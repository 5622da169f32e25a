use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Signing key for the session-id cookie. At least 64 bytes.
    pub secret: String,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub session: SessionConfig,
    /// Drop and recreate the schema on startup. Development only.
    pub reset_schema: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").or_else(|_| std::env::var("SIGN_IN_KEY"))?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "oleo-descarte".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "oleo-descarte-users".into()),
            ttl_minutes: parse_ttl_minutes(std::env::var("JWT_TTL_MINUTES").ok().as_deref())?,
        };
        let session = SessionConfig {
            secret: std::env::var("SESSION_SECRET_KEY")?,
            cookie_secure: env_flag("COOKIE_SECURE"),
        };
        anyhow::ensure!(
            session.secret.len() >= 64,
            "SESSION_SECRET_KEY must be at least 64 bytes"
        );
        Ok(Self {
            database_url,
            jwt,
            session,
            reset_schema: env_flag("RESET_SCHEMA"),
        })
    }

    /// Lifetime shared by the token, the bearer cookie and the session.
    pub fn auth_ttl(&self) -> time::Duration {
        time::Duration::minutes(self.jwt.ttl_minutes)
    }
}

/// Upper bound for `JWT_TTL_MINUTES`: one year.
const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

fn parse_ttl_minutes(raw: Option<&str>) -> anyhow::Result<i64> {
    let Some(raw) = raw else {
        return Ok(30);
    };
    let minutes: i64 = raw
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("JWT_TTL_MINUTES must be an integer, got '{raw}'"))?;
    anyhow::ensure!(
        (1..=MAX_TTL_MINUTES).contains(&minutes),
        "JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}, got {minutes}"
    );
    Ok(minutes)
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
