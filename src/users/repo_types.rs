use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub district: String,
    pub oil_quantity: f64,
    pub email: String,
    pub hashed_password: String, // Argon2 PHC string, only ever compared
    pub created_at: OffsetDateTime,
}

/// Fields for a new row. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub city: String,
    pub district: String,
    pub oil_quantity: f64,
    pub email: String,
    pub hashed_password: String,
}

/// Partial update; `None` leaves the column as is.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub oil_quantity: Option<f64>,
    pub email: Option<String>,
}
