use async_trait::async_trait;
use sqlx::PgPool;

use crate::users::repo_types::{NewUser, User, UserChanges};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("user not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => RepoError::DuplicateEmail,
            e => RepoError::Database(e),
        }
    }
}

/// Storage for user rows. Every method is a single atomic statement.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Insert a user. Fails with `DuplicateEmail` if the email is taken.
    async fn create(&self, user: NewUser) -> Result<User, RepoError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepoError>;
    async fn update(&self, id: i64, changes: UserChanges) -> Result<User, RepoError>;
    /// Remove a user. A repeated call reports `NotFound`.
    async fn delete(&self, id: i64) -> Result<(), RepoError>;
    /// Users with `oil_quantity > 0`, newest first.
    async fn list_with_positive_quantity(&self) -> Result<Vec<User>, RepoError>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn create(&self, user: NewUser) -> Result<User, RepoError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, city, district, oil_quantity, email, hashed_password)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, city, district, oil_quantity, email, hashed_password, created_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.city)
        .bind(&user.district)
        .bind(user.oil_quantity)
        .bind(&user.email)
        .bind(&user.hashed_password)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, city, district, oil_quantity, email, hashed_password, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, city, district, oil_quantity, email, hashed_password, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET name         = COALESCE($2, name),
                   city         = COALESCE($3, city),
                   district     = COALESCE($4, district),
                   oil_quantity = COALESCE($5, oil_quantity),
                   email        = COALESCE($6, email)
             WHERE id = $1
            RETURNING id, name, city, district, oil_quantity, email, hashed_password, created_at
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.city)
        .bind(changes.district)
        .bind(changes.oil_quantity)
        .bind(changes.email)
        .fetch_optional(&self.db)
        .await?
        .ok_or(RepoError::NotFound)
    }

    async fn delete(&self, id: i64) -> Result<(), RepoError> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if res.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn list_with_positive_quantity(&self) -> Result<Vec<User>, RepoError> {
        let rows = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, city, district, oil_quantity, email, hashed_password, created_at
            FROM users
            WHERE oil_quantity > 0
            ORDER BY id DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
pub use memory::MemoryUserRepo;
