use tracing::{info, warn};

use crate::{
    auth::password::hash_password,
    error::AppError,
    users::{
        dto::RegisterForm,
        repo::{RepoError, UserRepo},
        repo_types::{NewUser, User, UserChanges},
    },
};

/// Validate, hash and insert. Duplicate emails surface as `DuplicateEmail`.
pub async fn register_user(repo: &dyn UserRepo, form: RegisterForm) -> Result<User, AppError> {
    let reg = form.validate()?;
    let hashed_password = hash_password(&reg.password)?;
    let user = repo
        .create(NewUser {
            name: reg.name,
            city: reg.city,
            district: reg.district,
            oil_quantity: reg.oil_quantity,
            email: reg.email,
            hashed_password,
        })
        .await?;
    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(user)
}

pub async fn update_user(repo: &dyn UserRepo, id: i64, changes: UserChanges) -> Result<User, AppError> {
    let user = repo.update(id, changes).await?;
    info!(user_id = user.id, "user updated");
    Ok(user)
}

/// Deleting a user that is already gone counts as done.
pub async fn delete_user(repo: &dyn UserRepo, id: i64) -> Result<(), AppError> {
    match repo.delete(id).await {
        Ok(()) => {
            info!(user_id = id, "user deleted");
            Ok(())
        }
        Err(RepoError::NotFound) => {
            warn!(user_id = id, "delete of missing user treated as done");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
