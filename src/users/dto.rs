use serde::Deserialize;

use crate::{error::AppError, users::repo_types::UserChanges};

/// Form posted to `/create-user`.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub oil_quantity: Option<String>,
    pub email: Option<String>,
    // The registration page names the plaintext field `hashed_password`.
    #[serde(alias = "password")]
    pub hashed_password: Option<String>,
}

/// A registration that passed presence checks. The password is still plaintext.
#[derive(Debug)]
pub struct Registration {
    pub name: String,
    pub city: String,
    pub district: String,
    pub oil_quantity: f64,
    pub email: String,
    pub password: String,
}

impl RegisterForm {
    pub fn validate(self) -> Result<Registration, AppError> {
        let password = self
            .hashed_password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::Validation("password is required".into()))?;
        Ok(Registration {
            name: required(self.name, "name")?,
            city: required(self.city, "city")?,
            district: required(self.district, "district")?,
            oil_quantity: parse_quantity(&required(self.oil_quantity, "oil_quantity")?)?,
            email: normalize_email(&required(self.email, "email")?),
            password,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateAction {
    Update,
    Delete,
}

/// Form posted to `/update-user`.
#[derive(Debug, Deserialize)]
pub struct UpdateForm {
    pub action: Option<String>,
    pub name: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub oil_quantity: Option<String>,
    pub email: Option<String>,
}

impl UpdateForm {
    pub fn action(&self) -> Result<UpdateAction, AppError> {
        match self.action.as_deref().map(str::trim) {
            Some("update") => Ok(UpdateAction::Update),
            Some("delete") => Ok(UpdateAction::Delete),
            Some(other) => Err(AppError::Validation(format!("unknown action '{other}'"))),
            None => Err(AppError::Validation("action is required".into())),
        }
    }

    /// Blank fields are left unchanged.
    pub fn changes(self) -> Result<UserChanges, AppError> {
        let oil_quantity = match optional(self.oil_quantity) {
            Some(raw) => Some(parse_quantity(&raw)?),
            None => None,
        };
        Ok(UserChanges {
            name: optional(self.name),
            city: optional(self.city),
            district: optional(self.district),
            oil_quantity,
            email: optional(self.email).map(|e| normalize_email(&e)),
        })
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    optional(value).ok_or_else(|| AppError::Validation(format!("{field} is required")))
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_quantity(raw: &str) -> Result<f64, AppError> {
    raw.replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|q| q.is_finite())
        .ok_or_else(|| AppError::Validation("oil_quantity must be a number".into()))
}
