use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use std::fmt;
use validator::Validate;

/// Public identity of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Identity {
    pub id: i64,
    pub phone_number: String,
    pub full_name: String,
}

/// Login credential: the stored hash for a phone number
#[derive(Clone, PartialEq, Eq, FromRow)]
pub struct Credential {
    pub id: i64,
    pub phone_number: String,
    #[sqlx(rename = "password")]
    pub password_hash: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("phone_number", &self.phone_number)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// Registration form
///
/// Missing fields bind as empty strings so they are reported by validation
/// rather than rejected by the extractor.
#[derive(Deserialize, Validate)]
pub struct RegistrationRequest {
    #[serde(default)]
    #[validate(custom(function = "crate::validators::validate_phone_number"))]
    pub phone_number: String,
    #[serde(default)]
    #[validate(custom(function = "crate::validators::validate_full_name"))]
    pub full_name: String,
    #[serde(default)]
    #[validate(custom(function = "crate::validators::validate_password"))]
    pub password: String,
}

/// Login form (not shape-validated)
#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub password: String,
}

/// Profile update form
///
/// Empty values mean "leave unchanged" and skip validation.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfileUpdateRequest {
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(custom(function = "crate::validators::validate_phone_number"))]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(custom(function = "crate::validators::validate_full_name"))]
    pub full_name: Option<String>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_empty()))
}
