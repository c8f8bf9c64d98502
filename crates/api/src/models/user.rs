//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use verdant_core::{Email, UserId};

/// A registered user.
///
/// The email is the login identity; the password hash lives in a separate
/// storage table and never appears on this type.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login email, normalized to lowercase.
    pub email: Email,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub updated_at: DateTime<Utc>,
}

/// Partial profile update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub email: Option<Email>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}
