//! Registration, login, and bearer-token sessions.
//!
//! Passwords are hashed with Argon2id. Tokens are 32 random bytes,
//! URL-safe base64 encoded, and persisted server-side so logout can
//! invalidate them.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use thiserror::Error;
use tracing::instrument;

use verdant_core::{Email, EmailError};

use crate::models::User;
use crate::store::{Store, StoreError};

/// Errors from authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong email or password. Deliberately indistinguishable.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The bearer token does not resolve to a user.
    #[error("invalid token")]
    InvalidToken,

    /// The email is already registered.
    #[error("user already exists")]
    UserAlreadyExists,

    /// The password failed the strength check.
    #[error("{0}")]
    WeakPassword(String),

    /// The email failed validation.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Password hashing or verification failed.
    #[error("password hash error: {0}")]
    PasswordHash(String),
}

/// A logged-in user with their freshly-issued bearer token.
#[derive(Debug)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

/// Minimum password length accepted at registration.
const MIN_PASSWORD_LEN: usize = 8;

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?
        .to_string())
}

fn generate_token() -> String {
    URL_SAFE_NO_PAD.encode(rand::random::<[u8; 32]>())
}

/// Create an account and log it in.
#[instrument(skip_all)]
pub async fn register(
    store: &dyn Store,
    email: &str,
    password: &str,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Result<AuthSession, AuthError> {
    let email = Email::parse(email)?;
    validate_password(password)?;
    let password_hash = hash_password(password)?;

    let user = store
        .create_user(&email, &password_hash, first_name, last_name)
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => AuthError::UserAlreadyExists,
            other => AuthError::Storage(other),
        })?;

    let token = generate_token();
    store.create_auth_session(user.id, &token).await?;
    tracing::info!(user_id = %user.id, "user registered");
    Ok(AuthSession { user, token })
}

/// Verify credentials and issue a token.
#[instrument(skip_all)]
pub async fn login(
    store: &dyn Store,
    email: &str,
    password: &str,
) -> Result<AuthSession, AuthError> {
    let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;
    let Some((user, stored_hash)) = store.find_password_hash(&email).await? else {
        return Err(AuthError::InvalidCredentials);
    };

    let parsed =
        PasswordHash::new(&stored_hash).map_err(|e| AuthError::PasswordHash(e.to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)?;

    let token = generate_token();
    store.create_auth_session(user.id, &token).await?;
    tracing::info!(user_id = %user.id, "user logged in");
    Ok(AuthSession { user, token })
}

/// Invalidate a bearer token. Succeeds even if the token was already gone.
#[instrument(skip_all)]
pub async fn logout(store: &dyn Store, token: &str) -> Result<(), AuthError> {
    store.delete_auth_session(token).await?;
    Ok(())
}

/// Resolve a bearer token to its user.
pub async fn authenticate(store: &dyn Store, token: &str) -> Result<User, AuthError> {
    store
        .find_user_by_token(token)
        .await?
        .ok_or(AuthError::InvalidToken)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[test]
    fn short_passwords_are_rejected() {
        assert!(matches!(
            validate_password("hunter2"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("hunter22").is_ok());
    }

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn register_then_login_round_trip() {
        let store = MemoryStore::new();
        let session = register(&store, "Jo@Example.com", "hunter22", Some("Jo"), None)
            .await
            .unwrap();
        assert_eq!(session.user.email.as_str(), "jo@example.com");

        let login = login(&store, "jo@example.com", "hunter22").await.unwrap();
        assert_eq!(login.user.id, session.user.id);
        assert_ne!(login.token, session.token);

        let resolved = authenticate(&store, &login.token).await.unwrap();
        assert_eq!(resolved.id, session.user.id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_identical() {
        let store = MemoryStore::new();
        register(&store, "jo@example.com", "hunter22", None, None)
            .await
            .unwrap();

        assert!(matches!(
            login(&store, "jo@example.com", "wrong-pass").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            login(&store, "nobody@example.com", "hunter22").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_conflict() {
        let store = MemoryStore::new();
        register(&store, "jo@example.com", "hunter22", None, None)
            .await
            .unwrap();
        assert!(matches!(
            register(&store, "jo@example.com", "hunter22", None, None).await,
            Err(AuthError::UserAlreadyExists)
        ));
    }

    #[tokio::test]
    async fn logout_invalidates_the_token() {
        let store = MemoryStore::new();
        let session = register(&store, "jo@example.com", "hunter22", None, None)
            .await
            .unwrap();

        logout(&store, &session.token).await.unwrap();
        assert!(matches!(
            authenticate(&store, &session.token).await,
            Err(AuthError::InvalidToken)
        ));
        // Idempotent.
        logout(&store, &session.token).await.unwrap();
    }
}
