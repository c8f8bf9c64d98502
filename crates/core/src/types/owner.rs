//! Cart owner keys.
//!
//! A cart is keyed by exactly one of an authenticated user id or an anonymous
//! session key. Modeling this as a sum type (instead of two nullable columns)
//! makes the both-null and both-set states unrepresentable outside the
//! storage adapter.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// Errors that can occur when parsing a [`SessionKey`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionKeyError {
    /// The input string is empty or whitespace.
    #[error("session id cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("session id must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// A client-supplied identifier for an anonymous cart.
///
/// The client generates this value (typically a UUID) and presents it on
/// every anonymous cart request. It is opaque to the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Maximum accepted length, matching the storage column.
    pub const MAX_LENGTH: usize = 255;

    /// Parse a `SessionKey` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is blank or longer than 255 characters.
    pub fn parse(s: &str) -> Result<Self, SessionKeyError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SessionKeyError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SessionKeyError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the session key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The owner key of a cart ledger.
///
/// Resolved once per request by the identity layer and passed explicitly into
/// every cart and checkout operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CartOwner {
    /// An authenticated user's cart.
    User(UserId),
    /// An anonymous cart keyed by a client-supplied session id.
    Session(SessionKey),
}

impl CartOwner {
    /// The user id, if this is an authenticated owner.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Session(_) => None,
        }
    }

    /// The session key, if this is an anonymous owner.
    #[must_use]
    pub const fn session_key(&self) -> Option<&SessionKey> {
        match self {
            Self::User(_) => None,
            Self::Session(key) => Some(key),
        }
    }
}

impl fmt::Display for CartOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Session(key) => write!(f, "session:{key}"),
        }
    }
}

impl From<UserId> for CartOwner {
    fn from(id: UserId) -> Self {
        Self::User(id)
    }
}

impl From<SessionKey> for CartOwner {
    fn from(key: SessionKey) -> Self {
        Self::Session(key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn session_key_rejects_blank() {
        assert_eq!(SessionKey::parse(""), Err(SessionKeyError::Empty));
        assert_eq!(SessionKey::parse("  \t"), Err(SessionKeyError::Empty));
    }

    #[test]
    fn session_key_rejects_oversized() {
        let long = "x".repeat(256);
        assert!(matches!(
            SessionKey::parse(&long),
            Err(SessionKeyError::TooLong { max: 255 })
        ));
    }

    #[test]
    fn session_key_trims() {
        let key = SessionKey::parse(" abc-123 ").unwrap();
        assert_eq!(key.as_str(), "abc-123");
    }

    #[test]
    fn owner_accessors_are_exclusive() {
        let user = CartOwner::User(UserId::new(1));
        assert_eq!(user.user_id(), Some(UserId::new(1)));
        assert!(user.session_key().is_none());

        let session = CartOwner::Session(SessionKey::parse("s1").unwrap());
        assert!(session.user_id().is_none());
        assert_eq!(session.session_key().map(SessionKey::as_str), Some("s1"));
    }
}
