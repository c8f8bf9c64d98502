//! Core types for Verdant.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod owner;
pub mod size;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use owner::{CartOwner, SessionKey, SessionKeyError};
pub use size::Size;
pub use status::OrderStatus;
