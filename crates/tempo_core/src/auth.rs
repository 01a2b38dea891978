//! Signed-in user context shared by repositories.
//!
//! # Invariants
//! - All clones observe the same sign-in state.
//! - User ids are trimmed and never empty.

use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    InvalidUserId(String),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUserId(value) => write!(f, "invalid user id: `{value}`"),
        }
    }
}

impl Error for AuthError {}

/// Shared handle to the current user identity.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    current: Arc<RwLock<Option<String>>>,
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context already signed in as `user_id`.
    pub fn signed_in(user_id: &str) -> Result<Self, AuthError> {
        let context = Self::new();
        context.sign_in(user_id)?;
        Ok(context)
    }

    pub fn sign_in(&self, user_id: &str) -> Result<(), AuthError> {
        let trimmed = user_id.trim();
        if trimmed.is_empty() || trimmed.contains('/') {
            return Err(AuthError::InvalidUserId(user_id.to_string()));
        }
        *self.write_slot() = Some(trimmed.to_string());
        info!("event=auth_sign_in module=auth status=ok");
        Ok(())
    }

    pub fn sign_out(&self) {
        *self.write_slot() = None;
        info!("event=auth_sign_out module=auth status=ok");
    }

    pub fn current_user(&self) -> Option<String> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.current_user().is_some()
    }

    fn write_slot(&self) -> std::sync::RwLockWriteGuard<'_, Option<String>> {
        match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthContext, AuthError};

    #[test]
    fn clones_share_sign_in_state() {
        let auth = AuthContext::new();
        let clone = auth.clone();
        auth.sign_in(" user-1 ").unwrap();
        assert_eq!(clone.current_user().as_deref(), Some("user-1"));

        clone.sign_out();
        assert!(!auth.is_signed_in());
    }

    #[test]
    fn rejects_blank_or_path_like_ids() {
        let auth = AuthContext::new();
        assert!(matches!(auth.sign_in("  "), Err(AuthError::InvalidUserId(_))));
        assert!(auth.sign_in("a/b").is_err());
    }
}
