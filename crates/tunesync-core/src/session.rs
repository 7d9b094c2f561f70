//! Session context
//!
//! The identity of the currently authenticated streaming account is passed
//! into every core operation as a value. Nothing in the core holds it in
//! shared state, so invocations for different users cannot observe each
//! other's identity.

use crate::error::{Error, Result};

/// Caller-supplied authentication context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    identity: Option<String>,
}

impl Session {
    /// No account signed in
    pub fn anonymous() -> Self {
        Self { identity: None }
    }

    /// Signed in as `identity` (the streaming account id)
    pub fn authenticated(identity: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.into()),
        }
    }

    /// The signed-in identity, if any
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Allow acting on `requested` only for the signed-in account
    ///
    /// # Errors
    ///
    /// - `Error::Unauthenticated` when nobody is signed in
    /// - `Error::ForbiddenUser` when the signed-in identity differs
    pub fn authorize(&self, requested: &str) -> Result<&str> {
        let identity = self.identity.as_deref().ok_or(Error::Unauthenticated)?;
        if identity != requested {
            return Err(Error::forbidden(identity, requested));
        }
        Ok(identity)
    }
}
