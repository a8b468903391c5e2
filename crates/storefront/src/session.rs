//! Authentication session shared by the REST client and the cart.
//!
//! Holds the bearer token of the logged-in user. The token itself is
//! obtained elsewhere (login form, `TIENDA_API_TOKEN`); this type only
//! stores it, exposes whether a user is logged in, and forgets the token
//! when the backend reports it expired.

use std::sync::{Arc, PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};

use crate::error::{clear_sentry_user, set_sentry_user};

/// Shared, cheaply cloneable authentication state.
#[derive(Clone, Default)]
pub struct Session {
    inner: Arc<RwLock<Option<SecretString>>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl Session {
    /// Create a session with no logged-in user.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Create a session already holding `token`.
    #[must_use]
    pub fn authenticated(token: impl Into<SecretString>) -> Self {
        let session = Self::default();
        session.login(token, None);
        session
    }

    /// Store the token of a freshly logged-in user.
    pub fn login(&self, token: impl Into<SecretString>, user_id: Option<&str>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
        if let Some(user_id) = user_id {
            set_sentry_user(&user_id, None);
        }
        tracing::debug!("Session token stored");
    }

    /// Forget the token (explicit logout).
    pub fn logout(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
        clear_sentry_user();
        tracing::debug!("Session token cleared");
    }

    /// Forget the token because the backend rejected it.
    pub(crate) fn expire(&self) {
        tracing::warn!("Authentication token rejected by backend, session expired");
        self.logout();
    }

    /// Whether a user is logged in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// `Authorization` header value for the current token.
    pub(crate) fn bearer(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|token| format!("Bearer {}", token.expose_secret()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_has_no_bearer() {
        let session = Session::anonymous();
        assert!(!session.is_authenticated());
        assert!(session.bearer().is_none());
    }

    #[test]
    fn test_login_and_logout() {
        let session = Session::anonymous();
        session.login("tok-123", None);
        assert!(session.is_authenticated());
        assert_eq!(session.bearer().as_deref(), Some("Bearer tok-123"));

        session.logout();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_clones_share_state() {
        let session = Session::authenticated("tok");
        let clone = session.clone();
        clone.expire();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_poisoned_lock_keeps_token() {
        let session = Session::authenticated("tok");
        let clone = session.clone();
        let _ = std::thread::spawn(move || {
            let _guard = clone.inner.write().unwrap_or_else(PoisonError::into_inner);
            panic!("poison the session lock");
        })
        .join();

        assert!(session.inner.is_poisoned());
        assert!(session.is_authenticated());
        assert_eq!(session.bearer().as_deref(), Some("Bearer tok"));
    }

    #[test]
    fn test_debug_hides_token() {
        let session = Session::authenticated("very-private-token");
        let debug_output = format!("{session:?}");
        assert!(debug_output.contains("authenticated: true"));
        assert!(!debug_output.contains("very-private-token"));
    }
}
