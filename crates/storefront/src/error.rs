//! Unified error handling with Sentry integration.
//!
//! Each subsystem has its own error enum; [`Error`] unifies them for callers
//! (like the CLI) that drive several subsystems and only need to report.

use thiserror::Error;

use crate::api::ApiError;
use crate::cart::CartError;
use crate::checkout::CheckoutError;
use crate::config::ConfigError;

/// Top-level error type for the storefront client.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// REST backend call failed.
    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Checkout was refused or failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),
}

impl Error {
    /// Whether the failure should be sent to Sentry as an event.
    ///
    /// User-correctable failures (bad input, not logged in, unresolved
    /// cart items) are only logged.
    #[must_use]
    pub fn is_reportable(&self) -> bool {
        match self {
            Self::Config(_) => false,
            Self::Api(err) => err.is_server_fault(),
            Self::Cart(CartError::Api(err)) | Self::Checkout(CheckoutError::Api(err)) => {
                err.is_server_fault()
            }
            Self::Cart(_) | Self::Checkout(_) => false,
        }
    }

    /// Capture the error to Sentry if reportable and log it.
    pub fn report(&self) {
        if self.is_reportable() {
            let event_id = sentry::capture_error(self);
            tracing::error!(error = %self, sentry_event_id = %event_id, "Storefront error");
        } else {
            tracing::warn!(error = %self, "Storefront operation refused");
        }
    }
}

/// Result type alias for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Quantity edited", Some(&[("product_id", "64f1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb
                .data
                .insert((*key).to_string(), serde_json::Value::String((*value).to_string()));
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_not_reportable() {
        let err = Error::Api(ApiError::Api {
            status: 422,
            message: "Stock insuficiente".to_string(),
        });
        assert!(!err.is_reportable());
        assert_eq!(err.to_string(), "Backend error: API error 422: Stock insuficiente");
    }

    #[test]
    fn test_server_errors_are_reportable() {
        let err = Error::Cart(CartError::Api(ApiError::Api {
            status: 503,
            message: "unavailable".to_string(),
        }));
        assert!(err.is_reportable());
    }

    #[test]
    fn test_not_authenticated_is_not_reportable() {
        let err = Error::Cart(CartError::NotAuthenticated);
        assert!(!err.is_reportable());
    }
}
