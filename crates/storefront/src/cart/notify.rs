//! User-facing notifications raised by cart and checkout operations.

use std::fmt;

use tienda_core::ProductId;
use tokio::sync::mpsc::UnboundedSender;

/// How prominently a notification should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Something the user should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A flush finished and at least one change was saved.
    CartSaved { updated: usize },
    /// One line's quantity change was rejected.
    ItemUpdateFailed {
        product_id: ProductId,
        product_name: String,
        message: String,
    },
    ItemAdded { product_id: ProductId },
    ItemRemoved { product_id: ProductId },
    ItemRemoveFailed { product_id: ProductId, message: String },
    ItemSavedForLater { product_id: ProductId },
    ItemMovedToCart { product_id: ProductId },
    /// The cart could not be refetched; the shown cart may be stale.
    CartRefreshFailed { message: String },
    /// The backend rejected the session token.
    SessionExpired,
    /// The order was created but the payment redirect could not be set up.
    PaymentSetupFailed { message: String },
}

impl Notification {
    #[must_use]
    pub const fn level(&self) -> NotificationLevel {
        match self {
            Self::CartSaved { .. }
            | Self::ItemAdded { .. }
            | Self::ItemRemoved { .. }
            | Self::ItemSavedForLater { .. }
            | Self::ItemMovedToCart { .. } => NotificationLevel::Info,
            Self::CartRefreshFailed { .. } | Self::PaymentSetupFailed { .. } => {
                NotificationLevel::Warning
            }
            Self::ItemUpdateFailed { .. }
            | Self::ItemRemoveFailed { .. }
            | Self::SessionExpired => NotificationLevel::Error,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CartSaved { updated } => write!(f, "Cart saved ({updated} updated)"),
            Self::ItemUpdateFailed {
                product_name,
                message,
                ..
            } => write!(f, "Could not update {product_name}: {message}"),
            Self::ItemAdded { product_id } => write!(f, "Added {product_id} to cart"),
            Self::ItemRemoved { product_id } => write!(f, "Removed {product_id} from cart"),
            Self::ItemRemoveFailed {
                product_id,
                message,
            } => write!(f, "Could not remove {product_id}: {message}"),
            Self::ItemSavedForLater { product_id } => write!(f, "Saved {product_id} for later"),
            Self::ItemMovedToCart { product_id } => write!(f, "Moved {product_id} back to cart"),
            Self::CartRefreshFailed { message } => write!(f, "Could not refresh cart: {message}"),
            Self::SessionExpired => f.write_str("Your session expired, please log in again"),
            Self::PaymentSetupFailed { message } => {
                write!(f, "Order created, but payment could not be set up: {message}")
            }
        }
    }
}

/// Sink for [`Notification`]s.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Forwards notifications to a channel, e.g. a UI event loop.
///
/// A closed receiver drops the notification.
impl Notifier for UnboundedSender<Notification> {
    fn notify(&self, notification: Notification) {
        if self.send(notification).is_err() {
            tracing::debug!("Notification receiver dropped");
        }
    }
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level() {
            NotificationLevel::Info => tracing::info!("{notification}"),
            NotificationLevel::Warning => tracing::warn!("{notification}"),
            NotificationLevel::Error => tracing::error!("{notification}"),
        }
    }
}
