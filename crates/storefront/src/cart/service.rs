//! Async driver of the cart: owns the state and talks to the backend.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use rust_decimal::Decimal;
use secrecy::SecretString;
use tienda_core::{ProductId, Quantity};
use tokio::task::JoinHandle;
use tracing::instrument;

use super::backend::CartBackend;
use super::notify::{Notification, Notifier};
use super::reconcile::{
    CartState, EditState, FlushReport, UpdateOutcome, apply_flush_result, apply_pending_edit,
    begin_flush,
};
use super::store::Cart;
use super::CartError;
use crate::api::ApiError;
use crate::error::add_breadcrumb;
use crate::session::Session;

/// Cart of one user session.
///
/// The state lock is only taken for synchronous transitions and is never
/// held while a request is in flight. Flushes run one at a time: a flush
/// started while another is in flight waits for it to settle.
pub struct CartSession<B, N> {
    pub(crate) backend: B,
    pub(crate) notifier: N,
    session: Session,
    state: Mutex<CartState>,
    flush_lock: tokio::sync::Mutex<()>,
}

impl<B, N> std::fmt::Debug for CartSession<B, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("CartSession")
            .field("session", &self.session)
            .field("items", &state.store.items().len())
            .field("pending", &state.pending.len())
            .finish_non_exhaustive()
    }
}

impl<B, N> CartSession<B, N> {
    pub(crate) fn state(&self) -> MutexGuard<'_, CartState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: CartBackend, N: Notifier> CartSession<B, N> {
    /// Create a session with an empty cart.
    pub fn new(backend: B, notifier: N, session: Session) -> Self {
        Self {
            backend,
            notifier,
            session,
            state: Mutex::new(CartState::new()),
            flush_lock: tokio::sync::Mutex::new(()),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Reset to an empty cart with no pending edits.
    pub fn init(&self) {
        self.state().init();
    }

    /// Drop the cart and every pending edit.
    pub fn teardown(&self) {
        self.state().teardown();
    }

    /// Store a token, start a fresh cart and fetch it.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be fetched.
    pub async fn login(
        &self,
        token: impl Into<SecretString> + Send,
        user_id: Option<&str>,
    ) -> Result<(), CartError> {
        self.session.login(token, user_id);
        self.init();
        self.refresh().await
    }

    /// Forget the token and the cart.
    pub fn logout(&self) {
        self.teardown();
        self.session.logout();
    }

    /// Reject the call locally when nobody is logged in.
    pub(crate) fn ensure_authenticated(&self) -> Result<(), CartError> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            self.teardown();
            Err(CartError::NotAuthenticated)
        }
    }

    /// Tear down after the backend rejected the token.
    pub(crate) fn session_expired(&self) {
        self.teardown();
        if self.session.is_authenticated() {
            self.session.expire();
        }
        self.notifier.notify(Notification::SessionExpired);
    }

    /// Map a backend failure, tearing the cart down on a 401.
    pub(crate) fn backend_failure(&self, err: ApiError) -> CartError {
        if matches!(err, ApiError::Unauthorized) {
            self.session_expired();
        }
        CartError::Api(err)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Snapshot of the stored cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.state().store.cart().clone()
    }

    /// Server-confirmed total.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.state().store.total()
    }

    /// Total with pending quantities overlaid.
    #[must_use]
    pub fn display_total(&self) -> Decimal {
        self.state().display_total()
    }

    /// Quantity to render for a product.
    #[must_use]
    pub fn display_quantity(&self, product_id: &ProductId) -> Option<Quantity> {
        self.state().display_quantity(product_id)
    }

    /// Quantity the user asked for, including rejected edits.
    #[must_use]
    pub fn intended_quantity(&self, product_id: &ProductId) -> Option<Quantity> {
        self.state().intended_quantity(product_id)
    }

    #[must_use]
    pub fn edit_state(&self, product_id: &ProductId) -> EditState {
        self.state().edit_state(product_id)
    }

    #[must_use]
    pub fn has_pending_edits(&self) -> bool {
        !self.state().pending.is_empty()
    }

    // =========================================================================
    // Edits
    // =========================================================================

    /// Buffer a quantity change for a product already in the cart.
    ///
    /// Takes effect on the display immediately; nothing is sent until the
    /// next [`flush`](Self::flush).
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotAuthenticated`], [`CartError::UnknownItem`] or
    /// [`CartError::InvalidQuantity`]; the buffer is unchanged in each case.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub fn set_pending_quantity(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<EditState, CartError> {
        self.ensure_authenticated()?;
        let edit_state = apply_pending_edit(&mut self.state(), product_id, quantity)?;
        let quantity = quantity.to_string();
        add_breadcrumb(
            "cart",
            "Quantity edited",
            Some(&[("product_id", product_id.as_str()), ("quantity", quantity.as_str())]),
        );
        Ok(edit_state)
    }

    /// Replace the store with the backend's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if not logged in or the fetch fails.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<(), CartError> {
        self.ensure_authenticated()?;
        let cart = self
            .backend
            .fetch_cart()
            .await
            .map_err(|err| self.backend_failure(err))?;
        tracing::debug!(items = cart.len(), total = %cart.total(), "Cart fetched");
        self.state().store.replace(cart);
        Ok(())
    }

    /// Fetch the cart after a mutation.
    ///
    /// `Ok(None)` means the fetch failed for a reason other than an expired
    /// session; the user is told the cart may be stale.
    async fn refetch(&self) -> Result<Option<Cart>, CartError> {
        match self.backend.fetch_cart().await {
            Ok(cart) => Ok(Some(cart)),
            Err(ApiError::Unauthorized) => Err(self.backend_failure(ApiError::Unauthorized)),
            Err(err) => {
                tracing::warn!(error = %err, "Cart refetch failed");
                self.notifier.notify(Notification::CartRefreshFailed {
                    message: err.user_message(),
                });
                Ok(None)
            }
        }
    }

    /// Push every buffered edit to the backend.
    ///
    /// Sends one update per edit, all in flight at once. Items that fail
    /// keep their edit and raise one notification each; the rest are
    /// cleared. The cart is then refetched. An empty buffer returns without
    /// any request.
    ///
    /// If another flush is in flight (e.g. one from [`spawn_flush`](Self::spawn_flush)),
    /// this waits for it to settle first and then sends whatever is still
    /// buffered, including edits that flush failed to save.
    ///
    /// # Errors
    ///
    /// Item failures are reported in the returned [`FlushReport`], not as an
    /// error. Errors are only returned when nobody is logged in or the
    /// backend rejected the session.
    #[instrument(skip(self))]
    pub async fn flush(&self) -> Result<FlushReport, CartError> {
        self.ensure_authenticated()?;

        let _flushing = self.flush_lock.lock().await;
        let batch = begin_flush(&mut self.state());
        if batch.is_empty() {
            return Ok(FlushReport::default());
        }
        tracing::info!(items = batch.len(), "Flushing cart edits");

        let results = join_all(
            batch
                .iter()
                .map(|(product_id, quantity)| self.backend.update_quantity(product_id, *quantity)),
        )
        .await;

        let mut outcomes = Vec::with_capacity(batch.len());
        let mut expired = false;
        for ((product_id, quantity), result) in batch.into_iter().zip(results) {
            let result = result.map_err(|err| {
                tracing::warn!(product_id = %product_id, error = %err, "Cart item update failed");
                expired |= matches!(err, ApiError::Unauthorized);
                err.user_message()
            });
            outcomes.push(UpdateOutcome {
                product_id,
                quantity,
                result,
            });
        }
        if expired {
            return Err(self.backend_failure(ApiError::Unauthorized));
        }

        let refreshed = self.refetch().await?;
        let report = apply_flush_result(&mut self.state(), outcomes, refreshed);

        for failure in &report.failed {
            self.notifier.notify(Notification::ItemUpdateFailed {
                product_id: failure.product_id.clone(),
                product_name: failure.product_name.clone(),
                message: failure.message.clone(),
            });
        }
        if !report.updated.is_empty() {
            self.notifier.notify(Notification::CartSaved {
                updated: report.updated.len(),
            });
        }
        tracing::info!(
            updated = report.updated.len(),
            failed = report.failed.len(),
            outcome = ?report.outcome(),
            "Cart flush finished"
        );

        Ok(report)
    }

    /// Flush in the background, e.g. when the cart view goes away.
    ///
    /// Failures are logged and notified like any flush; the caller does not
    /// wait for the result.
    pub fn spawn_flush(self: &Arc<Self>) -> JoinHandle<()>
    where
        B: 'static,
        N: 'static,
    {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = this.flush().await {
                tracing::warn!(error = %err, "Background cart flush failed");
            }
        })
    }

    // =========================================================================
    // Line mutations
    // =========================================================================

    /// Add units of a product, then refetch the cart.
    ///
    /// Any pending edit for the product is dropped; the refetched quantity
    /// includes the added units.
    ///
    /// # Errors
    ///
    /// Returns an error if not logged in, the quantity is invalid, or the
    /// backend rejects the addition.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_item(&self, product_id: &ProductId, quantity: i64) -> Result<(), CartError> {
        self.ensure_authenticated()?;
        let quantity = Quantity::new(quantity).map_err(|source| CartError::InvalidQuantity {
            product_id: product_id.clone(),
            source,
        })?;

        self.state().pending.clear(product_id);
        self.backend
            .add_item(product_id, quantity)
            .await
            .map_err(|err| self.backend_failure(err))?;

        add_breadcrumb("cart", "Item added", Some(&[("product_id", product_id.as_str())]));
        self.notifier.notify(Notification::ItemAdded {
            product_id: product_id.clone(),
        });

        if let Some(cart) = self.refetch().await? {
            self.state().store.replace(cart);
        }
        Ok(())
    }

    /// Remove a line.
    ///
    /// The pending edit for the product is dropped first and a delete is
    /// issued; no quantity update is sent.
    ///
    /// # Errors
    ///
    /// Returns an error if not logged in or the backend rejects the removal.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_item(&self, product_id: &ProductId) -> Result<(), CartError> {
        self.ensure_authenticated()?;
        self.state().pending.clear(product_id);

        if let Err(err) = self.backend.remove_item(product_id).await {
            self.notifier.notify(Notification::ItemRemoveFailed {
                product_id: product_id.clone(),
                message: err.user_message(),
            });
            return Err(self.backend_failure(err));
        }

        add_breadcrumb("cart", "Item removed", Some(&[("product_id", product_id.as_str())]));
        self.notifier.notify(Notification::ItemRemoved {
            product_id: product_id.clone(),
        });

        let refreshed = self.refetch().await?;
        let mut state = self.state();
        let cart = refreshed.unwrap_or_else(|| state.store.cart().without(product_id));
        state.store.replace(cart);
        Ok(())
    }

    /// Move a line to the saved-for-later list, then refetch the cart.
    ///
    /// The pending edit for the product is dropped first; no quantity update
    /// is sent.
    ///
    /// # Errors
    ///
    /// Returns an error if not logged in or the backend rejects the move.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn save_for_later(&self, product_id: &ProductId) -> Result<(), CartError> {
        self.ensure_authenticated()?;
        self.state().pending.clear(product_id);

        self.backend
            .save_for_later(product_id)
            .await
            .map_err(|err| self.backend_failure(err))?;

        add_breadcrumb("cart", "Item saved for later", Some(&[("product_id", product_id.as_str())]));
        self.notifier.notify(Notification::ItemSavedForLater {
            product_id: product_id.clone(),
        });

        let refreshed = self.refetch().await?;
        let mut state = self.state();
        let cart = refreshed.unwrap_or_else(|| state.store.cart().with_line_saved(product_id));
        state.store.replace(cart);
        Ok(())
    }

    /// Move a saved product back into the cart, then refetch the cart.
    ///
    /// Any pending edit for the product is dropped; the refetched quantity
    /// is authoritative.
    ///
    /// # Errors
    ///
    /// Returns an error if not logged in, the quantity is invalid, or the
    /// backend rejects the move.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn move_to_cart(&self, product_id: &ProductId, quantity: i64) -> Result<(), CartError> {
        self.ensure_authenticated()?;
        let quantity = Quantity::new(quantity).map_err(|source| CartError::InvalidQuantity {
            product_id: product_id.clone(),
            source,
        })?;

        self.state().pending.clear(product_id);
        self.backend
            .move_to_cart(product_id, quantity)
            .await
            .map_err(|err| self.backend_failure(err))?;

        add_breadcrumb("cart", "Item moved to cart", Some(&[("product_id", product_id.as_str())]));
        self.notifier.notify(Notification::ItemMovedToCart {
            product_id: product_id.clone(),
        });

        if let Some(cart) = self.refetch().await? {
            self.state().store.replace(cart);
        }
        Ok(())
    }

    /// Empty the cart on the backend and locally.
    ///
    /// # Errors
    ///
    /// Returns an error if not logged in or the backend call fails.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<(), CartError> {
        self.ensure_authenticated()?;
        self.backend
            .clear_cart()
            .await
            .map_err(|err| self.backend_failure(err))?;
        add_breadcrumb("cart", "Cart cleared", None);
        self.state().teardown();
        Ok(())
    }
}
