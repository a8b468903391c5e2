//! REST client for the Tienda backend.
//!
//! # Endpoints
//!
//! | Operation | Request |
//! |---|---|
//! | Fetch cart | `GET /api/carrito` |
//! | Add item | `POST /api/carrito` |
//! | Set quantity | `PUT /api/carrito/{productId}` |
//! | Remove item | `DELETE /api/carrito/{productId}` |
//! | Save for later | `POST /api/carrito/guardar/{productId}` |
//! | Move back to cart | `POST /api/carrito/mover/{productId}` |
//! | Empty cart | `DELETE /api/carrito` |
//! | Create order | `POST /api/pedidos` |
//! | List orders | `GET /api/pedidos/mispedidos` |
//!
//! Every endpoint requires a logged-in [`Session`]. Calls made without one
//! fail with [`ApiError::NotAuthenticated`] before any request is sent. A
//! 401 response expires the session.
//!
//! # Example
//!
//! ```rust,ignore
//! let session = Session::authenticated(token);
//! let client = ApiClient::new(&config, session)?;
//! let cart = client.fetch_cart().await?;
//! ```

mod conversions;
mod types;

use std::sync::Arc;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tienda_core::{ProductId, Quantity};
use tracing::instrument;
use url::Url;
use uuid::Uuid;

use crate::cart::{Cart, CartBackend, OrderBackend};
use crate::checkout::{Order, OrderRequest};
use crate::config::StorefrontConfig;
use crate::session::Session;

use conversions::{convert_cart, convert_order};
use types::{
    AddItemRequest, CartResponse, ErrorResponse, MoveToCartRequest, OrderListResponse,
    OrderResponse, UpdateQuantityRequest, VariantRequest,
};

/// Header carrying a per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Errors that can occur when calling the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend rejected the request.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Backend rejected the session token.
    #[error("Session expired, please log in again")]
    Unauthorized,

    /// No session token; the request was not sent.
    #[error("Not logged in")]
    NotAuthenticated,

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    /// Message suitable for showing to the user.
    ///
    /// Backend rejections carry the server's own message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Http(err) if err.is_timeout() => "The server took too long to respond".to_string(),
            Self::Http(err) if err.is_connect() => "Could not reach the server".to_string(),
            Self::Http(_) => "Network error".to_string(),
            Self::Api { message, .. } => message.clone(),
            Self::Unauthorized => "Your session expired, please log in again".to_string(),
            Self::NotAuthenticated => "Please log in first".to_string(),
            Self::RateLimited(secs) => format!("Too many requests, try again in {secs}s"),
            Self::Parse(_) => "Unexpected response from the server".to_string(),
            Self::InvalidUrl(_) => "Invalid server address".to_string(),
        }
    }

    /// Whether the failure points at the backend or this client rather than
    /// at the user's input or connectivity.
    #[must_use]
    pub fn is_server_fault(&self) -> bool {
        match self {
            Self::Http(err) => !(err.is_timeout() || err.is_connect()),
            Self::Api { status, .. } => *status >= 500,
            Self::Parse(_) | Self::InvalidUrl(_) => true,
            Self::Unauthorized | Self::NotAuthenticated | Self::RateLimited(_) => false,
        }
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the Tienda REST backend.
///
/// Cheap to clone; clones share the HTTP connection pool and the session.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    tienda_slug: Option<String>,
    session: Session,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("tienda_slug", &self.inner.tienda_slug)
            .field("session", &self.inner.session)
            .finish()
    }
}

impl ApiClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StorefrontConfig, session: Session) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.http_timeout)
            .build()?;

        tracing::debug!(
            base_url = %config.api_base_url,
            tienda = config.tienda_slug.as_deref().unwrap_or("-"),
            "Backend client created"
        );

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_base_url.clone(),
                tienda_slug: config.tienda_slug.clone(),
                session,
            }),
        })
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    #[must_use]
    pub fn tienda_slug(&self) -> Option<&str> {
        self.inner.tienda_slug.as_deref()
    }

    /// Build `{base}/{segments...}`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send an authenticated request and return the body of a successful
    /// response.
    async fn execute<T: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&T>,
    ) -> Result<String, ApiError> {
        let bearer = self
            .inner
            .session
            .bearer()
            .ok_or(ApiError::NotAuthenticated)?;
        let url = self.endpoint(segments)?;
        let request_id = Uuid::new_v4().to_string();

        tracing::debug!(%method, path = url.path(), %request_id, "Sending backend request");

        let mut request = self
            .inner
            .client
            .request(method, url)
            .header(AUTHORIZATION, bearer)
            .header(REQUEST_ID_HEADER, &request_id);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            self.inner.session.expire();
            return Err(ApiError::Unauthorized);
        }

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        let response_text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&response_text)
                .ok()
                .and_then(ErrorResponse::into_message)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Request failed")
                        .to_string()
                });
            tracing::warn!(
                status = status.as_u16(),
                %request_id,
                message = %message,
                "Backend returned non-success status"
            );
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response_text)
    }

    fn parse<R: DeserializeOwned>(response_text: &str) -> Result<R, ApiError> {
        serde_json::from_str(response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %response_text.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            ApiError::Parse(e)
        })
    }
}

// =============================================================================
// Cart endpoints
// =============================================================================

impl CartBackend for ApiClient {
    #[instrument(skip(self))]
    async fn fetch_cart(&self) -> Result<Cart, ApiError> {
        let text = self
            .execute(Method::GET, &["api", "carrito"], None::<&()>)
            .await?;
        let response: CartResponse = Self::parse(&text)?;
        Ok(convert_cart(response))
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn add_item(&self, product_id: &ProductId, quantity: Quantity) -> Result<(), ApiError> {
        let body = AddItemRequest {
            product_id: product_id.as_str(),
            quantity: quantity.get(),
            variant: serde_json::Map::new(),
        };
        self.execute(Method::POST, &["api", "carrito"], Some(&body))
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn update_quantity(
        &self,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> Result<(), ApiError> {
        let body = UpdateQuantityRequest {
            quantity: quantity.get(),
            variant: serde_json::Map::new(),
        };
        self.execute(
            Method::PUT,
            &["api", "carrito", product_id.as_str()],
            Some(&body),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn remove_item(&self, product_id: &ProductId) -> Result<(), ApiError> {
        self.execute(
            Method::DELETE,
            &["api", "carrito", product_id.as_str()],
            Some(&VariantRequest::default()),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn save_for_later(&self, product_id: &ProductId) -> Result<(), ApiError> {
        self.execute(
            Method::POST,
            &["api", "carrito", "guardar", product_id.as_str()],
            Some(&VariantRequest::default()),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn move_to_cart(
        &self,
        product_id: &ProductId,
        quantity: Quantity,
    ) -> Result<(), ApiError> {
        let body = MoveToCartRequest {
            quantity: quantity.get(),
            variant: serde_json::Map::new(),
        };
        self.execute(
            Method::POST,
            &["api", "carrito", "mover", product_id.as_str()],
            Some(&body),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self) -> Result<(), ApiError> {
        self.execute(Method::DELETE, &["api", "carrito"], None::<&()>)
            .await?;
        Ok(())
    }
}

// =============================================================================
// Order endpoints
// =============================================================================

impl OrderBackend for ApiClient {
    #[instrument(skip(self, request), fields(payment_method = %request.payment_method))]
    async fn create_order(&self, request: &OrderRequest) -> Result<Order, ApiError> {
        let text = self
            .execute(Method::POST, &["api", "pedidos"], Some(request))
            .await?;
        let response: OrderResponse = Self::parse(&text)?;
        Ok(convert_order(response))
    }

    #[instrument(skip(self))]
    async fn list_orders(&self) -> Result<Vec<Order>, ApiError> {
        let text = self
            .execute(Method::GET, &["api", "pedidos", "mispedidos"], None::<&()>)
            .await?;
        let response: OrderListResponse = Self::parse(&text)?;
        let mut orders: Vec<Order> = response
            .into_orders()
            .into_iter()
            .map(convert_order)
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str, session: Session) -> ApiClient {
        let config = StorefrontConfig::new(Url::parse(base).unwrap());
        ApiClient::new(&config, session).unwrap()
    }

    #[test]
    fn test_endpoint_joins_and_encodes_segments() {
        let api = client("https://backend.example.com", Session::anonymous());
        let url = api.endpoint(&["api", "carrito", "64f1 a/b"]).unwrap();
        assert_eq!(url.as_str(), "https://backend.example.com/api/carrito/64f1%20a%2Fb");
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let api = client("https://backend.example.com/v2/", Session::anonymous());
        let url = api.endpoint(&["api", "pedidos"]).unwrap();
        assert_eq!(url.as_str(), "https://backend.example.com/v2/api/pedidos");
    }

    #[tokio::test]
    async fn test_calls_without_session_are_not_sent() {
        // Unroutable address: reaching the network would fail with Http.
        let api = client("http://127.0.0.1:9", Session::anonymous());
        let err = api.fetch_cart().await.unwrap_err();
        assert!(matches!(err, ApiError::NotAuthenticated));
        let err = api
            .update_quantity(&ProductId::new("a"), Quantity::ONE)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotAuthenticated));
    }

    #[test]
    fn test_variant_bodies_match_backend_shape() {
        let body = serde_json::to_value(VariantRequest::default()).unwrap();
        assert_eq!(body, serde_json::json!({"variante": {}}));

        let body = serde_json::to_value(MoveToCartRequest {
            quantity: 2,
            variant: serde_json::Map::new(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"cantidad": 2, "variante": {}}));
    }

    #[test]
    fn test_user_message_prefers_server_message() {
        let err = ApiError::Api {
            status: 400,
            message: "Stock insuficiente".to_string(),
        };
        assert_eq!(err.user_message(), "Stock insuficiente");
        assert!(!err.is_server_fault());
        assert!(!ApiError::Unauthorized.is_server_fault());
    }

    #[test]
    fn test_error_body_message() {
        let body: ErrorResponse = serde_json::from_str(r#"{"message":"Producto no encontrado"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Producto no encontrado"));
        let body: ErrorResponse = serde_json::from_str(r#"{"message":"  "}"#).unwrap();
        assert!(body.into_message().is_none());
    }
}
