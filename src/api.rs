//! Backend API client.
//!
//! Authenticated JSON-over-HTTP communication with the shop backend: login,
//! catalog and user administration, order creation/deletion/listing,
//! payment-gateway order creation and verification, and the dashboard
//! aggregate.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::catalog::CatalogBackend;
use crate::checkout::{OrderBackend, PaymentBackend};
use crate::models::{
    Category, DashboardSnapshot, GatewayOrder, GatewayOrderRequest, HistoricalOrder, Item,
    LoginRequest, LoginResponse, NewCategory, NewItem, NewUser, OrderRequest, SavedOrder, User,
    VerifyRequest,
};

/// Default timeout for API requests (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Version prefix of every backend route.
const API_PREFIX: &str = "/api/v1.0";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Transport(String),

    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    #[error("Invalid JSON from backend: {0}")]
    Decode(String),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the backend base URL:
/// - ensure a scheme is present (https, or http for localhost)
/// - strip trailing slashes
/// - strip a trailing `/api/v1.0` or `/api` segment
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }
    for suffix in [API_PREFIX, "/api"] {
        if url.ends_with(suffix) {
            url.truncate(url.len() - suffix.len());
        }
    }
    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach backend at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid backend URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Convert an HTTP status code into a user-friendly message.
fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        401 => "Session expired, please sign in again".to_string(),
        403 => "You are not permitted to perform this action".to_string(),
        404 => "Requested resource was not found".to_string(),
        s if s >= 500 => format!("Backend server error (HTTP {s})"),
        s => format!("Unexpected response from backend (HTTP {s})"),
    }
}

/// Pick the most useful message out of an error body.
fn error_message(status: StatusCode, body_text: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body_text) {
        if let Some(message) = json
            .get("message")
            .or_else(|| json.get("error"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|m| !m.is_empty())
        {
            return message.to_string();
        }
    }
    status_error(status)
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct ApiClient {
    base: String,
    http: Client,
    token: RwLock<Option<Zeroizing<String>>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.base)
            .field("signed_in", &self.has_token())
            .finish()
    }
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base = normalize_base_url(base_url);
        if reqwest::Url::parse(&base).is_err() {
            return Err(ApiError::InvalidUrl(base));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            base,
            http,
            token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub fn set_token(&self, token: &str) {
        let mut guard = self.token.write().unwrap_or_else(|p| p.into_inner());
        *guard = Some(Zeroizing::new(token.to_string()));
    }

    pub fn clear_token(&self) {
        let mut guard = self.token.write().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }

    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .map(|g| g.is_some())
            .unwrap_or(false)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.base)
    }

    /// Perform a request and return the status and raw body of a successful
    /// response. Non-success statuses become [`ApiError::Status`].
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(StatusCode, String), ApiError> {
        let full_url = self.url(path);
        let mut req = self.http.request(method.clone(), &full_url);

        let token = self
            .token
            .read()
            .ok()
            .and_then(|g| g.as_ref().map(|t| (**t).clone()));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        let start = Instant::now();
        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::Transport(friendly_error(&self.base, &e)))?;
        let status = resp.status();
        let body_text = resp.text().await.unwrap_or_default();
        debug!(
            method = %method,
            path,
            status = status.as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "backend request"
        );

        if !status.is_success() {
            let message = error_message(status, &body_text);
            warn!(method = %method, path, status = status.as_u16(), %message, "backend request failed");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok((status, body_text))
    }

    async fn request_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (_, body_text) = self.send(method, path, body).await?;
        decode(&body_text)
    }

    async fn request_empty<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), ApiError> {
        self.send(method, path, body).await.map(|_| ())
    }

    // -- Auth ----------------------------------------------------------------

    /// Sign in. The returned token is also installed on this client.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse, ApiError> {
        let response: LoginResponse = self
            .request_json(Method::POST, "/login", Some(credentials))
            .await?;
        self.set_token(&response.token);
        info!(role = %response.role, "signed in");
        Ok(response)
    }

    // -- Categories ----------------------------------------------------------

    pub async fn add_category(&self, category: &NewCategory) -> Result<Category, ApiError> {
        self.request_json(Method::POST, "/admin/categories", Some(category))
            .await
    }

    pub async fn delete_category(&self, category_id: &str) -> Result<(), ApiError> {
        self.request_empty::<()>(
            Method::DELETE,
            &format!("/admin/categories/{category_id}"),
            None,
        )
        .await
    }

    // -- Items ---------------------------------------------------------------

    pub async fn add_item(&self, item: &NewItem) -> Result<Item, ApiError> {
        self.request_json(Method::POST, "/admin/items", Some(item))
            .await
    }

    pub async fn delete_item(&self, item_id: &str) -> Result<(), ApiError> {
        self.request_empty::<()>(Method::DELETE, &format!("/admin/items/{item_id}"), None)
            .await
    }

    // -- Users ---------------------------------------------------------------

    pub async fn add_user(&self, user: &NewUser) -> Result<User, ApiError> {
        self.request_json(Method::POST, "/admin/register", Some(user))
            .await
    }

    pub async fn update_user(&self, user_id: &str, user: &NewUser) -> Result<User, ApiError> {
        self.request_json(Method::PUT, &format!("/admin/users/{user_id}"), Some(user))
            .await
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<(), ApiError> {
        self.request_empty::<()>(Method::DELETE, &format!("/admin/users/{user_id}"), None)
            .await
    }

    // -- Reporting -----------------------------------------------------------

    pub async fn latest_orders(&self) -> Result<Vec<HistoricalOrder>, ApiError> {
        self.request_json::<(), _>(Method::GET, "/orders/latest", None)
            .await
    }

    pub async fn fetch_dashboard(&self) -> Result<DashboardSnapshot, ApiError> {
        self.request_json::<(), _>(Method::GET, "/dashboard", None)
            .await
    }
}

fn decode<T: DeserializeOwned>(body_text: &str) -> Result<T, ApiError> {
    // Empty 204 bodies decode as JSON null.
    let text = if body_text.trim().is_empty() {
        "null"
    } else {
        body_text
    };
    serde_json::from_str(text).map_err(|e| ApiError::Decode(e.to_string()))
}

// ---------------------------------------------------------------------------
// Collaborator impls
// ---------------------------------------------------------------------------

#[async_trait]
impl CatalogBackend for ApiClient {
    async fn fetch_categories(&self) -> Result<Vec<Category>, ApiError> {
        self.request_json::<(), _>(Method::GET, "/categories", None)
            .await
    }

    async fn fetch_items(&self) -> Result<Vec<Item>, ApiError> {
        self.request_json::<(), _>(Method::GET, "/items", None).await
    }

    async fn fetch_users(&self) -> Result<Vec<User>, ApiError> {
        self.request_json::<(), _>(Method::GET, "/admin/users", None)
            .await
    }
}

#[async_trait]
impl OrderBackend for ApiClient {
    /// Only `201 Created` counts as a persisted order.
    async fn create_order(&self, request: &OrderRequest) -> Result<SavedOrder, ApiError> {
        let (status, body_text) = self.send(Method::POST, "/orders", Some(request)).await?;
        if status != StatusCode::CREATED {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: status_error(status),
            });
        }
        decode(&body_text).inspect_err(|e| {
            warn!(
                customer = %request.customer_name,
                grand_total = request.grand_total,
                error = %e,
                "Order was created but the response could not be read; it may need manual cleanup"
            );
        })
    }

    async fn delete_order(&self, order_id: &str) -> Result<(), ApiError> {
        self.request_empty::<()>(Method::DELETE, &format!("/orders/{order_id}"), None)
            .await
    }
}

#[async_trait]
impl PaymentBackend for ApiClient {
    async fn create_gateway_order(
        &self,
        request: &GatewayOrderRequest,
    ) -> Result<GatewayOrder, ApiError> {
        self.request_json(Method::POST, "/payments/create-order", Some(request))
            .await
    }

    async fn verify_payment(&self, request: &VerifyRequest) -> Result<(), ApiError> {
        self.request_empty(Method::POST, "/payments/verify", Some(request))
            .await
    }
}
