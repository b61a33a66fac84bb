//! REST API client for the freight platform endpoints.
//!
//! Wraps orders, tracking, chat and upload endpoints using [`reqwest`].
//! Every request carries `Authorization: Bearer <token>` when a token is
//! configured.

use std::path::Path;

use fret_core::chat::{ChatMessage, ChatUser, Conversation};
use fret_core::error::CoreError;
use fret_core::order::CreateOrderRequest;
use fret_core::shipment::Order;
use fret_core::types::DbId;
use fret_core::update::StatusUpdateRequest;
use fret_core::upload::{UploadKind, UploadedFile};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ClientConfig;

/// Shown when the server gives no usable message.
pub const GENERIC_ERROR_MESSAGE: &str = "Une erreur est survenue. Veuillez réessayer.";

/// HTTP client for the platform API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

/// Errors from the REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("API error ({status}): {body}")]
    Api {
        status: u16,
        /// `message` or `error` field of a JSON error body.
        message: Option<String>,
        /// Raw response body for debugging.
        body: String,
    },

    /// The request was rejected before being sent.
    #[error(transparent)]
    Validation(#[from] CoreError),

    /// A local file could not be read for upload.
    #[error("Failed to read {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ApiError {
    /// Text to show the user: the server message when there is one,
    /// otherwise a generic fallback.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Api {
                message: Some(message),
                ..
            } => message.clone(),
            ApiError::Validation(CoreError::Validation(message)) => message.clone(),
            ApiError::File { path, .. } => format!("Impossible de lire le fichier {path}"),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }

    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            ApiError::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Pull a human-readable message out of an error body.
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitiateConversation {
    participant_id: DbId,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// * `api_url` - Base URL including the `/api` prefix, e.g.
    ///   `http://host:5000/api`.
    pub fn new(api_url: impl Into<String>, token: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, token)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        api_url: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Build a client with the configured request timeout.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(client, config.api_url.clone(), config.token.clone()))
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    // ---- orders ----

    /// `GET /orders`: orders of the signed-in client.
    pub async fn list_orders(&self) -> Result<Vec<Order>, ApiError> {
        self.get_json("/orders").await
    }

    /// `GET /orders/all`: every order (staff dashboards).
    pub async fn list_all_orders(&self) -> Result<Vec<Order>, ApiError> {
        self.get_json("/orders/all").await
    }

    /// `POST /orders`.
    pub async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order, ApiError> {
        let response = self
            .request(reqwest::Method::POST, "/orders")
            .json(request)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// `PUT /orders/:id/status`. Returns the updated order.
    pub async fn update_status(
        &self,
        order_id: DbId,
        request: &StatusUpdateRequest,
    ) -> Result<Order, ApiError> {
        let response = self
            .request(reqwest::Method::PUT, &format!("/orders/{order_id}/status"))
            .json(request)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// `GET /orders/track/:trackingNumber`. The number goes out as a single
    /// percent-encoded path segment, so `/`, `#` and `?` stay part of it.
    pub async fn track(&self, tracking_number: &str) -> Result<Order, ApiError> {
        let tracking_number = tracking_number.trim();
        if tracking_number.is_empty() {
            return Err(CoreError::Validation("tracking number is required".into()).into());
        }
        let url = self.endpoint(&["orders", "track", tracking_number])?;
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    // ---- chat ----

    /// `GET /chat/conversations`.
    pub async fn conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.get_json("/chat/conversations").await
    }

    /// `GET /chat/messages/:id`.
    pub async fn messages(&self, conversation_id: DbId) -> Result<Vec<ChatMessage>, ApiError> {
        self.get_json(&format!("/chat/messages/{conversation_id}"))
            .await
    }

    /// `PUT /chat/read/:id`.
    pub async fn mark_read(&self, conversation_id: DbId) -> Result<(), ApiError> {
        let response = self
            .request(reqwest::Method::PUT, &format!("/chat/read/{conversation_id}"))
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// `POST /chat/initiate`: open (or fetch) a conversation with a user.
    pub async fn initiate_conversation(
        &self,
        participant_id: DbId,
    ) -> Result<Conversation, ApiError> {
        let response = self
            .request(reqwest::Method::POST, "/chat/initiate")
            .json(&InitiateConversation { participant_id })
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// `GET /chat/users`: users the signed-in user may talk to.
    pub async fn chat_users(&self) -> Result<Vec<ChatUser>, ApiError> {
        self.get_json("/chat/users").await
    }

    // ---- uploads ----

    /// `POST /upload/{image,audio,pdf}` with the file as multipart field
    /// `file`.
    pub async fn upload(&self, kind: UploadKind, path: &Path) -> Result<UploadedFile, ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::File {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(kind.mime_for(path))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .request(reqwest::Method::POST, &format!("/upload/{kind}"))
            .multipart(form)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    // ---- private helpers ----

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.authorize(
            self.client
                .request(method, format!("{}{}", self.api_url, path)),
        )
    }

    /// Base URL with `segments` appended, each one percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, ApiError> {
        let invalid = || CoreError::Validation(format!("invalid API URL: {}", self.api_url));
        let mut url = reqwest::Url::parse(&self.api_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.request(reqwest::Method::GET, path).send().await?;
        Self::parse_response(response).await
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ApiError::Api`] carrying the
    /// status, extracted message and body on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(status = status.as_u16(), body = %body, "API request failed");
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: extract_error_message(&body),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}
