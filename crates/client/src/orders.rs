//! Order views and the operator status-update flow.
//!
//! [`OrderService`] keeps a per-view [`OrderCache`] and talks to the
//! server through an [`OrderBackend`], so tests can substitute a fake.
//! Each service instance is independent: two views never reconcile their
//! caches.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use fret_core::error::CoreError;
use fret_core::order::CreateOrderRequest;
use fret_core::shipment::{Order, Visibility};
use fret_core::status::ShipmentStatus;
use fret_core::types::DbId;
use fret_core::update::{NewAttachment, StatusChange, StatusUpdateRequest, MAX_ATTACHMENTS_PER_UPDATE};
use fret_core::upload::{UploadKind, UploadedFile};
use tokio::sync::RwLock;

use crate::api::{ApiClient, ApiError};

/// Which order list a view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    /// `GET /orders`: the signed-in client's orders.
    Mine,
    /// `GET /orders/all`: staff view.
    All,
}

/// Server operations the order views need.
#[async_trait]
pub trait OrderBackend: Send + Sync {
    async fn fetch_orders(&self, scope: OrderScope) -> Result<Vec<Order>, ApiError>;
    async fn track(&self, tracking_number: &str) -> Result<Order, ApiError>;
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order, ApiError>;
    async fn upload_photo(&self, path: &Path) -> Result<UploadedFile, ApiError>;
    async fn submit_status(
        &self,
        order_id: DbId,
        request: &StatusUpdateRequest,
    ) -> Result<Order, ApiError>;
}

#[async_trait]
impl OrderBackend for ApiClient {
    async fn fetch_orders(&self, scope: OrderScope) -> Result<Vec<Order>, ApiError> {
        match scope {
            OrderScope::Mine => self.list_orders().await,
            OrderScope::All => self.list_all_orders().await,
        }
    }

    async fn track(&self, tracking_number: &str) -> Result<Order, ApiError> {
        ApiClient::track(self, tracking_number).await
    }

    async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order, ApiError> {
        ApiClient::create_order(self, request).await
    }

    async fn upload_photo(&self, path: &Path) -> Result<UploadedFile, ApiError> {
        self.upload(UploadKind::Image, path).await
    }

    async fn submit_status(
        &self,
        order_id: DbId,
        request: &StatusUpdateRequest,
    ) -> Result<Order, ApiError> {
        self.update_status(order_id, request).await
    }
}

/// Orders held by one view, in server order.
#[derive(Debug, Default, Clone)]
pub struct OrderCache {
    orders: Vec<Order>,
}

impl OrderCache {
    pub fn replace_all(&mut self, orders: Vec<Order>) {
        self.orders = orders;
    }

    /// Swap in a server copy of one order (last write wins). Returns the
    /// previous copy, if any.
    pub fn replace(&mut self, order: Order) -> Option<Order> {
        match self.orders.iter_mut().find(|o| o.id == order.id) {
            Some(slot) => Some(std::mem::replace(slot, order)),
            None => {
                self.orders.push(order);
                None
            }
        }
    }

    pub fn get(&self, id: DbId) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == id)
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

/// Operator input for one status update.
///
/// Photos move from `photos` to `uploaded` as they are uploaded, so a
/// draft handed back after a failure can be resubmitted without
/// re-uploading.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusDraft {
    pub status: ShipmentStatus,
    pub location: Option<String>,
    pub comment: Option<String>,
    pub visibility: Visibility,
    pub bl_number: Option<String>,
    pub bsc_number: Option<String>,
    /// Local photos still to upload.
    pub photos: Vec<PathBuf>,
    /// URLs of photos already uploaded.
    pub uploaded: Vec<String>,
}

impl StatusDraft {
    pub fn new(status: ShipmentStatus) -> Self {
        Self {
            status,
            location: None,
            comment: None,
            visibility: Visibility::Public,
            bl_number: None,
            bsc_number: None,
            photos: Vec::new(),
            uploaded: Vec::new(),
        }
    }

    fn to_request(&self) -> StatusUpdateRequest {
        let mut request = StatusUpdateRequest::new(self.status)
            .with_visibility(self.visibility)
            .with_references(self.bl_number.clone(), self.bsc_number.clone());
        if let Some(location) = &self.location {
            request = request.with_location(location.clone());
        }
        if let Some(comment) = &self.comment {
            request = request.with_comment(comment.clone());
        }
        for url in &self.uploaded {
            request.push_attachment(NewAttachment::proof(url.clone()));
        }
        request
    }
}

/// A failed status update, carrying the draft with every photo uploaded
/// so far moved to [`StatusDraft::uploaded`].
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct UpdateStatusError {
    #[source]
    pub source: ApiError,
    pub draft: StatusDraft,
}

impl UpdateStatusError {
    pub fn user_message(&self) -> String {
        self.source.user_message()
    }
}

/// Order list, tracking and status updates for one view.
pub struct OrderService {
    backend: Arc<dyn OrderBackend>,
    cache: RwLock<OrderCache>,
}

impl OrderService {
    pub fn new(backend: Arc<dyn OrderBackend>) -> Self {
        Self {
            backend,
            cache: RwLock::new(OrderCache::default()),
        }
    }

    /// Fetch the order list and replace the cache with it.
    pub async fn refresh(&self, scope: OrderScope) -> Result<Vec<Order>, ApiError> {
        let orders = self.backend.fetch_orders(scope).await?;
        tracing::debug!(count = orders.len(), ?scope, "Orders loaded");
        self.cache.write().await.replace_all(orders.clone());
        Ok(orders)
    }

    /// Look up an order by tracking number and cache it.
    pub async fn track(&self, tracking_number: &str) -> Result<Order, ApiError> {
        let order = self.backend.track(tracking_number).await?;
        self.cache.write().await.replace(order.clone());
        Ok(order)
    }

    /// Validate and place a new order.
    pub async fn place_order(&self, request: CreateOrderRequest) -> Result<Order, ApiError> {
        let request = request.prepare()?;
        let order = self.backend.create_order(&request).await?;
        tracing::info!(order_id = order.id, total = request.total(), "Order placed");
        self.cache.write().await.replace(order.clone());
        Ok(order)
    }

    pub async fn cached(&self, order_id: DbId) -> Option<Order> {
        self.cache.read().await.get(order_id).cloned()
    }

    pub async fn cached_orders(&self) -> Vec<Order> {
        self.cache.read().await.orders().to_vec()
    }

    /// Upload the draft's photos one at a time, submit the update and
    /// replace the cached order with the server's response.
    ///
    /// Any status may follow any other; moving back to an earlier phase
    /// is only logged. On failure the returned error holds the draft with
    /// the photos uploaded so far.
    pub async fn update_status(
        &self,
        order_id: DbId,
        mut draft: StatusDraft,
    ) -> Result<Order, UpdateStatusError> {
        let photo_count = draft.photos.len() + draft.uploaded.len();
        if photo_count > MAX_ATTACHMENTS_PER_UPDATE {
            let err = CoreError::Validation(format!(
                "at most {MAX_ATTACHMENTS_PER_UPDATE} photos per update, got {photo_count}"
            ));
            return Err(UpdateStatusError {
                source: err.into(),
                draft,
            });
        }
        // Fail on text fields before spending uploads.
        if let Err(e) = draft.to_request().prepare() {
            return Err(UpdateStatusError {
                source: e.into(),
                draft,
            });
        }

        if let Some(current) = self.cached(order_id).await {
            let change = StatusChange::new(&current.status, draft.status);
            if change.is_regression() {
                tracing::warn!(
                    order_id,
                    from = %current.status,
                    to = %draft.status,
                    "Status update moves the shipment back to an earlier phase",
                );
            }
        }

        while !draft.photos.is_empty() {
            let path = draft.photos[0].clone();
            match self.backend.upload_photo(&path).await {
                Ok(file) => {
                    tracing::debug!(order_id, path = %path.display(), url = %file.url, "Photo uploaded");
                    draft.photos.remove(0);
                    draft.uploaded.push(file.url);
                }
                Err(source) => {
                    tracing::warn!(
                        order_id,
                        path = %path.display(),
                        error = %source,
                        uploaded = draft.uploaded.len(),
                        "Photo upload failed",
                    );
                    return Err(UpdateStatusError { source, draft });
                }
            }
        }

        let request = match draft.to_request().prepare() {
            Ok(request) => request,
            Err(e) => {
                return Err(UpdateStatusError {
                    source: e.into(),
                    draft,
                })
            }
        };

        match self.backend.submit_status(order_id, &request).await {
            Ok(order) => {
                tracing::info!(
                    order_id,
                    status = %request.status,
                    attachments = request.attachments.len(),
                    "Shipment status updated",
                );
                self.cache.write().await.replace(order.clone());
                Ok(order)
            }
            Err(source) => Err(UpdateStatusError { source, draft }),
        }
    }
}
