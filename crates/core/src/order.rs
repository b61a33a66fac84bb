//! Order placement payloads (`POST /orders`).

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::types::DbId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: DbId,
    #[validate(range(min = 1, max = 10_000))]
    pub quantity: u32,
    #[validate(range(min = 0.0))]
    pub unit_price: f64,
}

impl OrderItem {
    pub fn subtotal(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "an order needs at least one item"), nested)]
    pub items: Vec<OrderItem>,
    #[validate(length(min = 1, max = 500))]
    pub shipping_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl CreateOrderRequest {
    pub fn total(&self) -> f64 {
        self.items.iter().map(OrderItem::subtotal).sum()
    }

    /// Validate and trim before submission.
    pub fn prepare(mut self) -> Result<Self, CoreError> {
        self.shipping_address = self.shipping_address.trim().to_string();
        self.notes = self
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self.validate()?;
        Ok(self)
    }
}
