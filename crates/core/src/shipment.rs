//! Order/shipment records as returned by the orders API.
//!
//! Field names follow the API's camelCase JSON. The current `status` is
//! kept as the raw wire string so that codes unknown to this client still
//! decode and render through the registry fallback.

use serde::{Deserialize, Serialize};

use crate::status::{get_client_status, get_status_phase, PhaseProgress, ShipmentStatus, StatusDescriptor};
use crate::types::{wire_date, DbId, Timestamp};

/// Who may see a shipment event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    /// Staff-only; hidden from client dashboards. Not a security boundary.
    Internal,
    /// A value this client does not know; treated like `Internal`.
    #[serde(other)]
    Unknown,
}

impl Visibility {
    pub fn is_public(self) -> bool {
        self == Visibility::Public
    }
}

/// Missing, null and unrecognised values all land on a variant.
fn lenient_visibility<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Visibility, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .map(|v| Visibility::deserialize(v).unwrap_or(Visibility::Unknown))
        .unwrap_or_default())
}

/// The agent who recorded an event. The API sends either a bare name or
/// a user object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentRef {
    Name(String),
    User {
        #[serde(default)]
        id: Option<DbId>,
        #[serde(default)]
        name: Option<String>,
    },
}

impl AgentRef {
    pub fn display_name(&self) -> Option<&str> {
        match self {
            AgentRef::Name(name) => Some(name.as_str()),
            AgentRef::User { name, .. } => name.as_deref(),
        }
    }
}

/// Immutable history entry created server-side on every status update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentEvent {
    pub id: DbId,
    pub status: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// `None` when the server sent no usable date.
    #[serde(default, with = "wire_date::lenient")]
    pub event_date: Option<Timestamp>,
    #[serde(default, deserialize_with = "lenient_visibility")]
    pub visibility: Visibility,
    #[serde(default)]
    pub agent: Option<AgentRef>,
}

impl ShipmentEvent {
    pub fn descriptor(&self) -> StatusDescriptor {
        get_client_status(&self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// Photo evidence tied to a specific event.
    Proof,
    Document,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default)]
    pub id: Option<DbId>,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    #[serde(default)]
    pub shipment_event_id: Option<DbId>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Attachment {
    /// Whether this attachment is a proof photo of the given event.
    pub fn is_proof_of(&self, event_id: DbId) -> bool {
        self.kind == AttachmentKind::Proof && self.shipment_event_id == Some(event_id)
    }
}

/// Entry of the legacy precomputed step list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineStep {
    pub label: String,
    #[serde(default, with = "wire_date::option")]
    pub date: Option<Timestamp>,
    #[serde(default)]
    pub completed: bool,
}

/// Aggregate root for one shipment/order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: DbId,
    #[serde(default)]
    pub tracking_number: String,
    pub status: String,
    #[serde(default)]
    pub events: Vec<ShipmentEvent>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub timeline: Vec<TimelineStep>,
    #[serde(default)]
    pub current_step: u32,
    #[serde(default)]
    pub bl_number: Option<String>,
    #[serde(default)]
    pub bsc_number: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default, with = "wire_date::option")]
    pub created_at: Option<Timestamp>,
    #[serde(default, with = "wire_date::option")]
    pub updated_at: Option<Timestamp>,
}

impl Order {
    /// The current status if this client knows the code.
    pub fn status_code(&self) -> Option<ShipmentStatus> {
        ShipmentStatus::from_code(&self.status)
    }

    pub fn descriptor(&self) -> StatusDescriptor {
        get_client_status(&self.status)
    }

    pub fn phase_progress(&self) -> PhaseProgress {
        get_status_phase(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Phase;

    const ORDER_JSON: &str = r#"{
        "id": 7,
        "trackingNumber": "FR-2024-0007",
        "status": "EN_MER",
        "events": [
            {"id": 1, "status": "RAMASSAGE", "eventDate": "2024-01-01", "agent": "Moussa"},
            {"id": 2, "status": "EN_MER", "eventDate": "2024-01-03T08:00:00Z",
             "visibility": "internal", "agent": {"id": 4, "name": "Awa"}}
        ],
        "attachments": [
            {"id": 11, "url": "/uploads/p1.jpg", "type": "proof", "shipmentEventId": 2},
            {"url": "/uploads/invoice.pdf", "type": "invoice"}
        ],
        "currentStep": 2,
        "blNumber": "BL-99"
    }"#;

    #[test]
    fn decodes_api_order() {
        let order: Order = serde_json::from_str(ORDER_JSON).unwrap();
        assert_eq!(order.id, 7);
        assert_eq!(order.status_code(), Some(ShipmentStatus::EnMer));
        assert_eq!(order.events.len(), 2);
        assert_eq!(order.events[0].visibility, Visibility::Public);
        assert_eq!(order.events[1].visibility, Visibility::Internal);
        assert_eq!(order.events[0].agent.as_ref().and_then(|a| a.display_name()), Some("Moussa"));
        assert_eq!(order.events[1].agent.as_ref().and_then(|a| a.display_name()), Some("Awa"));
        assert_eq!(order.bl_number.as_deref(), Some("BL-99"));
        assert!(order.timeline.is_empty());
    }

    #[test]
    fn unknown_attachment_type_decodes_as_other() {
        let order: Order = serde_json::from_str(ORDER_JSON).unwrap();
        assert_eq!(order.attachments[1].kind, AttachmentKind::Other);
        assert!(order.attachments[0].is_proof_of(2));
        assert!(!order.attachments[0].is_proof_of(1));
    }

    #[test]
    fn odd_event_fields_do_not_break_the_order() {
        let json = r#"{
            "id": 3,
            "status": "EN_MER",
            "events": [
                {"id": 1, "status": "RAMASSAGE", "eventDate": null, "visibility": null},
                {"id": 2, "status": "EN_MER", "eventDate": "pas une date", "visibility": "private"},
                {"id": 3, "status": "EN_MER", "eventDate": 1704067200, "visibility": 2},
                {"id": 4, "status": "EN_MER"}
            ]
        }"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.events.len(), 4);
        assert!(order.events.iter().all(|e| e.event_date.is_none()));
        assert_eq!(order.events[0].visibility, Visibility::Public);
        assert_eq!(order.events[1].visibility, Visibility::Unknown);
        assert_eq!(order.events[2].visibility, Visibility::Unknown);
        assert_eq!(order.events[3].visibility, Visibility::Public);
        assert!(!order.events[1].visibility.is_public());
    }

    #[test]
    fn unknown_status_still_decodes() {
        let order: Order =
            serde_json::from_str(r#"{"id": 1, "status": "EN_ATTENTE_PAIEMENT"}"#).unwrap();
        assert_eq!(order.status_code(), None);
        assert_eq!(order.descriptor().phase, Phase::Traitement);
        assert_eq!(order.phase_progress().progress, 0);
    }
}
