//! Status-update requests sent by operators.
//!
//! Any of the 14 statuses may be chosen regardless of the current one;
//! there is no transition table. [`StatusChange`] only
//! classifies a change so callers can flag regressions.

use serde::Serialize;
use validator::Validate;

use crate::error::CoreError;
use crate::shipment::{AttachmentKind, Visibility};
use crate::status::ShipmentStatus;

/// Upper bound on photos attached to a single update.
pub const MAX_ATTACHMENTS_PER_UPDATE: usize = 10;

/// An uploaded file referenced by an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewAttachment {
    #[validate(length(min = 1, message = "attachment url must not be empty"))]
    pub url: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
}

impl NewAttachment {
    pub fn proof(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: AttachmentKind::Proof,
        }
    }
}

/// Body of `PUT /orders/:id/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub status: ShipmentStatus,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
    pub visibility: Visibility,
    #[validate(length(max = 10), nested)]
    pub attachments: Vec<NewAttachment>,
    #[validate(length(max = 64))]
    pub bl_number: Option<String>,
    #[validate(length(max = 64))]
    pub bsc_number: Option<String>,
    /// Step cursor kept for older dashboards; always derived from the phase.
    pub current_step: u32,
}

impl StatusUpdateRequest {
    pub fn new(status: ShipmentStatus) -> Self {
        Self {
            status,
            location: None,
            comment: None,
            visibility: Visibility::Public,
            attachments: Vec::new(),
            bl_number: None,
            bsc_number: None,
            current_step: step_for(status),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_references(mut self, bl_number: Option<String>, bsc_number: Option<String>) -> Self {
        self.bl_number = bl_number;
        self.bsc_number = bsc_number;
        self
    }

    pub fn push_attachment(&mut self, attachment: NewAttachment) {
        self.attachments.push(attachment);
    }

    /// Trim free-text fields, drop blank ones and validate lengths.
    ///
    /// Returns the request ready to submit.
    pub fn prepare(mut self) -> Result<Self, CoreError> {
        self.location = normalize(self.location);
        self.comment = normalize(self.comment);
        self.bl_number = normalize(self.bl_number);
        self.bsc_number = normalize(self.bsc_number);
        self.current_step = step_for(self.status);
        self.validate()?;
        Ok(self)
    }
}

/// 1-based position of the status's phase in the four-phase sequence.
pub fn step_for(status: ShipmentStatus) -> u32 {
    status.phase().index().map(|i| i as u32 + 1).unwrap_or(0)
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Classification of a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    /// `None` when the current status is unknown to this client.
    pub from: Option<ShipmentStatus>,
    pub to: ShipmentStatus,
}

impl StatusChange {
    pub fn new(current: &str, to: ShipmentStatus) -> Self {
        Self {
            from: ShipmentStatus::from_code(current),
            to,
        }
    }

    /// The new status sits in an earlier phase than the current one.
    pub fn is_regression(&self) -> bool {
        match (self.from.and_then(|f| f.phase().index()), self.to.phase().index()) {
            (Some(from), Some(to)) => to < from,
            _ => false,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.from == Some(self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn new_derives_current_step_from_phase() {
        assert_eq!(StatusUpdateRequest::new(ShipmentStatus::DossierOuvert).current_step, 1);
        assert_eq!(StatusUpdateRequest::new(ShipmentStatus::ArriveePort).current_step, 2);
        assert_eq!(StatusUpdateRequest::new(ShipmentStatus::Cotation).current_step, 3);
        assert_eq!(StatusUpdateRequest::new(ShipmentStatus::Livre).current_step, 4);
    }

    #[test]
    fn prepare_trims_and_drops_blank_fields() {
        let req = StatusUpdateRequest::new(ShipmentStatus::EnMer)
            .with_location("  Port de Dakar ")
            .with_comment("   ")
            .prepare()
            .unwrap();
        assert_eq!(req.location.as_deref(), Some("Port de Dakar"));
        assert_eq!(req.comment, None);
    }

    #[test]
    fn prepare_rejects_long_comment() {
        let req = StatusUpdateRequest::new(ShipmentStatus::EnMer).with_comment("x".repeat(2001));
        assert_matches!(req.prepare(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn prepare_rejects_empty_attachment_url() {
        let mut req = StatusUpdateRequest::new(ShipmentStatus::Livre);
        req.push_attachment(NewAttachment::proof(""));
        assert_matches!(req.prepare(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn prepare_rejects_too_many_attachments() {
        let mut req = StatusUpdateRequest::new(ShipmentStatus::Livre);
        for i in 0..=MAX_ATTACHMENTS_PER_UPDATE {
            req.push_attachment(NewAttachment::proof(format!("/p{i}.jpg")));
        }
        assert_matches!(req.prepare(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn request_serializes_wire_shape() {
        let mut req = StatusUpdateRequest::new(ShipmentStatus::VisiteScanner)
            .with_visibility(Visibility::Internal)
            .with_references(Some("BL-1".into()), None);
        req.push_attachment(NewAttachment::proof("/uploads/x.jpg"));
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["status"], "VISITE_SCANNER");
        assert_eq!(value["visibility"], "internal");
        assert_eq!(value["blNumber"], "BL-1");
        assert!(value["bscNumber"].is_null());
        assert_eq!(value["currentStep"], 3);
        assert_eq!(value["attachments"][0]["type"], "proof");
    }

    #[test]
    fn regression_detected_across_phases() {
        assert!(StatusChange::new("LIVRE", ShipmentStatus::DossierOuvert).is_regression());
        assert!(!StatusChange::new("RAMASSAGE", ShipmentStatus::EnMer).is_regression());
    }

    #[test]
    fn same_phase_moves_are_not_regressions() {
        assert!(!StatusChange::new("EMBARQUEMENT", ShipmentStatus::Ramassage).is_regression());
    }

    #[test]
    fn unknown_current_status_never_regresses() {
        let change = StatusChange::new("SOMETHING_NEW", ShipmentStatus::DossierOuvert);
        assert_eq!(change.from, None);
        assert!(!change.is_regression());
    }

    #[test]
    fn noop_change() {
        assert!(StatusChange::new("EN_MER", ShipmentStatus::EnMer).is_noop());
    }
}
