//! Timeline/progress projection shared by every role dashboard.
//!
//! [`project`] turns an [`Order`] into a [`ShipmentView`]: the status
//! badge, the phase-based progress percentage, the four phase steps and
//! the reverse-chronological event log with proof photos. Internal
//! events are filtered here for client-side roles; staff roles keep them
//! with the [`INTERNAL_MARKER`].

use serde::Serialize;

use crate::roles::Role;
use crate::shipment::{Attachment, Order, ShipmentEvent};
use crate::status::{get_client_status, ColorTag, Phase, StatusDescriptor};
use crate::types::{DbId, Timestamp};

/// Badge text attached to internal events on staff dashboards.
pub const INTERNAL_MARKER: &str = "Interne";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBadge {
    pub text: String,
    pub color: ColorTag,
    pub phase: Phase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Done,
    Current,
    Pending,
}

/// One of the four fixed phases, positioned against the current status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseStep {
    pub phase: Phase,
    pub state: StepState,
    /// Earliest visible event whose status belongs to this phase.
    pub reached_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEntry {
    pub event: ShipmentEvent,
    pub descriptor: StatusDescriptor,
    /// `Some("Interne")` for internal events on staff dashboards.
    pub marker: Option<&'static str>,
    pub photos: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentView {
    pub order_id: DbId,
    pub tracking_number: String,
    pub badge: StatusBadge,
    /// Phase-based progress: 0, 25, 50, 75 or 100.
    pub progress: u8,
    pub phases: Vec<PhaseStep>,
    pub events: Vec<EventEntry>,
}

/// Build the dashboard view of `order` for a viewer with `role`.
pub fn project(order: &Order, role: Role) -> ShipmentView {
    let descriptor = order.descriptor();
    let events = visible_events(&order.events, role);

    ShipmentView {
        order_id: order.id,
        tracking_number: order.tracking_number.clone(),
        badge: badge(&descriptor),
        progress: descriptor.phase.progress(),
        phases: phase_steps(descriptor.phase, &events),
        events: events
            .into_iter()
            .map(|event| EventEntry {
                descriptor: event.descriptor(),
                marker: (!event.visibility.is_public()).then_some(INTERNAL_MARKER),
                photos: proof_photos(&order.attachments, event.id),
                event,
            })
            .collect(),
    }
}

pub fn badge(descriptor: &StatusDescriptor) -> StatusBadge {
    StatusBadge {
        text: descriptor.client_title.to_string(),
        color: descriptor.color,
        phase: descriptor.phase,
    }
}

/// Events the role may see, most recent first; undated events go last.
///
/// The sort is stable: events sharing an `eventDate` keep their API order.
pub fn visible_events(events: &[ShipmentEvent], role: Role) -> Vec<ShipmentEvent> {
    let mut visible: Vec<ShipmentEvent> = events
        .iter()
        .filter(|e| role.is_logistics_staff() || e.visibility.is_public())
        .cloned()
        .collect();
    sort_most_recent_first(&mut visible);
    visible
}

pub fn sort_most_recent_first(events: &mut [ShipmentEvent]) {
    events.sort_by(|a, b| b.event_date.cmp(&a.event_date));
}

/// Proof photos attached to one event.
pub fn proof_photos(attachments: &[Attachment], event_id: DbId) -> Vec<Attachment> {
    attachments
        .iter()
        .filter(|a| a.is_proof_of(event_id))
        .cloned()
        .collect()
}

/// Position the four phases relative to `current`.
///
/// With a `Traitement` current phase every step is pending.
pub fn phase_steps(current: Phase, events: &[ShipmentEvent]) -> Vec<PhaseStep> {
    let current_index = current.index();

    Phase::TRACKED
        .iter()
        .enumerate()
        .map(|(i, phase)| {
            let state = match current_index {
                Some(c) if i < c => StepState::Done,
                Some(c) if i == c => StepState::Current,
                _ => StepState::Pending,
            };
            let reached_at = events
                .iter()
                .filter(|e| get_client_status(&e.status).phase == *phase)
                .filter_map(|e| e.event_date)
                .min();
            PhaseStep {
                phase: *phase,
                state,
                reached_at,
            }
        })
        .collect()
}
