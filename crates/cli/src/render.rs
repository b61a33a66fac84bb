//! Plain-text rendering of dashboards, tables and chat lines.
//!
//! Every function returns a `String` so output can be asserted on.

use std::fmt::Write;

use fret_core::chat::{ChatMessage, ChatStore, Conversation};
use fret_core::connection::ConnectionState;
use fret_core::roles::Role;
use fret_core::shipment::Order;
use fret_core::status::ShipmentStatus;
use fret_core::timeline::{self, ShipmentView, StepState};
use fret_core::types::{DbId, Timestamp};

const BAR_WIDTH: usize = 20;

fn date(ts: &Timestamp) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

/// `[##########----------] 50%`
pub fn progress_bar(progress: u8) -> String {
    let filled = usize::from(progress.min(100)) * BAR_WIDTH / 100;
    format!(
        "[{}{}] {progress}%",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled)
    )
}

/// Full tracking dashboard of one shipment.
pub fn shipment_view(view: &ShipmentView) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}  {} ({})  [{}]",
        view.tracking_number, view.badge.text, view.badge.phase, view.badge.color
    );
    let _ = writeln!(out, "{}", progress_bar(view.progress));

    let steps: Vec<String> = view
        .phases
        .iter()
        .map(|step| {
            let mark = match step.state {
                StepState::Done => "[x]",
                StepState::Current => "[>]",
                StepState::Pending => "[ ]",
            };
            match &step.reached_at {
                Some(at) => format!("{mark} {} ({})", step.phase, at.format("%d/%m")),
                None => format!("{mark} {}", step.phase),
            }
        })
        .collect();
    let _ = writeln!(out, "{}", steps.join("  "));

    if view.events.is_empty() {
        let _ = writeln!(out, "Aucun événement.");
        return out;
    }

    let _ = writeln!(out);
    for entry in &view.events {
        let event = &entry.event;
        let when = event.event_date.as_ref().map_or_else(|| "date inconnue".to_string(), date);
        let _ = write!(out, "{when}  {}", entry.descriptor.client_title);
        if let Some(location) = &event.location {
            let _ = write!(out, "  @ {location}");
        }
        if let Some(marker) = entry.marker {
            let _ = write!(out, "  ({marker})");
        }
        let _ = writeln!(out);
        if let Some(comment) = &event.comment {
            let _ = writeln!(out, "    {comment}");
        }
        for photo in &entry.photos {
            let _ = writeln!(out, "    photo: {}", photo.url);
        }
    }
    out
}

/// One line per order: id, tracking number, status and progress.
pub fn order_list(orders: &[Order], role: Role) -> String {
    if orders.is_empty() {
        return "Aucune commande.\n".to_string();
    }
    let mut out = String::new();
    for order in orders {
        let descriptor = order.descriptor();
        let progress = order.phase_progress().progress;
        let title = if role.is_logistics_staff() {
            descriptor.label
        } else {
            descriptor.client_title
        };
        let _ = writeln!(
            out,
            "#{:<6} {:<18} {:<30} {:>3}%",
            order.id, order.tracking_number, title, progress
        );
    }
    out
}

/// Reference table of every status code.
pub fn status_table() -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<18} {:<12} {:<22} {}", "CODE", "PHASE", "LABEL", "CLIENT");
    for status in ShipmentStatus::ALL {
        let _ = writeln!(
            out,
            "{:<18} {:<12} {:<22} {}",
            status.as_str(),
            status.phase().as_str(),
            status.label(),
            status.client_title()
        );
    }
    out
}

fn conversation_title(conversation: &Conversation, me: DbId) -> String {
    conversation
        .peer(me)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| format!("Conversation {}", conversation.id))
}

/// Conversation list with unread counters.
pub fn conversation_list(store: &ChatStore) -> String {
    let mut out = String::new();
    for conversation in store.conversations() {
        let title = conversation_title(conversation, store.me());
        let preview = conversation
            .last_message
            .as_ref()
            .map(|m| m.content.as_str())
            .unwrap_or("");
        let unread = if conversation.unread_count > 0 {
            format!(" ({})", conversation.unread_count)
        } else {
            String::new()
        };
        let _ = writeln!(out, "#{:<5} {title}{unread}  {preview}", conversation.id);
    }
    let _ = writeln!(out, "Non lus: {}", store.total_unread());
    out
}

/// A single chat line; own messages are prefixed `moi`.
pub fn message_line(message: &ChatMessage, me: DbId) -> String {
    let who = if message.sender_id == me {
        "moi".to_string()
    } else {
        format!("#{}", message.sender_id)
    };
    let pending = if message.is_pending() { " (envoi...)" } else { "" };
    format!("{} {who}: {}{pending}", date(&message.created_at), message.content)
}

pub fn connection_state(state: ConnectionState) -> String {
    format!("[chat] {state}")
}

/// Convenience: project and render an order for `role`.
pub fn order_dashboard(order: &Order, role: Role) -> String {
    shipment_view(&timeline::project(order, role))
}
