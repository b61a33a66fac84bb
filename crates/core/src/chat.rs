//! Chat entities and the client-side conversation store.
//!
//! [`ChatStore`] keeps the conversation list ordered by last activity,
//! per-conversation histories ordered by `createdAt`, unread counters
//! and optimistic copies of messages the user sent but the server has
//! not echoed yet. It holds no connection; the socket layer feeds it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::roles::Role;
use crate::types::{wire_date, DbId, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUser {
    pub id: DbId,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

impl ChatUser {
    /// Parsed role, `None` when absent or not one this client knows.
    pub fn role(&self) -> Option<Role> {
        self.role.as_deref().and_then(|r| r.parse().ok())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Audio,
    Pdf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Server id; `None` while the message is only known locally.
    #[serde(default)]
    pub id: Option<DbId>,
    pub conversation_id: DbId,
    pub sender_id: DbId,
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(with = "wire_date")]
    pub created_at: Timestamp,
    #[serde(default)]
    pub read: bool,
    /// Local correlation id of an optimistic send.
    #[serde(skip)]
    pub local_ref: Option<Uuid>,
}

impl ChatMessage {
    pub fn is_pending(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: DbId,
    #[serde(default)]
    pub participants: Vec<ChatUser>,
    #[serde(default)]
    pub last_message: Option<ChatMessage>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default, with = "wire_date::option")]
    pub updated_at: Option<Timestamp>,
}

impl Conversation {
    fn placeholder(id: DbId) -> Self {
        Self {
            id,
            participants: Vec::new(),
            last_message: None,
            unread_count: 0,
            updated_at: None,
        }
    }

    /// Timestamp used to order the conversation list.
    pub fn last_activity(&self) -> Option<Timestamp> {
        match (&self.last_message, self.updated_at) {
            (Some(m), Some(u)) => Some(m.created_at.max(u)),
            (Some(m), None) => Some(m.created_at),
            (None, u) => u,
        }
    }

    /// First participant that is not `me`.
    pub fn peer(&self, me: DbId) -> Option<&ChatUser> {
        self.participants.iter().find(|p| p.id != me)
    }
}

/// What [`ChatStore::receive`] did with an incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// New message added to the history.
    Appended,
    /// Server echo of one of our optimistic sends.
    Confirmed,
    /// Already known by server id.
    Duplicate,
}

#[derive(Debug)]
pub struct ChatStore {
    me: DbId,
    conversations: Vec<Conversation>,
    histories: HashMap<DbId, Vec<ChatMessage>>,
    active: Option<DbId>,
}

impl ChatStore {
    pub fn new(me: DbId) -> Self {
        Self {
            me,
            conversations: Vec::new(),
            histories: HashMap::new(),
            active: None,
        }
    }

    pub fn me(&self) -> DbId {
        self.me
    }

    /// Replace the conversation list with a fresh server copy.
    pub fn set_conversations(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
        if let Some(active) = self.active {
            if let Some(conv) = self.conversation_mut(active) {
                conv.unread_count = 0;
            }
        }
        self.sort_conversations();
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversation(&self, id: DbId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    /// Add or replace a single conversation (e.g. after `POST /chat/initiate`).
    pub fn upsert_conversation(&mut self, conversation: Conversation) {
        match self.conversation_mut(conversation.id) {
            Some(existing) => *existing = conversation,
            None => self.conversations.push(conversation),
        }
        self.sort_conversations();
    }

    /// Make `id` the active conversation and clear its unread counter.
    pub fn open(&mut self, id: DbId) -> Result<(), CoreError> {
        let conv = self.conversation_mut(id).ok_or(CoreError::NotFound {
            entity: "conversation",
            id,
        })?;
        conv.unread_count = 0;
        if let Some(history) = self.histories.get_mut(&id) {
            for msg in history.iter_mut().filter(|m| m.sender_id != self.me) {
                msg.read = true;
            }
        }
        self.active = Some(id);
        Ok(())
    }

    pub fn active(&self) -> Option<DbId> {
        self.active
    }

    /// Replace a conversation's history with the server copy.
    ///
    /// Optimistic messages not yet echoed are kept at the end.
    pub fn set_history(&mut self, conversation_id: DbId, mut messages: Vec<ChatMessage>) {
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let pending: Vec<ChatMessage> = self
            .histories
            .remove(&conversation_id)
            .unwrap_or_default()
            .into_iter()
            .filter(ChatMessage::is_pending)
            .collect();
        messages.extend(pending);
        self.histories.insert(conversation_id, messages);
    }

    pub fn messages(&self, conversation_id: DbId) -> &[ChatMessage] {
        self.histories
            .get(&conversation_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Record a message the user is about to send and return it for the
    /// socket layer. The copy stays pending until the server echo arrives.
    pub fn compose(
        &mut self,
        conversation_id: DbId,
        content: impl Into<String>,
        kind: MessageKind,
        now: Timestamp,
    ) -> ChatMessage {
        let message = ChatMessage {
            id: None,
            conversation_id,
            sender_id: self.me,
            content: content.into(),
            kind,
            created_at: now,
            read: true,
            local_ref: Some(Uuid::new_v4()),
        };
        self.insert_ordered(message.clone());
        self.touch(&message);
        message
    }

    /// Apply a message pushed by the server.
    pub fn receive(&mut self, message: ChatMessage) -> ReceiveOutcome {
        let conversation_id = message.conversation_id;
        let history = self.histories.entry(conversation_id).or_default();

        if let Some(id) = message.id {
            if history.iter().any(|m| m.id == Some(id)) {
                return ReceiveOutcome::Duplicate;
            }
        }

        if message.sender_id == self.me {
            let pending = history.iter().position(|m| {
                m.is_pending() && m.sender_id == message.sender_id && m.content == message.content
            });
            if let Some(pos) = pending {
                // Re-sorted on the server timestamp.
                let local_ref = history.remove(pos).local_ref;
                self.insert_ordered(ChatMessage {
                    local_ref,
                    ..message.clone()
                });
                self.touch(&message);
                return ReceiveOutcome::Confirmed;
            }
        }

        let from_peer = message.sender_id != self.me;
        self.insert_ordered(message.clone());
        self.touch(&message);

        if from_peer && self.active != Some(conversation_id) {
            if let Some(conv) = self.conversation_mut(conversation_id) {
                conv.unread_count += 1;
            }
        }
        ReceiveOutcome::Appended
    }

    pub fn total_unread(&self) -> u32 {
        self.conversations.iter().map(|c| c.unread_count).sum()
    }

    // ---- private helpers ----

    fn conversation_mut(&mut self, id: DbId) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    fn insert_ordered(&mut self, message: ChatMessage) {
        let history = self.histories.entry(message.conversation_id).or_default();
        let pos = history.partition_point(|m| m.created_at <= message.created_at);
        history.insert(pos, message);
    }

    /// Update the conversation's last message and bring it to the top.
    fn touch(&mut self, message: &ChatMessage) {
        if self.conversation_mut(message.conversation_id).is_none() {
            self.conversations
                .push(Conversation::placeholder(message.conversation_id));
        }
        if let Some(conv) = self.conversation_mut(message.conversation_id) {
            let newer = conv
                .last_message
                .as_ref()
                .map_or(true, |last| last.created_at <= message.created_at);
            if newer {
                conv.last_message = Some(message.clone());
            }
        }
        self.sort_conversations();
    }

    fn sort_conversations(&mut self) {
        self.conversations
            .sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::wire_date;
    use assert_matches::assert_matches;

    const ME: DbId = 1;
    const PEER: DbId = 2;

    fn ts(raw: &str) -> Timestamp {
        wire_date::parse(raw).unwrap()
    }

    fn msg(id: DbId, conversation_id: DbId, sender_id: DbId, content: &str, at: &str) -> ChatMessage {
        ChatMessage {
            id: Some(id),
            conversation_id,
            sender_id,
            content: content.to_string(),
            kind: MessageKind::Text,
            created_at: ts(at),
            read: false,
            local_ref: None,
        }
    }

    fn conv(id: DbId, updated_at: &str) -> Conversation {
        Conversation {
            id,
            participants: vec![
                ChatUser { id: ME, name: "Me".into(), role: Some("client".into()) },
                ChatUser { id: PEER, name: "Agent".into(), role: Some("agent".into()) },
            ],
            last_message: None,
            unread_count: 0,
            updated_at: Some(ts(updated_at)),
        }
    }

    fn store() -> ChatStore {
        let mut store = ChatStore::new(ME);
        store.set_conversations(vec![conv(10, "2024-01-01T00:00:00Z"), conv(20, "2024-01-02T00:00:00Z")]);
        store
    }

    #[test]
    fn conversations_sorted_by_activity() {
        let s = store();
        let ids: Vec<DbId> = s.conversations().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![20, 10]);
    }

    #[test]
    fn peer_message_on_inactive_conversation_counts_unread() {
        let mut s = store();
        let outcome = s.receive(msg(100, 10, PEER, "bonjour", "2024-01-03T00:00:00Z"));
        assert_eq!(outcome, ReceiveOutcome::Appended);
        assert_eq!(s.conversation(10).unwrap().unread_count, 1);
        assert_eq!(s.total_unread(), 1);
        assert_eq!(s.conversations()[0].id, 10);
    }

    #[test]
    fn active_conversation_does_not_count_unread() {
        let mut s = store();
        s.open(10).unwrap();
        s.receive(msg(100, 10, PEER, "bonjour", "2024-01-03T00:00:00Z"));
        assert_eq!(s.total_unread(), 0);
    }

    #[test]
    fn open_clears_unread_and_marks_read() {
        let mut s = store();
        s.receive(msg(100, 10, PEER, "a", "2024-01-03T00:00:00Z"));
        s.receive(msg(101, 10, PEER, "b", "2024-01-03T00:01:00Z"));
        assert_eq!(s.conversation(10).unwrap().unread_count, 2);
        s.open(10).unwrap();
        assert_eq!(s.conversation(10).unwrap().unread_count, 0);
        assert!(s.messages(10).iter().all(|m| m.read));
    }

    #[test]
    fn upsert_adds_then_replaces() {
        let mut s = store();
        s.upsert_conversation(conv(30, "2024-01-03T00:00:00Z"));
        assert_eq!(s.conversations()[0].id, 30);

        let mut older = conv(30, "2023-12-31T00:00:00Z");
        older.unread_count = 4;
        s.upsert_conversation(older);
        assert_eq!(s.conversations().len(), 3);
        assert_eq!(s.conversations()[2].id, 30);
        assert_eq!(s.total_unread(), 4);
    }

    #[test]
    fn open_unknown_conversation_fails() {
        let mut s = store();
        assert_matches!(s.open(99), Err(CoreError::NotFound { id: 99, .. }));
    }

    #[test]
    fn duplicates_are_ignored() {
        let mut s = store();
        s.receive(msg(100, 10, PEER, "a", "2024-01-03T00:00:00Z"));
        let outcome = s.receive(msg(100, 10, PEER, "a", "2024-01-03T00:00:00Z"));
        assert_eq!(outcome, ReceiveOutcome::Duplicate);
        assert_eq!(s.messages(10).len(), 1);
        assert_eq!(s.conversation(10).unwrap().unread_count, 1);
    }

    #[test]
    fn late_message_inserted_in_time_order() {
        let mut s = store();
        s.receive(msg(1, 10, PEER, "second", "2024-01-03T00:02:00Z"));
        s.receive(msg(2, 10, PEER, "first", "2024-01-03T00:01:00Z"));
        let contents: Vec<&str> = s.messages(10).iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
        assert_eq!(s.conversation(10).unwrap().last_message.as_ref().unwrap().content, "second");
    }

    #[test]
    fn echo_confirms_optimistic_send() {
        let mut s = store();
        let sent = s.compose(10, "on arrive", MessageKind::Text, ts("2024-01-03T00:00:00Z"));
        assert!(sent.is_pending());
        assert_eq!(s.messages(10).len(), 1);

        let outcome = s.receive(msg(500, 10, ME, "on arrive", "2024-01-03T00:00:01Z"));
        assert_eq!(outcome, ReceiveOutcome::Confirmed);
        assert_eq!(s.messages(10).len(), 1);
        assert_eq!(s.messages(10)[0].id, Some(500));
        assert_eq!(s.messages(10)[0].local_ref, sent.local_ref);
        assert_eq!(s.total_unread(), 0);
    }

    #[test]
    fn echo_after_peer_message_keeps_time_order() {
        let mut s = store();
        let sent = s.compose(10, "mine", MessageKind::Text, ts("2024-01-03T00:00:00Z"));
        s.receive(msg(7, 10, PEER, "theirs", "2024-01-03T00:00:01Z"));
        s.receive(msg(8, 10, ME, "mine", "2024-01-03T00:00:02Z"));

        let ids: Vec<Option<DbId>> = s.messages(10).iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![Some(7), Some(8)]);
        assert!(s.messages(10).windows(2).all(|w| w[0].created_at <= w[1].created_at));
        assert_eq!(s.messages(10)[1].local_ref, sent.local_ref);
    }

    #[test]
    fn message_for_unknown_conversation_creates_placeholder() {
        let mut s = store();
        s.receive(msg(1, 77, PEER, "new thread", "2024-01-05T00:00:00Z"));
        assert_eq!(s.conversations()[0].id, 77);
        assert_eq!(s.conversation(77).unwrap().unread_count, 1);
    }

    #[test]
    fn set_history_keeps_pending_sends() {
        let mut s = store();
        s.compose(10, "pending", MessageKind::Text, ts("2024-01-04T00:00:00Z"));
        s.set_history(
            10,
            vec![
                msg(2, 10, PEER, "b", "2024-01-02T00:00:00Z"),
                msg(1, 10, PEER, "a", "2024-01-01T00:00:00Z"),
            ],
        );
        let contents: Vec<&str> = s.messages(10).iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b", "pending"]);
    }

    #[test]
    fn decodes_api_message() {
        let json = r#"{"id": 9, "conversationId": 10, "senderId": 2, "content": "/uploads/a.ogg",
                        "type": "audio", "createdAt": "2024-01-03T10:00:00.000Z"}"#;
        let m: ChatMessage = serde_json::from_str(json).unwrap();
        assert_eq!(m.kind, MessageKind::Audio);
        assert!(!m.read);
        assert_eq!(m.local_ref, None);
    }

    #[test]
    fn peer_lookup() {
        let c = conv(1, "2024-01-01");
        assert_eq!(c.peer(ME).unwrap().id, PEER);
        assert_eq!(c.peer(ME).unwrap().role(), Some(Role::Agent));
    }
}
