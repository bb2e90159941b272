/// Message Store & Reconciler
///
/// Ordered list of messages for the one active conversation. Local optimistic sends and
/// realtime deliveries both land here; identity is the only deduplication key, so an echo
/// of an optimistic send never produces a second entry.
use std::collections::HashSet;
use uuid::Uuid;

use crate::modules::message::schema::{DeliveryStatus, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// New identity, placed at its timestamp position.
    Inserted,
    /// Known identity that was pending or failed and is now confirmed.
    Confirmed,
    /// Known identity, nothing changed.
    Duplicate,
    /// Belongs to another conversation (or no conversation is loaded).
    Rejected,
}

#[derive(Debug, Default)]
pub struct MessageStore {
    conversation_id: Option<Uuid>,
    messages: Vec<Message>,
    ids: HashSet<Uuid>,
    dirty: bool,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation_id(&self) -> Option<Uuid> {
        self.conversation_id
    }

    /// Replace the store wholesale with a freshly loaded history.
    pub fn reset(&mut self, conversation_id: Uuid, history: Vec<Message>) {
        let mut ids = HashSet::with_capacity(history.len());
        let mut messages: Vec<Message> = history
            .into_iter()
            .filter(|m| m.conversation_id == conversation_id && ids.insert(m.id))
            .collect();
        // stable, so equal timestamps keep backend order
        messages.sort_by_key(|m| m.created_at);

        self.conversation_id = Some(conversation_id);
        self.messages = messages;
        self.ids = ids;
        self.dirty = true;
    }

    pub fn clear(&mut self) {
        self.conversation_id = None;
        self.messages.clear();
        self.ids.clear();
        self.dirty = true;
    }

    pub fn insert_optimistic(&mut self, mut message: Message) -> InsertOutcome {
        message.status = DeliveryStatus::Pending;
        self.insert(message)
    }

    /// Insert an authoritative message: a realtime delivery or a local-only message.
    pub fn insert_confirmed(&mut self, mut message: Message) -> InsertOutcome {
        message.status = DeliveryStatus::Confirmed;
        self.insert(message)
    }

    fn insert(&mut self, message: Message) -> InsertOutcome {
        if self.conversation_id != Some(message.conversation_id) {
            return InsertOutcome::Rejected;
        }

        if self.ids.contains(&message.id) {
            if message.status == DeliveryStatus::Confirmed && self.confirm(&message.id) {
                return InsertOutcome::Confirmed;
            }
            return InsertOutcome::Duplicate;
        }

        let at = self.messages.partition_point(|m| m.created_at <= message.created_at);
        self.ids.insert(message.id);
        self.messages.insert(at, message);
        self.dirty = true;
        InsertOutcome::Inserted
    }

    /// Mark a pending or failed entry as confirmed. Returns whether anything changed.
    pub fn confirm(&mut self, id: &Uuid) -> bool {
        self.set_status(id, DeliveryStatus::Confirmed, |s| s != DeliveryStatus::Confirmed)
    }

    /// Mark a pending entry as failed. An entry already confirmed by its echo stays confirmed.
    pub fn mark_failed(&mut self, id: &Uuid) -> bool {
        self.set_status(id, DeliveryStatus::Failed, |s| s == DeliveryStatus::Pending)
    }

    fn set_status(
        &mut self,
        id: &Uuid,
        status: DeliveryStatus,
        applies: impl Fn(DeliveryStatus) -> bool,
    ) -> bool {
        match self.messages.iter_mut().find(|m| m.id == *id) {
            Some(message) if applies(message.status) => {
                message.status = status;
                self.dirty = true;
                true
            }
            _ => false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: &Uuid) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == *id)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether the list changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::message::schema::{MessageKind, MessagePayload};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn message(conversation_id: Uuid, id: Uuid, offset_secs: i64, content: &str) -> Message {
        Message {
            id,
            conversation_id,
            sender_id: Uuid::from_u128(1),
            kind: MessageKind::Text,
            content: Some(content.to_string()),
            payload: MessagePayload::Text,
            created_at: base_time() + Duration::seconds(offset_secs),
            status: DeliveryStatus::Confirmed,
        }
    }

    fn assert_sorted(store: &MessageStore) {
        assert!(store.messages().windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[test]
    fn test_optimistic_then_echo_is_one_message() {
        let conv = Uuid::now_v7();
        let id = Uuid::now_v7();
        let mut store = MessageStore::new();
        store.reset(conv, vec![]);

        assert_eq!(store.insert_optimistic(message(conv, id, 0, "hello")), InsertOutcome::Inserted);
        assert_eq!(store.get(&id).map(|m| m.status), Some(DeliveryStatus::Pending));

        assert_eq!(store.insert_confirmed(message(conv, id, 1, "hello")), InsertOutcome::Confirmed);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&id).map(|m| m.status), Some(DeliveryStatus::Confirmed));

        // a second echo is a no-op
        assert_eq!(store.insert_confirmed(message(conv, id, 1, "hello")), InsertOutcome::Duplicate);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_echo_then_optimistic_is_one_message() {
        let conv = Uuid::now_v7();
        let id = Uuid::now_v7();
        let mut store = MessageStore::new();
        store.reset(conv, vec![]);

        store.insert_confirmed(message(conv, id, 0, "hello"));
        assert_eq!(store.insert_optimistic(message(conv, id, 0, "hello")), InsertOutcome::Duplicate);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&id).map(|m| m.status), Some(DeliveryStatus::Confirmed));
    }

    #[test]
    fn test_out_of_order_arrival_is_sorted() {
        let conv = Uuid::now_v7();
        let mut store = MessageStore::new();
        store.reset(conv, vec![]);

        store.insert_confirmed(message(conv, Uuid::from_u128(3), 30, "c"));
        store.insert_confirmed(message(conv, Uuid::from_u128(1), 10, "a"));
        store.insert_confirmed(message(conv, Uuid::from_u128(2), 20, "b"));

        let contents: Vec<_> =
            store.messages().iter().filter_map(|m| m.content.as_deref()).collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_equal_timestamps_keep_arrival_order() {
        let conv = Uuid::now_v7();
        let mut store = MessageStore::new();
        store.reset(conv, vec![]);

        store.insert_confirmed(message(conv, Uuid::from_u128(9), 5, "first"));
        store.insert_confirmed(message(conv, Uuid::from_u128(1), 5, "second"));

        assert_eq!(store.messages()[0].content.as_deref(), Some("first"));
        assert_eq!(store.messages()[1].content.as_deref(), Some("second"));
    }

    #[test]
    fn test_foreign_conversation_is_rejected() {
        let conv = Uuid::now_v7();
        let other = Uuid::now_v7();
        let mut store = MessageStore::new();

        // nothing loaded yet
        assert_eq!(store.insert_confirmed(message(conv, Uuid::now_v7(), 0, "x")), InsertOutcome::Rejected);

        store.reset(conv, vec![]);
        assert_eq!(store.insert_confirmed(message(other, Uuid::now_v7(), 0, "x")), InsertOutcome::Rejected);
        assert!(store.is_empty());
    }

    #[test]
    fn test_reset_replaces_sorts_and_dedupes() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let mut store = MessageStore::new();
        store.reset(a, vec![]);
        let stale = Uuid::now_v7();
        store.insert_optimistic(message(a, stale, 0, "old"));

        let dup = Uuid::now_v7();
        store.reset(
            b,
            vec![
                message(b, dup, 20, "later"),
                message(b, Uuid::now_v7(), 10, "earlier"),
                message(b, dup, 20, "later"),
                message(a, Uuid::now_v7(), 0, "wrong conversation"),
            ],
        );

        assert_eq!(store.conversation_id(), Some(b));
        assert_eq!(store.len(), 2);
        assert!(!store.contains(&stale));
        assert_eq!(store.messages()[0].content.as_deref(), Some("earlier"));
    }

    #[test]
    fn test_failed_stays_visible_and_echo_confirms() {
        let conv = Uuid::now_v7();
        let id = Uuid::now_v7();
        let mut store = MessageStore::new();
        store.reset(conv, vec![]);
        store.insert_optimistic(message(conv, id, 0, "hello"));

        assert!(store.mark_failed(&id));
        assert_eq!(store.get(&id).map(|m| m.status), Some(DeliveryStatus::Failed));
        assert_eq!(store.len(), 1);

        assert_eq!(store.insert_confirmed(message(conv, id, 0, "hello")), InsertOutcome::Confirmed);
        // confirmed entries never regress to failed
        assert!(!store.mark_failed(&id));
    }

    #[test]
    fn test_take_dirty() {
        let conv = Uuid::now_v7();
        let mut store = MessageStore::new();
        store.reset(conv, vec![]);
        assert!(store.take_dirty());
        assert!(!store.take_dirty());

        let id = Uuid::now_v7();
        store.insert_confirmed(message(conv, id, 0, "x"));
        assert!(store.take_dirty());
        store.insert_confirmed(message(conv, id, 0, "x"));
        assert!(!store.take_dirty());
    }

    proptest! {
        #[test]
        fn prop_store_stays_sorted_and_unique(
            events in prop::collection::vec((0u8..12, any::<bool>()), 0..60)
        ) {
            let conv = Uuid::from_u128(42);
            let mut store = MessageStore::new();
            store.reset(conv, vec![]);
            let mut seen = HashSet::new();

            for (idx, optimistic) in events {
                // the same identity always carries the same timestamp
                let offset = (idx as i64 * 7) % 13;
                let m = message(conv, Uuid::from_u128(idx as u128 + 1), offset, "p");
                seen.insert(idx);
                if optimistic {
                    store.insert_optimistic(m);
                } else {
                    store.insert_confirmed(m);
                }

                prop_assert!(store.messages().windows(2).all(|w| w[0].created_at <= w[1].created_at));
                prop_assert_eq!(store.len(), seen.len());
            }
        }
    }

    #[test]
    fn test_sorted_after_interleaved_feeds() {
        let conv = Uuid::now_v7();
        let mut store = MessageStore::new();
        store.reset(conv, vec![message(conv, Uuid::from_u128(100), 50, "history")]);
        for i in 0..20u128 {
            let m = message(conv, Uuid::from_u128(i), (i as i64 * 37) % 60, "m");
            if i % 2 == 0 {
                store.insert_optimistic(m);
            } else {
                store.insert_confirmed(m);
            }
            assert_sorted(&store);
        }
        assert_eq!(store.len(), 21);
    }
}
