#[cfg(test)]
#[path = "reconciler_test.rs"]
mod tests;

use std::collections::HashSet;
use std::mem;

use crate::domain::models::ChatMessage;
use crate::domain::models::DeliveryState;
use crate::domain::models::MessageId;
use crate::domain::models::MessageRecord;

/// Clock skew allowance between the server's persist time and the client's
/// receipt time when matching messages that carry no server id.
const DUPLICATE_TOLERANCE_SECONDS: i64 = 5;

/// Merges the persisted history and the live stream into one ordered,
/// de-duplicated timeline.
///
/// Live messages that arrive before the first history response are buffered
/// rather than displayed, then folded in when history lands. After that point
/// every source goes through the same sorted insert, keyed by
/// (timestamp, arrival sequence), so a reconnect gap-fill can never reorder
/// or duplicate what is already on screen.
pub struct Reconciler {
    user_id: i64,
    messages: Vec<ChatMessage>,
    buffered: Vec<ChatMessage>,
    seen_server_ids: HashSet<i64>,
    history_loaded: bool,
}

impl Reconciler {
    pub fn new(user_id: i64) -> Reconciler {
        return Reconciler {
            user_id,
            messages: vec![],
            buffered: vec![],
            seen_server_ids: HashSet::new(),
            history_loaded: false,
        };
    }

    pub fn messages(&self) -> &[ChatMessage] {
        return &self.messages;
    }

    pub fn history_loaded(&self) -> bool {
        return self.history_loaded;
    }

    /// Folds a history response into the timeline. Safe to call repeatedly
    /// with overlapping responses: records already seen are skipped, records
    /// matching a locally-identified entry upgrade that entry in place, and
    /// only genuinely new records are inserted.
    pub fn merge_history(&mut self, records: &[MessageRecord]) {
        for record in records {
            if self.seen_server_ids.contains(&record.id) {
                continue;
            }
            self.seen_server_ids.insert(record.id);

            let incoming = ChatMessage::from_record(record, self.user_id);
            let adopted = self.messages.iter().position(|e| {
                return matches!(e.id, MessageId::Local(_)) && is_same_message(e, &incoming);
            });

            if let Some(idx) = adopted {
                let mut existing = self.messages.remove(idx);
                existing.confirm(record);
                self.insert_sorted(existing);
                continue;
            }

            self.insert_sorted(incoming);
        }

        self.flush_buffered();
    }

    /// History could not be fetched. Buffered live deliveries become the
    /// visible timeline, and later deliveries land directly; a successful
    /// merge afterwards de-duplicates against them.
    pub fn proceed_without_history(&mut self) {
        self.flush_buffered();
    }

    /// A message delivered by the live stream. Buffered until the first
    /// history response lands, dropped when the timeline already holds it,
    /// sorted in otherwise.
    pub fn push_live(&mut self, message: ChatMessage) {
        if !self.history_loaded {
            self.buffered.push(message);
            return;
        }

        if self.is_duplicate(&message) {
            return;
        }

        self.insert_sorted(message);
    }

    /// An optimistic outbound message, shown immediately while the persist
    /// request is in flight.
    pub fn push_pending(&mut self, message: ChatMessage) {
        self.insert_sorted(message);
    }

    /// The backend acknowledged a send. The entry adopts the server id and
    /// timestamp, re-positioned if the server clock demands it. Whichever of
    /// the ack and a gap-fill processes the record first wins: the id is
    /// recorded so a later gap-fill is a no-op, and a pending entry whose
    /// record a gap-fill already merged is dropped rather than duplicated.
    pub fn confirm_send(&mut self, id: MessageId, record: &MessageRecord) {
        let already_merged = !self.seen_server_ids.insert(record.id);

        let found = self.messages.iter().position(|e| return e.id == id);
        if let Some(idx) = found {
            if already_merged {
                self.messages.remove(idx);
                return;
            }

            let mut message = self.messages.remove(idx);
            message.confirm(record);
            self.insert_sorted(message);
        }
    }

    /// The persist request failed. The entry stays on the timeline, flagged,
    /// and can be retried manually.
    pub fn fail_send(&mut self, id: MessageId) {
        if let Some(message) = self.messages.iter_mut().find(|e| return e.id == id) {
            message.delivery = DeliveryState::Failed;
        }
    }

    pub fn mark_retrying(&mut self, id: MessageId) {
        if let Some(message) = self.messages.iter_mut().find(|e| return e.id == id) {
            if message.delivery == DeliveryState::Failed {
                message.delivery = DeliveryState::Pending;
            }
        }
    }

    /// Failed sends in timeline order, oldest first.
    pub fn failed_sends(&self) -> Vec<(MessageId, String)> {
        return self
            .messages
            .iter()
            .filter(|e| return e.delivery == DeliveryState::Failed)
            .map(|e| return (e.id, e.content.to_string()))
            .collect();
    }

    fn flush_buffered(&mut self) {
        if self.history_loaded {
            return;
        }

        self.history_loaded = true;
        for message in mem::take(&mut self.buffered) {
            if self.is_duplicate(&message) {
                continue;
            }
            self.insert_sorted(message);
        }
    }

    fn is_duplicate(&self, message: &ChatMessage) -> bool {
        return self
            .messages
            .iter()
            .any(|e| return is_same_message(e, message));
    }

    fn insert_sorted(&mut self, message: ChatMessage) {
        let key = (message.timestamp, message.arrival_seq());
        let idx = self
            .messages
            .partition_point(|e| return (e.timestamp, e.arrival_seq()) <= key);
        self.messages.insert(idx, message);
    }
}

fn is_same_message(a: &ChatMessage, b: &ChatMessage) -> bool {
    return a.sender_id == b.sender_id
        && a.content == b.content
        && (a.timestamp - b.timestamp).num_seconds().abs() <= DUPLICATE_TOLERANCE_SECONDS;
}
