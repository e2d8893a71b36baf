#[cfg(test)]
#[path = "chat_message_test.rs"]
mod tests;

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use chrono::DateTime;
use chrono::NaiveDateTime;
use chrono::Utc;

use super::Author;
use super::MessageRecord;

static NEXT_LOCAL_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Messages the server has persisted carry its identifier. Everything else
/// (optimistic sends, live frames not yet seen in history) gets a
/// process-wide synthesized one until reconciliation upgrades it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageId {
    Server(i64),
    Local(u64),
}

impl MessageId {
    pub fn next_local() -> MessageId {
        return MessageId::Local(NEXT_LOCAL_ID.fetch_add(1, Ordering::Relaxed));
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryState {
    Delivered,
    Pending,
    Failed,
}

#[derive(Clone, Debug)]
pub struct ChatMessage {
    pub id: MessageId,
    pub author: Author,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub delivery: DeliveryState,
    seq: u64,
}

impl ChatMessage {
    pub fn from_record(record: &MessageRecord, current_user_id: i64) -> ChatMessage {
        let mut author = Author::Counterpart;
        if record.sender_id == current_user_id {
            author = Author::User;
        }

        return ChatMessage {
            id: MessageId::Server(record.id),
            author,
            content: record.message_content.replace('\t', "  "),
            timestamp: parse_timestamp(&record.message_timestamp),
            sender_id: record.sender_id,
            recipient_id: record.recipient_id,
            delivery: DeliveryState::Delivered,
            seq: next_seq(),
        };
    }

    /// A message that arrived over the live stream. The transport carries no
    /// sender field, so attribution follows the open conversation.
    pub fn from_live(content: &str, counterpart_id: i64, current_user_id: i64) -> ChatMessage {
        return ChatMessage {
            id: MessageId::next_local(),
            author: Author::Counterpart,
            content: content.replace('\t', "  "),
            timestamp: Utc::now(),
            sender_id: counterpart_id,
            recipient_id: current_user_id,
            delivery: DeliveryState::Delivered,
            seq: next_seq(),
        };
    }

    /// An optimistic outbound message, rendered before the backend
    /// acknowledges it.
    pub fn pending(content: &str, current_user_id: i64, counterpart_id: i64) -> ChatMessage {
        return ChatMessage {
            id: MessageId::next_local(),
            author: Author::User,
            content: content.replace('\t', "  "),
            timestamp: Utc::now(),
            sender_id: current_user_id,
            recipient_id: counterpart_id,
            delivery: DeliveryState::Pending,
            seq: next_seq(),
        };
    }

    /// Adopts the server identity once the backend acknowledges a send.
    pub fn confirm(&mut self, record: &MessageRecord) {
        self.id = MessageId::Server(record.id);
        self.timestamp = parse_timestamp(&record.message_timestamp);
        self.delivery = DeliveryState::Delivered;
    }

    pub fn arrival_seq(&self) -> u64 {
        return self.seq;
    }
}

fn next_seq() -> u64 {
    return NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Utc);
    }

    // The backend emits naive ISO-8601 without an offset. Assume UTC.
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return DateTime::from_naive_utc_and_offset(naive, Utc);
    }

    tracing::warn!(
        timestamp = raw,
        "unparseable message timestamp, falling back to receipt time"
    );
    return Utc::now();
}
