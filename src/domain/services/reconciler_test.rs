use chrono::DateTime;
use chrono::Duration;
use chrono::TimeZone;
use chrono::Utc;

use super::Reconciler;
use crate::domain::models::ChatMessage;
use crate::domain::models::DeliveryState;
use crate::domain::models::MessageId;
use crate::domain::models::MessageRecord;

const USER_ID: i64 = 1;
const COUNTERPART_ID: i64 = 2;

fn ts(seconds: i64) -> DateTime<Utc> {
    return Utc.with_ymd_and_hms(2024, 5, 4, 10, 0, 0).unwrap() + Duration::seconds(seconds);
}

fn record_at(id: i64, content: &str, sender_id: i64, seconds: i64) -> MessageRecord {
    return MessageRecord {
        id,
        message_content: content.to_string(),
        message_timestamp: ts(seconds).to_rfc3339(),
        sender_id,
        recipient_id: USER_ID,
    };
}

fn live_at(content: &str, seconds: i64) -> ChatMessage {
    let mut message = ChatMessage::from_live(content, COUNTERPART_ID, USER_ID);
    message.timestamp = ts(seconds);
    return message;
}

fn pending_at(content: &str, seconds: i64) -> ChatMessage {
    let mut message = ChatMessage::pending(content, USER_ID, COUNTERPART_ID);
    message.timestamp = ts(seconds);
    return message;
}

fn contents(reconciler: &Reconciler) -> Vec<String> {
    return reconciler
        .messages()
        .iter()
        .map(|e| return e.content.to_string())
        .collect();
}

mod merge_history {
    use super::*;

    #[test]
    fn it_orders_records_by_timestamp() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.merge_history(&[
            record_at(3, "third", COUNTERPART_ID, 20),
            record_at(1, "first", COUNTERPART_ID, 0),
            record_at(2, "second", USER_ID, 10),
        ]);

        assert!(reconciler.history_loaded());
        assert_eq!(contents(&reconciler), vec!["first", "second", "third"]);
    }

    #[test]
    fn it_is_idempotent_across_repeat_merges() {
        let history = vec![
            record_at(1, "hi", COUNTERPART_ID, 0),
            record_at(2, "hello", USER_ID, 10),
        ];

        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.merge_history(&history);
        reconciler.merge_history(&history);

        assert_eq!(reconciler.messages().len(), 2);
    }

    #[test]
    fn it_flushes_buffered_live_messages_exactly_once() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.push_live(live_at("hi", 3));
        reconciler.push_live(live_at("are you around?", 12));
        assert!(reconciler.messages().is_empty());

        // "hi" was persisted before the fetch finished, so it comes back in
        // history too.
        reconciler.merge_history(&[record_at(1, "hi", COUNTERPART_ID, 0)]);

        assert_eq!(contents(&reconciler), vec!["hi", "are you around?"]);
        assert_eq!(reconciler.messages()[0].id, MessageId::Server(1));
    }

    #[test]
    fn it_keeps_buffered_messages_outside_the_tolerance() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.push_live(live_at("hi", 6));
        reconciler.merge_history(&[record_at(1, "hi", COUNTERPART_ID, 0)]);

        assert_eq!(reconciler.messages().len(), 2);
    }

    #[test]
    fn it_drops_buffered_messages_on_the_tolerance_boundary() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.push_live(live_at("hi", 5));
        reconciler.merge_history(&[record_at(1, "hi", COUNTERPART_ID, 0)]);

        assert_eq!(reconciler.messages().len(), 1);
    }

    #[test]
    fn it_fills_reconnect_gaps_in_sorted_position() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.merge_history(&[
            record_at(1, "before the drop", COUNTERPART_ID, 0),
            record_at(3, "after the drop", COUNTERPART_ID, 20),
        ]);

        // Gap-fill re-reads the full history, including a record sent while
        // the connection was down.
        reconciler.merge_history(&[
            record_at(1, "before the drop", COUNTERPART_ID, 0),
            record_at(2, "missed this one", COUNTERPART_ID, 10),
            record_at(3, "after the drop", COUNTERPART_ID, 20),
        ]);

        assert_eq!(
            contents(&reconciler),
            vec!["before the drop", "missed this one", "after the drop"]
        );
    }

    #[test]
    fn it_upgrades_matching_local_entries_in_place() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.merge_history(&[]);
        reconciler.push_live(live_at("dinner went great", 100));

        reconciler.merge_history(&[record_at(9, "dinner went great", COUNTERPART_ID, 98)]);

        assert_eq!(reconciler.messages().len(), 1);
        assert_eq!(reconciler.messages()[0].id, MessageId::Server(9));
        assert_eq!(reconciler.messages()[0].delivery, DeliveryState::Delivered);
    }
}

mod proceed_without_history {
    use super::*;

    #[test]
    fn it_folds_buffered_messages_into_the_timeline() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.push_live(live_at("hi", 0));
        reconciler.push_live(live_at("are you around?", 10));
        assert!(reconciler.messages().is_empty());

        reconciler.proceed_without_history();

        assert!(reconciler.history_loaded());
        assert_eq!(contents(&reconciler), vec!["hi", "are you around?"]);
    }

    #[test]
    fn it_deduplicates_a_later_successful_merge() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.push_live(live_at("hi", 2));
        reconciler.proceed_without_history();

        reconciler.merge_history(&[record_at(1, "hi", COUNTERPART_ID, 0)]);

        assert_eq!(reconciler.messages().len(), 1);
        assert_eq!(reconciler.messages()[0].id, MessageId::Server(1));
    }
}

mod push_live {
    use super::*;

    #[test]
    fn it_buffers_until_history_loads() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.push_live(live_at("hi", 0));

        assert!(!reconciler.history_loaded());
        assert!(reconciler.messages().is_empty());
    }

    #[test]
    fn it_appends_after_history_loads() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.merge_history(&[record_at(1, "hi", COUNTERPART_ID, 0)]);
        reconciler.push_live(live_at("second", 10));

        assert_eq!(contents(&reconciler), vec!["hi", "second"]);
    }

    #[test]
    fn it_preserves_arrival_order_on_timestamp_ties() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.merge_history(&[]);
        reconciler.push_live(live_at("first", 10));
        reconciler.push_live(live_at("second", 10));

        assert_eq!(contents(&reconciler), vec!["first", "second"]);
    }

    #[test]
    fn it_drops_live_echoes_of_merged_records() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.merge_history(&[record_at(1, "hi", COUNTERPART_ID, 0)]);
        reconciler.push_live(live_at("hi", 2));

        assert_eq!(reconciler.messages().len(), 1);
    }

    #[test]
    fn it_sorts_late_arrivals_into_position() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.merge_history(&[record_at(1, "tail", COUNTERPART_ID, 20)]);
        reconciler.push_live(live_at("late", 10));

        assert_eq!(contents(&reconciler), vec!["late", "tail"]);
    }
}

mod sends {
    use super::*;

    #[test]
    fn it_appends_pending_sends_synchronously() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.merge_history(&[record_at(1, "hello", COUNTERPART_ID, 0)]);
        reconciler.push_pending(pending_at("hey", 10));

        assert_eq!(contents(&reconciler), vec!["hello", "hey"]);
        assert_eq!(reconciler.messages()[1].delivery, DeliveryState::Pending);
    }

    #[test]
    fn it_shows_sends_while_history_is_still_loading() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.push_pending(pending_at("anyone there?", 0));

        assert_eq!(reconciler.messages().len(), 1);
    }

    #[test]
    fn it_confirms_sends_with_the_server_identity() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.merge_history(&[]);
        let message = pending_at("hey", 10);
        let id = message.id;
        reconciler.push_pending(message);

        reconciler.confirm_send(id, &record_at(7, "hey", USER_ID, 11));

        assert_eq!(reconciler.messages()[0].id, MessageId::Server(7));
        assert_eq!(reconciler.messages()[0].delivery, DeliveryState::Delivered);
        assert_eq!(reconciler.messages()[0].timestamp, ts(11));
    }

    #[test]
    fn it_skips_gap_fill_records_for_confirmed_sends() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.merge_history(&[]);
        let message = pending_at("hey", 10);
        let id = message.id;
        reconciler.push_pending(message);
        reconciler.confirm_send(id, &record_at(7, "hey", USER_ID, 11));

        reconciler.merge_history(&[record_at(7, "hey", USER_ID, 11)]);

        assert_eq!(reconciler.messages().len(), 1);
    }

    #[test]
    fn it_drops_pending_entries_already_merged_by_gap_fill() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.merge_history(&[]);
        let message = pending_at("hey", 10);
        let id = message.id;
        reconciler.push_pending(message);

        // The send persisted slowly: a gap-fill returns its record, stamped
        // outside the duplicate tolerance, before the ack is processed.
        reconciler.merge_history(&[record_at(42, "hey", USER_ID, 18)]);
        reconciler.confirm_send(id, &record_at(42, "hey", USER_ID, 18));

        assert_eq!(contents(&reconciler), vec!["hey"]);
        assert_eq!(reconciler.messages()[0].id, MessageId::Server(42));
        assert_eq!(reconciler.messages()[0].delivery, DeliveryState::Delivered);
    }

    #[test]
    fn it_repositions_confirms_by_server_timestamp() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.merge_history(&[record_at(1, "middle", COUNTERPART_ID, 20)]);
        let message = pending_at("early", 30);
        let id = message.id;
        reconciler.push_pending(message);
        assert_eq!(contents(&reconciler), vec!["middle", "early"]);

        reconciler.confirm_send(id, &record_at(2, "early", USER_ID, 10));

        assert_eq!(contents(&reconciler), vec!["early", "middle"]);
    }

    #[test]
    fn it_flags_failed_sends_in_place() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.merge_history(&[record_at(1, "hello", COUNTERPART_ID, 0)]);
        let message = pending_at("hey", 10);
        let id = message.id;
        reconciler.push_pending(message);

        reconciler.fail_send(id);

        assert_eq!(contents(&reconciler), vec!["hello", "hey"]);
        assert_eq!(reconciler.messages()[1].delivery, DeliveryState::Failed);
    }

    #[test]
    fn it_lists_failed_sends_oldest_first() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.merge_history(&[]);
        let first = pending_at("first", 10);
        let second = pending_at("second", 20);
        let first_id = first.id;
        let second_id = second.id;
        reconciler.push_pending(first);
        reconciler.push_pending(second);
        reconciler.fail_send(second_id);
        reconciler.fail_send(first_id);

        let failed = reconciler.failed_sends();
        assert_eq!(failed.len(), 2);
        assert_eq!(failed[0], (first_id, "first".to_string()));
        assert_eq!(failed[1], (second_id, "second".to_string()));
    }

    #[test]
    fn it_marks_failed_sends_as_retrying() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.merge_history(&[]);
        let message = pending_at("hey", 10);
        let id = message.id;
        reconciler.push_pending(message);
        reconciler.fail_send(id);

        reconciler.mark_retrying(id);

        assert_eq!(reconciler.messages()[0].delivery, DeliveryState::Pending);
    }

    #[test]
    fn it_keeps_live_and_sent_order() {
        let mut reconciler = Reconciler::new(USER_ID);
        reconciler.merge_history(&[]);
        reconciler.push_live(live_at("hello", 10));
        reconciler.push_pending(pending_at("hey", 20));

        assert_eq!(contents(&reconciler), vec!["hello", "hey"]);
    }
}
