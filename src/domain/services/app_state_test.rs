use anyhow::bail;
use anyhow::Result;
use tokio::sync::mpsc;

use super::AppState;
use super::ExitReason;
use crate::domain::models::Action;
use crate::domain::models::Author;
use crate::domain::models::ChatMessage;
use crate::domain::models::ConnectionState;
use crate::domain::models::DeliveryState;
use crate::domain::models::Event;
use crate::domain::models::MessageRecord;

impl Default for AppState {
    fn default() -> AppState {
        let mut app_state = AppState::new(1, 2);
        app_state.last_known_width = 100;
        app_state.last_known_height = 300;
        return app_state;
    }
}

fn record(id: i64, content: &str, sender_id: i64) -> MessageRecord {
    return MessageRecord {
        id,
        message_content: content.to_string(),
        message_timestamp: "2024-05-04T10:00:00".to_string(),
        sender_id,
        recipient_id: 3 - sender_id,
    };
}

mod handle_chat_event {
    use super::*;

    #[test]
    fn it_merges_history() -> Result<()> {
        let (tx, _rx) = mpsc::unbounded_channel::<Action>();
        let mut app_state = AppState::default();

        app_state.handle_chat_event(
            Event::HistoryLoaded(vec![record(1, "Morning!", 2), record(2, "Morning", 1)]),
            &tx,
        )?;

        assert!(!app_state.waiting_for_history);
        assert_eq!(app_state.reconciler.messages().len(), 2);
        assert_eq!(
            app_state.reconciler.messages()[0].author,
            Author::Counterpart
        );
        assert!(app_state.bubble_list.len() > 0);

        return Ok(());
    }

    #[test]
    fn it_surfaces_history_failures() -> Result<()> {
        let (tx, _rx) = mpsc::unbounded_channel::<Action>();
        let mut app_state = AppState::default();

        app_state
            .handle_chat_event(Event::HistoryFailed("connection refused".to_string()), &tx)?;

        assert!(!app_state.waiting_for_history);
        assert!(app_state
            .status_notice
            .as_ref()
            .unwrap()
            .contains("connection refused"));

        return Ok(());
    }

    #[test]
    fn it_renders_live_messages_after_history_fails() -> Result<()> {
        let (tx, _rx) = mpsc::unbounded_channel::<Action>();
        let mut app_state = AppState::default();

        app_state
            .handle_chat_event(Event::HistoryFailed("connection refused".to_string()), &tx)?;
        app_state.handle_chat_event(
            Event::LiveMessage(ChatMessage::from_live("Bella says hi", 2, 1)),
            &tx,
        )?;

        assert_eq!(app_state.reconciler.messages().len(), 1);
        assert!(app_state.bubble_list.len() > 0);

        return Ok(());
    }

    #[test]
    fn it_buffers_live_messages_until_history_loads() -> Result<()> {
        let (tx, _rx) = mpsc::unbounded_channel::<Action>();
        let mut app_state = AppState::default();

        app_state.handle_chat_event(
            Event::LiveMessage(ChatMessage::from_live("Bella says hi", 2, 1)),
            &tx,
        )?;
        assert_eq!(app_state.reconciler.messages().len(), 0);

        app_state.handle_chat_event(Event::HistoryLoaded(vec![]), &tx)?;
        assert_eq!(app_state.reconciler.messages().len(), 1);

        return Ok(());
    }

    #[test]
    fn it_requests_gap_fill_after_a_reconnect() -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Action>();
        let mut app_state = AppState::default();

        app_state.handle_chat_event(Event::ConnectionState(ConnectionState::Reconnecting), &tx)?;
        app_state.handle_chat_event(Event::ConnectionState(ConnectionState::Connected), &tx)?;

        assert_eq!(app_state.connection, ConnectionState::Connected);
        match rx.try_recv()? {
            Action::LoadHistory() => {}
            _ => bail!("Wrong enum"),
        }

        return Ok(());
    }

    #[test]
    fn it_skips_gap_fill_on_the_first_connect() -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Action>();
        let mut app_state = AppState::default();

        app_state.handle_chat_event(Event::ConnectionState(ConnectionState::Connecting), &tx)?;
        app_state.handle_chat_event(Event::ConnectionState(ConnectionState::Connected), &tx)?;

        assert!(rx.try_recv().is_err());
        return Ok(());
    }

    #[test]
    fn it_clears_notices_once_connected() -> Result<()> {
        let (tx, _rx) = mpsc::unbounded_channel::<Action>();
        let mut app_state = AppState::default();

        app_state.handle_chat_event(
            Event::ConnectionNotice("Connection lost.".to_string()),
            &tx,
        )?;
        assert!(app_state.status_notice.is_some());

        app_state.handle_chat_event(Event::ConnectionState(ConnectionState::Connected), &tx)?;
        assert!(app_state.status_notice.is_none());

        return Ok(());
    }

    #[test]
    fn it_confirms_sends() -> Result<()> {
        let (tx, _rx) = mpsc::unbounded_channel::<Action>();
        let mut app_state = AppState::default();
        app_state.send_message("On my way", &tx)?;
        let id = app_state.reconciler.messages()[0].id;

        app_state.handle_chat_event(Event::SendConfirmed(id, record(77, "On my way", 1)), &tx)?;

        let messages = app_state.reconciler.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].delivery, DeliveryState::Delivered);

        return Ok(());
    }

    #[test]
    fn it_flags_failed_sends_and_keeps_them() -> Result<()> {
        let (tx, _rx) = mpsc::unbounded_channel::<Action>();
        let mut app_state = AppState::default();
        app_state.send_message("On my way", &tx)?;
        let id = app_state.reconciler.messages()[0].id;

        app_state
            .handle_chat_event(Event::SendFailed(id, "connection refused".to_string()), &tx)?;

        let messages = app_state.reconciler.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].delivery, DeliveryState::Failed);
        assert!(app_state
            .status_notice
            .as_ref()
            .unwrap()
            .contains("connection refused"));

        return Ok(());
    }

    #[test]
    fn it_exits_on_auth_expiry() -> Result<()> {
        let (tx, _rx) = mpsc::unbounded_channel::<Action>();
        let mut app_state = AppState::default();

        app_state.handle_chat_event(Event::AuthExpired(), &tx)?;

        assert_eq!(app_state.exit_reason, Some(ExitReason::AuthExpired));
        return Ok(());
    }
}

mod handle_slash_commands {
    use super::*;

    #[test]
    fn it_exits_on_quit() -> Result<()> {
        let (tx, _rx) = mpsc::unbounded_channel::<Action>();
        let mut app_state = AppState::default();

        let handled = app_state.handle_slash_commands("/q", &tx)?;

        assert!(handled);
        assert_eq!(app_state.exit_reason, Some(ExitReason::Quit));

        return Ok(());
    }

    #[test]
    fn it_shows_help_in_the_status_line() -> Result<()> {
        let (tx, _rx) = mpsc::unbounded_channel::<Action>();
        let mut app_state = AppState::default();

        let handled = app_state.handle_slash_commands("/help", &tx)?;

        assert!(handled);
        assert!(app_state.status_notice.as_ref().unwrap().contains("/retry"));

        return Ok(());
    }

    #[test]
    fn it_retries_failed_sends_oldest_first() -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Action>();
        let mut app_state = AppState::default();

        app_state.send_message("first", &tx)?;
        app_state.send_message("second", &tx)?;
        let first_id = app_state.reconciler.messages()[0].id;
        let second_id = app_state.reconciler.messages()[1].id;
        app_state.handle_chat_event(Event::SendFailed(first_id, "boom".to_string()), &tx)?;
        app_state.handle_chat_event(Event::SendFailed(second_id, "boom".to_string()), &tx)?;
        while rx.try_recv().is_ok() {}

        let handled = app_state.handle_slash_commands("/retry", &tx)?;
        assert!(handled);

        match rx.try_recv()? {
            Action::SendMessage(id, content) => {
                assert_eq!(id, first_id);
                assert_eq!(content, "first");
            }
            _ => bail!("Wrong enum"),
        }
        match rx.try_recv()? {
            Action::SendMessage(id, content) => {
                assert_eq!(id, second_id);
                assert_eq!(content, "second");
            }
            _ => bail!("Wrong enum"),
        }
        assert_eq!(
            app_state.reconciler.messages()[0].delivery,
            DeliveryState::Pending
        );

        return Ok(());
    }

    #[test]
    fn it_passes_plain_text_through() -> Result<()> {
        let (tx, _rx) = mpsc::unbounded_channel::<Action>();
        let mut app_state = AppState::default();

        let handled = app_state.handle_slash_commands("hello there", &tx)?;

        assert!(!handled);
        return Ok(());
    }
}

mod send_message {
    use super::*;

    #[test]
    fn it_appends_optimistically_and_issues_the_send() -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Action>();
        let mut app_state = AppState::default();

        app_state.send_message("On my way", &tx)?;

        let messages = app_state.reconciler.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].author, Author::User);
        assert_eq!(messages[0].delivery, DeliveryState::Pending);

        match rx.try_recv()? {
            Action::SendMessage(id, content) => {
                assert_eq!(id, messages[0].id);
                assert_eq!(content, "On my way");
            }
            _ => bail!("Wrong enum"),
        }

        return Ok(());
    }
}
