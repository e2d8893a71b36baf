#[cfg(test)]
#[path = "app_state_test.rs"]
mod tests;

use anyhow::Result;
use ratatui::prelude::Rect;
use tokio::sync::mpsc;

use super::BubbleList;
use super::Reconciler;
use super::Scroll;
use crate::domain::models::Action;
use crate::domain::models::ChatMessage;
use crate::domain::models::ConnectionState;
use crate::domain::models::Event;
use crate::domain::models::SlashCommand;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    Quit,
    AuthExpired,
}

fn help_text() -> String {
    return "Commands: /retry (/rt) resend failed sends, /quit (/q) exit, /help (/h). Hotkeys: Up/Down scroll, Ctrl-U/Ctrl-D page, Ctrl-R retry, Ctrl-C quit.".to_string();
}

pub struct AppState {
    pub bubble_list: BubbleList,
    pub connection: ConnectionState,
    pub counterpart_id: i64,
    pub exit_reason: Option<ExitReason>,
    pub last_known_height: u16,
    pub last_known_width: u16,
    pub reconciler: Reconciler,
    pub scroll: Scroll,
    pub status_notice: Option<String>,
    pub user_id: i64,
    pub waiting_for_history: bool,
}

impl AppState {
    pub fn new(user_id: i64, counterpart_id: i64) -> AppState {
        return AppState {
            bubble_list: BubbleList::default(),
            connection: ConnectionState::Disconnected,
            counterpart_id,
            exit_reason: None,
            last_known_height: 0,
            last_known_width: 0,
            reconciler: Reconciler::new(user_id),
            scroll: Scroll::default(),
            status_notice: None,
            user_id,
            waiting_for_history: true,
        };
    }

    pub fn handle_chat_event(
        &mut self,
        event: Event,
        tx: &mpsc::UnboundedSender<Action>,
    ) -> Result<()> {
        match event {
            Event::ConnectionState(state) => {
                if self.connection == ConnectionState::Reconnecting
                    && state == ConnectionState::Connected
                {
                    // The socket was down for a while. Refetch history to fill
                    // whatever fell into the gap.
                    tx.send(Action::LoadHistory())?;
                }
                if state == ConnectionState::Connected {
                    self.status_notice = None;
                }
                self.connection = state;
            }
            Event::ConnectionNotice(text) => {
                self.status_notice = Some(text);
            }
            Event::HistoryLoaded(records) => {
                self.waiting_for_history = false;
                self.reconciler.merge_history(&records);
                self.sync_dependants();
                self.scroll.last();
            }
            Event::HistoryFailed(err) => {
                self.waiting_for_history = false;
                self.status_notice = Some(format!("Could not load history: {err}"));
                self.reconciler.proceed_without_history();
                self.sync_dependants();
                self.scroll.last();
            }
            Event::LiveMessage(message) => {
                self.reconciler.push_live(message);
                if self.reconciler.history_loaded() {
                    self.sync_dependants();
                    self.scroll.last();
                }
            }
            Event::SendConfirmed(id, record) => {
                self.reconciler.confirm_send(id, &record);
                self.sync_dependants();
            }
            Event::SendFailed(id, err) => {
                self.reconciler.fail_send(id);
                self.status_notice = Some(format!("Send failed: {err}. /retry to try again."));
                self.sync_dependants();
            }
            Event::AuthExpired() => {
                self.exit_reason = Some(ExitReason::AuthExpired);
            }
            _ => {}
        }

        return Ok(());
    }

    /// Returns true when the input was a slash command and should not be sent
    /// as a message.
    pub fn handle_slash_commands(
        &mut self,
        input_str: &str,
        tx: &mpsc::UnboundedSender<Action>,
    ) -> Result<bool> {
        if let Some(command) = SlashCommand::parse(input_str) {
            if command.is_quit() {
                self.exit_reason = Some(ExitReason::Quit);
                return Ok(true);
            }

            if command.is_help() {
                self.status_notice = Some(help_text());
                return Ok(true);
            }

            if command.is_retry() {
                self.retry_failed_sends(tx)?;
                return Ok(true);
            }
        }

        return Ok(false);
    }

    pub fn send_message(
        &mut self,
        content: &str,
        tx: &mpsc::UnboundedSender<Action>,
    ) -> Result<()> {
        let message = ChatMessage::pending(content, self.user_id, self.counterpart_id);
        let id = message.id;

        self.reconciler.push_pending(message);
        self.sync_dependants();
        self.scroll.last();

        tx.send(Action::SendMessage(id, content.to_string()))?;
        return Ok(());
    }

    pub fn retry_failed_sends(&mut self, tx: &mpsc::UnboundedSender<Action>) -> Result<()> {
        for (id, content) in self.reconciler.failed_sends() {
            self.reconciler.mark_retrying(id);
            tx.send(Action::SendMessage(id, content))?;
        }

        self.sync_dependants();
        return Ok(());
    }

    pub fn set_rect(&mut self, rect: Rect) {
        self.last_known_width = rect.width;
        self.last_known_height = rect.height;
        self.sync_dependants();
    }

    fn sync_dependants(&mut self) {
        self.bubble_list
            .set_messages(self.reconciler.messages(), self.last_known_width.into());

        self.scroll
            .set_state(self.bubble_list.len() as u16, self.last_known_height);
    }
}
