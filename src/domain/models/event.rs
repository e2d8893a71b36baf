use tui_textarea::Input;

use super::ChatMessage;
use super::ConnectionState;
use super::MessageId;
use super::MessageRecord;

pub enum Event {
    AuthExpired(),
    ConnectionNotice(String),
    ConnectionState(ConnectionState),
    HistoryFailed(String),
    HistoryLoaded(Vec<MessageRecord>),
    KeyboardCharInput(Input),
    KeyboardCTRLC(),
    KeyboardCTRLR(),
    KeyboardEnter(),
    KeyboardPaste(String),
    LiveMessage(ChatMessage),
    SendConfirmed(MessageId, MessageRecord),
    SendFailed(MessageId, String),
    UIScrollDown(),
    UIScrollUp(),
    UIScrollPageDown(),
    UIScrollPageUp(),
    UITick(),
}
