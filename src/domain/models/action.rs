use super::MessageId;

pub enum Action {
    LoadHistory(),
    SendMessage(MessageId, String),
}
