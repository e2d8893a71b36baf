use async_trait::async_trait;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The backend rejected the bearer token. The stored session is stale and
    /// the user has to sign in again.
    #[error("authentication expired, sign in again with 'kibble login'")]
    AuthExpired,
    /// Anything else that went wrong talking to the backend. Recoverable, the
    /// conversation view stays usable.
    #[error("{0}")]
    Transient(String),
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: i64,
    pub message_content: String,
    pub message_timestamp: String,
    pub sender_id: i64,
    pub recipient_id: i64,
}

pub type ApiBox = Box<dyn ChatApi + Send + Sync>;

#[async_trait]
pub trait ChatApi {
    /// Used at startup to verify the backend is reachable before entering the
    /// conversation view.
    async fn health_check(&self) -> Result<(), ApiError>;

    /// Fetches the account record for a user id, primarily to resolve the
    /// username the message endpoints are keyed by.
    async fn user(&self, user_id: i64) -> Result<UserRecord, ApiError>;

    /// Resolves a profile display name for a user. Users hold either a pet
    /// owner or a caretaker profile, so `None` is an acceptable answer and
    /// callers fall back to the username.
    async fn display_name(&self, user_id: i64) -> Result<Option<String>, ApiError>;

    /// Lists the users the signed-in account has existing conversations with,
    /// most recent first as returned by the backend.
    async fn conversations(&self) -> Result<Vec<UserRecord>, ApiError>;

    /// Fetches the persisted message history with a counterpart, oldest
    /// first.
    async fn history(&self, counterpart_username: &str) -> Result<Vec<MessageRecord>, ApiError>;

    /// Persists an outbound message and returns the created record, carrying
    /// the server-assigned id and timestamp.
    async fn send_message(
        &self,
        counterpart_username: &str,
        content: &str,
    ) -> Result<MessageRecord, ApiError>;
}
