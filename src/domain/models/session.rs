use chrono::Local;
use chrono::SecondsFormat;
use serde_derive::Deserialize;
use serde_derive::Serialize;

/// The identity issued at login. Loaded once at startup and handed to every
/// component that talks to the backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub version: String,
    pub token: String,
    pub user_id: i64,
    pub username: String,
    pub timestamp: String,
}

impl AuthSession {
    pub fn new(token: &str, user_id: i64, username: &str) -> AuthSession {
        return AuthSession {
            version: env!("CARGO_PKG_VERSION").to_string(),
            token: token.to_string(),
            user_id,
            username: username.to_string(),
            timestamp: Local::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
    }
}
