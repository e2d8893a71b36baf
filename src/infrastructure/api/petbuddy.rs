#[cfg(test)]
#[path = "petbuddy_test.rs"]
mod tests;

use std::time::Duration;

use async_trait::async_trait;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ApiError;
use crate::domain::models::AuthSession;
use crate::domain::models::ChatApi;
use crate::domain::models::MessageRecord;
use crate::domain::models::UserRecord;

fn transient(err: reqwest::Error) -> ApiError {
    return ApiError::Transient(err.to_string());
}

fn check_status(res: &reqwest::Response) -> Result<(), ApiError> {
    if res.status() == 401 {
        return Err(ApiError::AuthExpired);
    }

    if !res.status().is_success() {
        tracing::error!(status = res.status().as_u16(), "request refused");
        return Err(ApiError::Transient(format!(
            "The server answered with status {status}",
            status = res.status().as_u16()
        )));
    }

    return Ok(());
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LoginResponse {
    access_token: String,
    user_id: i64,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    name: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SendMessageRequest {
    message_content: String,
}

pub struct PetBuddy {
    url: String,
    token: String,
    timeout: Duration,
}

impl PetBuddy {
    pub fn with_session(session: &AuthSession) -> PetBuddy {
        let timeout = Config::get(ConfigKey::RequestTimeout)
            .parse::<u64>()
            .unwrap_or(10000);

        return PetBuddy {
            url: Config::get(ConfigKey::ServerURL),
            token: session.token.to_string(),
            timeout: Duration::from_millis(timeout),
        };
    }

    /// Exchanges credentials for a bearer token. The only unauthenticated
    /// call, which is why it lives outside the trait.
    pub async fn login(
        server_url: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthSession, ApiError> {
        let res = reqwest::Client::new()
            .post(format!("{server_url}/login"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(transient)?;

        check_status(&res)?;

        let login = res.json::<LoginResponse>().await.map_err(transient)?;
        return Ok(AuthSession::new(
            &login.access_token,
            login.user_id,
            username,
        ));
    }
}

#[async_trait]
impl ChatApi for PetBuddy {
    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<(), ApiError> {
        let res = reqwest::Client::new()
            .get(format!("{url}/", url = self.url))
            .timeout(self.timeout)
            .send()
            .await;

        if res.is_err() {
            tracing::error!(error = ?res.unwrap_err(), "PetBuddy is not reachable");
            return Err(ApiError::Transient(
                "The PetBuddy server is not reachable".to_string(),
            ));
        }

        let res = res.unwrap();
        if res.status() != 200 {
            tracing::error!(status = res.status().as_u16(), "PetBuddy health check failed");
            return Err(ApiError::Transient(
                "The PetBuddy server health check failed".to_string(),
            ));
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn user(&self, user_id: i64) -> Result<UserRecord, ApiError> {
        let res = reqwest::Client::new()
            .get(format!("{url}/users/{user_id}", url = self.url))
            .timeout(self.timeout)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transient)?;

        check_status(&res)?;

        return res.json::<UserRecord>().await.map_err(transient);
    }

    #[allow(clippy::implicit_return)]
    async fn display_name(&self, user_id: i64) -> Result<Option<String>, ApiError> {
        // Profiles live on per-role endpoints and users carry no role field,
        // so both are tried in turn.
        for role in ["petowner", "caretaker"] {
            let res = reqwest::Client::new()
                .get(format!("{url}/{role}/{user_id}", url = self.url))
                .timeout(self.timeout)
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(transient)?;

            if res.status() == 401 {
                return Err(ApiError::AuthExpired);
            }
            if !res.status().is_success() {
                continue;
            }

            let profile = res.json::<ProfileResponse>().await.map_err(transient)?;
            if !profile.name.is_empty() {
                return Ok(Some(profile.name));
            }
        }

        return Ok(None);
    }

    #[allow(clippy::implicit_return)]
    async fn conversations(&self) -> Result<Vec<UserRecord>, ApiError> {
        let res = reqwest::Client::new()
            .get(format!("{url}/message/conversations", url = self.url))
            .timeout(self.timeout)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transient)?;

        check_status(&res)?;

        return res.json::<Vec<UserRecord>>().await.map_err(transient);
    }

    #[allow(clippy::implicit_return)]
    async fn history(&self, counterpart_username: &str) -> Result<Vec<MessageRecord>, ApiError> {
        let res = reqwest::Client::new()
            .get(format!(
                "{url}/message/{counterpart_username}",
                url = self.url
            ))
            .timeout(self.timeout)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transient)?;

        check_status(&res)?;

        return res.json::<Vec<MessageRecord>>().await.map_err(transient);
    }

    #[allow(clippy::implicit_return)]
    async fn send_message(
        &self,
        counterpart_username: &str,
        content: &str,
    ) -> Result<MessageRecord, ApiError> {
        let req = SendMessageRequest {
            message_content: content.to_string(),
        };

        let res = reqwest::Client::new()
            .post(format!(
                "{url}/message/{counterpart_username}",
                url = self.url
            ))
            .timeout(self.timeout)
            .bearer_auth(&self.token)
            .json(&req)
            .send()
            .await
            .map_err(transient)?;

        check_status(&res)?;

        return res.json::<MessageRecord>().await.map_err(transient);
    }
}
