#[cfg(test)]
#[path = "actions_test.rs"]
mod tests;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::domain::models::Action;
use crate::domain::models::ApiBox;
use crate::domain::models::ApiError;
use crate::domain::models::Event;
use crate::domain::models::MessageId;

async fn load_history(
    api: &ApiBox,
    counterpart_username: &str,
    tx: &mpsc::UnboundedSender<Event>,
) -> Result<()> {
    match api.history(counterpart_username).await {
        Ok(records) => {
            tx.send(Event::HistoryLoaded(records))?;
        }
        Err(ApiError::AuthExpired) => {
            tx.send(Event::AuthExpired())?;
        }
        Err(err) => {
            tx.send(Event::HistoryFailed(err.to_string()))?;
        }
    }

    return Ok(());
}

async fn send_message(
    api: &ApiBox,
    counterpart_username: &str,
    id: MessageId,
    content: &str,
    tx: &mpsc::UnboundedSender<Event>,
) -> Result<()> {
    match api.send_message(counterpart_username, content).await {
        Ok(record) => {
            tx.send(Event::SendConfirmed(id, record))?;
        }
        Err(ApiError::AuthExpired) => {
            tx.send(Event::AuthExpired())?;
        }
        Err(err) => {
            tx.send(Event::SendFailed(id, err.to_string()))?;
        }
    }

    return Ok(());
}

pub struct ActionsService {}

impl ActionsService {
    /// Runs the network side of the conversation view. Every action goes to
    /// its own worker task so a slow request never delays the next one, and
    /// answers come back as events.
    pub async fn start(
        api: ApiBox,
        counterpart_username: String,
        tx: mpsc::UnboundedSender<Event>,
        rx: &mut mpsc::UnboundedReceiver<Action>,
    ) -> Result<()> {
        let api = Arc::new(api);

        loop {
            let event = rx.recv().await;
            if event.is_none() {
                // The UI dropped its sender, time to shut down.
                return Ok(());
            }

            let worker_api = api.clone();
            let worker_tx = tx.clone();
            let worker_username = counterpart_username.to_string();

            match event.unwrap() {
                Action::LoadHistory() => {
                    tokio::spawn(async move {
                        return load_history(&worker_api, &worker_username, &worker_tx).await;
                    });
                }
                Action::SendMessage(id, content) => {
                    tokio::spawn(async move {
                        return send_message(
                            &worker_api,
                            &worker_username,
                            id,
                            &content,
                            &worker_tx,
                        )
                        .await;
                    });
                }
            }
        }
    }
}
