#[cfg(test)]
#[path = "websocket_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ChatMessage;
use crate::domain::models::ConnectionState;
use crate::domain::models::Event;
use crate::domain::models::LivePayload;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

pub struct StreamSettings {
    pub url: String,
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
}

impl Default for StreamSettings {
    fn default() -> StreamSettings {
        let delay = Config::get(ConfigKey::ReconnectDelay)
            .parse::<u64>()
            .unwrap_or(5000);
        let attempts = Config::get(ConfigKey::ReconnectMaxAttempts)
            .parse::<u32>()
            .unwrap_or(5);

        return StreamSettings {
            url: Config::get(ConfigKey::ServerURL),
            reconnect_delay: Duration::from_millis(delay),
            max_reconnect_attempts: attempts,
        };
    }
}

enum ReadOutcome {
    Cancelled,
    TransportLost,
}

fn endpoint(server_url: &str, user_id: i64) -> String {
    let ws_url = if server_url.starts_with("https://") {
        server_url.replace("https://", "wss://")
    } else {
        server_url.replace("http://", "ws://")
    };

    return format!("{ws_url}/ws/{user_id}");
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    let delay = base.saturating_mul(factor);
    if delay > MAX_BACKOFF {
        return MAX_BACKOFF;
    }

    return delay;
}

fn emit(tx: &mpsc::UnboundedSender<Event>, event: Event) {
    // The UI may already be gone during teardown.
    tx.send(event).ok();
}

fn deliver(raw: &str, counterpart_id: i64, user_id: i64, tx: &mpsc::UnboundedSender<Event>) {
    match LivePayload::decode(raw) {
        LivePayload::Message { content } => {
            emit(
                tx,
                Event::LiveMessage(ChatMessage::from_live(&content, counterpart_id, user_id)),
            );
        }
        LivePayload::RawText(text) => {
            emit(
                tx,
                Event::LiveMessage(ChatMessage::from_live(&text, counterpart_id, user_id)),
            );
        }
        LivePayload::Other(tag) => {
            tracing::debug!(tag = tag.as_str(), "skipping untyped live frame");
        }
    }
}

async fn read_frames(
    ws_stream: &mut WebSocketStream<MaybeTlsStream<TcpStream>>,
    counterpart_id: i64,
    user_id: i64,
    tx: &mpsc::UnboundedSender<Event>,
    cancel_token: &CancellationToken,
) -> ReadOutcome {
    loop {
        let frame = tokio::select! {
            frame = ws_stream.next() => frame,
            _ = cancel_token.cancelled() => {
                ws_stream.close(None).await.ok();
                return ReadOutcome::Cancelled;
            }
        };

        match frame {
            Some(Ok(Message::Text(raw))) => {
                deliver(&raw, counterpart_id, user_id, tx);
            }
            Some(Ok(Message::Binary(bytes))) => {
                deliver(
                    &String::from_utf8_lossy(&bytes),
                    counterpart_id,
                    user_id,
                    tx,
                );
            }
            Some(Ok(Message::Close(_))) => {
                tracing::debug!("live stream closed by the server");
                return ReadOutcome::TransportLost;
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                tracing::warn!(error = ?err, "live stream transport error");
                return ReadOutcome::TransportLost;
            }
            None => {
                return ReadOutcome::TransportLost;
            }
        }
    }
}

pub struct LiveStreamService {}

impl LiveStreamService {
    /// Holds the socket open for the life of the view and reports every state
    /// change on the event channel. Returns only once the view is torn down,
    /// parking after it gives up so a dead stream never closes a usable view.
    pub async fn start(
        settings: StreamSettings,
        user_id: i64,
        counterpart_id: i64,
        tx: mpsc::UnboundedSender<Event>,
        cancel_token: CancellationToken,
    ) -> Result<()> {
        let url = endpoint(&settings.url, user_id);
        let mut attempts = 0u32;
        let mut ever_connected = false;

        loop {
            emit(&tx, Event::ConnectionState(ConnectionState::Connecting));

            let connected = tokio::select! {
                res = connect_async(&url) => res,
                _ = cancel_token.cancelled() => {
                    emit(&tx, Event::ConnectionState(ConnectionState::Disconnected));
                    return Ok(());
                }
            };

            match connected {
                Ok((mut ws_stream, _)) => {
                    attempts = 0;
                    ever_connected = true;
                    emit(&tx, Event::ConnectionState(ConnectionState::Connected));
                    tracing::debug!(url = url.as_str(), "live stream connected");

                    let outcome =
                        read_frames(&mut ws_stream, counterpart_id, user_id, &tx, &cancel_token)
                            .await;

                    if let ReadOutcome::Cancelled = outcome {
                        emit(&tx, Event::ConnectionState(ConnectionState::Disconnected));
                        return Ok(());
                    }
                }
                Err(err) => {
                    tracing::warn!(error = ?err, attempt = attempts, "live stream connect failed");

                    // A connection that never existed is not retried. The
                    // failure is surfaced and reopening the view reopens the
                    // socket.
                    if !ever_connected {
                        emit(
                            &tx,
                            Event::ConnectionNotice(
                                "Could not reach the live stream. New messages will not arrive."
                                    .to_string(),
                            ),
                        );
                        emit(&tx, Event::ConnectionState(ConnectionState::Disconnected));

                        // The view stays open on history and sends alone.
                        cancel_token.cancelled().await;
                        return Ok(());
                    }
                }
            }

            attempts += 1;
            if attempts > settings.max_reconnect_attempts {
                emit(
                    &tx,
                    Event::ConnectionNotice(format!(
                        "Live updates stopped. Could not reconnect after {max} attempts.",
                        max = settings.max_reconnect_attempts
                    )),
                );
                emit(&tx, Event::ConnectionState(ConnectionState::Disconnected));

                // The view stays open on history and sends alone.
                cancel_token.cancelled().await;
                return Ok(());
            }

            emit(&tx, Event::ConnectionState(ConnectionState::Reconnecting));
            tokio::select! {
                _ = time::sleep(backoff_delay(settings.reconnect_delay, attempts)) => {},
                _ = cancel_token.cancelled() => {
                    emit(&tx, Event::ConnectionState(ConnectionState::Disconnected));
                    return Ok(());
                }
            }
        }
    }
}
