#[cfg(test)]
#[path = "live_payload_test.rs"]
mod tests;

use serde_json::Value;

/// A decoded frame from the live stream. The backend pushes either a tagged
/// JSON event or a plain string, and frames that fit neither shape are kept
/// as raw text rather than dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LivePayload {
    Message { content: String },
    Other(String),
    RawText(String),
}

impl LivePayload {
    pub fn decode(raw: &str) -> LivePayload {
        let value = match serde_json::from_str::<Value>(raw) {
            Ok(value) => value,
            Err(_) => return LivePayload::RawText(raw.to_string()),
        };

        let tag = value
            .get("type")
            .and_then(|tag| return tag.as_str())
            .unwrap_or_default()
            .to_string();

        if tag == "message" {
            if let Some(content) = value.get("content").and_then(|e| return e.as_str()) {
                return LivePayload::Message {
                    content: content.to_string(),
                };
            }

            // Tagged as a message, but the content isn't a string. Surface the
            // frame as-is instead of guessing.
            return LivePayload::RawText(raw.to_string());
        }

        return LivePayload::Other(tag);
    }
}
