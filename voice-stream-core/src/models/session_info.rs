use serde::{Deserialize, Serialize};

use super::audio_models::AudioEncoding;
use super::config::StreamConfiguration;
use super::error::StreamError;

/// Identity and format of one streaming session.
///
/// Serializable so hosts can attach it to their own request logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSessionInfo {
    pub id: String,
    pub opened_at: String,
    pub encoding: AudioEncoding,
    pub sample_rate: u32,
    pub channels: u16,
    pub text_events: bool,
}

impl StreamSessionInfo {
    /// Creates info for a session opened now.
    pub fn new(config: &StreamConfiguration) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            opened_at: chrono::Utc::now().to_rfc3339(),
            encoding: config.encoding,
            sample_rate: config.sample_rate,
            channels: config.channels,
            text_events: config.text_events,
        }
    }

    pub fn to_json(&self) -> Result<String, StreamError> {
        serde_json::to_string(self)
            .map_err(|e| StreamError::InvalidState(format!("failed to serialize session info: {}", e)))
    }
}
