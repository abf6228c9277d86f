use serde::{Deserialize, Serialize};

use super::audio_models::{AudioEncoding, PcmSampleType};
use super::error::StreamError;

/// Configuration for a streaming decode session.
///
/// Hosts usually deliver this as JSON; every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfiguration {
    /// Audio container/codec of the incoming stream (default: PCM).
    pub encoding: AudioEncoding,

    /// Sample layout for raw PCM, also the fallback for headerless WAV.
    pub pcm_sample_type: PcmSampleType,

    /// Sample rate in Hz (default: 24000). MP3 and WAV streams override it
    /// from their own headers.
    pub sample_rate: u32,

    /// Channel count (default: 1). Valid values: 1, 2.
    pub channels: u16,

    /// Whether audio is interleaved with text records.
    pub text_events: bool,

    /// Whether incoming bytes are wrapped in chunk framing.
    pub chunked_transport: bool,

    /// Seconds of audio that must be buffered before playback may start.
    pub ready_length_secs: f32,

    /// Seconds of decoded audio retained for readers.
    pub max_length_secs: f32,

    /// Longest text record accepted by the demux, in characters.
    pub max_text_len: usize,

    /// Longest audio record accepted by the demux, in seconds.
    pub max_audio_len_secs: f32,
}

impl StreamConfiguration {
    pub fn from_json(json: &str) -> Result<Self, StreamError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| StreamError::ConfigurationFailed(format!("failed to parse configuration: {}", e)))?;
        config.validate().map_err(StreamError::ConfigurationFailed)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        if !(self.max_length_secs > 0.0) {
            return Err("max length must be positive".into());
        }
        if !(self.ready_length_secs >= 0.0) || self.ready_length_secs > self.max_length_secs {
            return Err(format!(
                "ready length {}s must be within 0..={}s",
                self.ready_length_secs, self.max_length_secs
            ));
        }
        if self.max_text_len == 0 || !(self.max_audio_len_secs > 0.0) {
            return Err("demux ceilings must be positive".into());
        }
        Ok(())
    }

    /// Upper bound in bytes for one demux audio record.
    ///
    /// Eight bytes per sample covers every PCM width and any compressed
    /// encoding at the same duration.
    pub fn max_audio_record_bytes(&self) -> u64 {
        let samples = self.max_audio_len_secs as f64 * self.sample_rate as f64 * self.channels as f64;
        (samples * 8.0).ceil() as u64
    }
}

impl Default for StreamConfiguration {
    fn default() -> Self {
        Self {
            encoding: AudioEncoding::Pcm,
            pcm_sample_type: PcmSampleType::Int16,
            sample_rate: 24000,
            channels: 1,
            text_events: false,
            chunked_transport: true,
            ready_length_secs: 0.5,
            max_length_secs: 60.0,
            max_text_len: 10_000,
            max_audio_len_secs: 30.0,
        }
    }
}
