use serde::{Deserialize, Serialize};

use super::error::StreamError;

/// Container/codec of the audio carried by a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoding {
    Pcm,
    Mp3,
    Wav,
}

/// Integer layout of raw PCM samples. All variants are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PcmSampleType {
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
}

impl PcmSampleType {
    /// Resolve a sample type from a bit depth and signedness.
    ///
    /// Widths other than 16/32/64 are a configuration error.
    pub fn from_bits(bits: u16, signed: bool) -> Result<Self, StreamError> {
        match (bits, signed) {
            (16, true) => Ok(Self::Int16),
            (16, false) => Ok(Self::UInt16),
            (32, true) => Ok(Self::Int32),
            (32, false) => Ok(Self::UInt32),
            (64, true) => Ok(Self::Int64),
            (64, false) => Ok(Self::UInt64),
            _ => Err(StreamError::UnsupportedPcmFormat(format!(
                "{}-bit {} PCM",
                bits,
                if signed { "signed" } else { "unsigned" }
            ))),
        }
    }

    /// Bytes occupied by one sample.
    pub fn byte_width(self) -> usize {
        match self {
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 => 4,
            Self::Int64 | Self::UInt64 => 8,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Self::Int16 | Self::Int32 | Self::Int64)
    }
}

impl Default for PcmSampleType {
    fn default() -> Self {
        Self::Int16
    }
}

/// Counters for a streaming session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamDiagnostics {
    pub bytes_received: u64,
    pub chunks_decoded: u64,
    pub chunks_dropped: u64,
    pub samples_decoded: u64,
    pub text_events: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_widths() {
        assert_eq!(PcmSampleType::Int16.byte_width(), 2);
        assert_eq!(PcmSampleType::UInt16.byte_width(), 2);
        assert_eq!(PcmSampleType::Int32.byte_width(), 4);
        assert_eq!(PcmSampleType::UInt32.byte_width(), 4);
        assert_eq!(PcmSampleType::Int64.byte_width(), 8);
        assert_eq!(PcmSampleType::UInt64.byte_width(), 8);
    }

    #[test]
    fn from_bits_rejects_unsupported_widths() {
        assert_eq!(PcmSampleType::from_bits(32, false), Ok(PcmSampleType::UInt32));
        assert!(matches!(
            PcmSampleType::from_bits(24, true),
            Err(StreamError::UnsupportedPcmFormat(_))
        ));
        assert!(PcmSampleType::from_bits(8, false).is_err());
    }

    #[test]
    fn encoding_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&AudioEncoding::Mp3).unwrap(), "\"mp3\"");
        let parsed: PcmSampleType = serde_json::from_str("\"uint16\"").unwrap();
        assert_eq!(parsed, PcmSampleType::UInt16);
    }
}
