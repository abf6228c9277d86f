use serde_json::Value;

use super::error::StreamError;

/// Size of the fixed chunk preamble: flag byte + two 8-byte lengths.
pub const CHUNK_HEADER_SIZE: usize = 17;

/// Flag bit set when the chunk carries a binary span.
pub const FLAG_BINARY: u8 = 0b0000_0001;

/// Flag bit set when the chunk carries a JSON span.
pub const FLAG_JSON: u8 = 0b0000_0010;

const FLAG_RESERVED: u8 = !(FLAG_BINARY | FLAG_JSON);

/// One framed unit of the wire protocol: optional JSON plus optional binary.
///
/// `json_raw` holds the exact text received (or supplied by the sender) and is
/// preferred over re-serializing `json` when encoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    pub json: Option<Value>,
    pub json_raw: Option<String>,
    pub binary: Option<Vec<u8>>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach JSON text. The tree is parsed eagerly; unparseable text is
    /// still kept verbatim. Empty text clears the JSON span, since the wire
    /// cannot tell it apart from none.
    pub fn with_json_str(mut self, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if raw.is_empty() {
            self.json = None;
            self.json_raw = None;
        } else {
            self.json = serde_json::from_str(&raw).ok();
            self.json_raw = Some(raw);
        }
        self
    }

    pub fn with_json_value(mut self, value: Value) -> Self {
        self.json = Some(value);
        self.json_raw = None;
        self
    }

    /// Attach a binary span. An empty span is stored as `None`.
    pub fn with_binary(mut self, binary: impl Into<Vec<u8>>) -> Self {
        let binary = binary.into();
        self.binary = (!binary.is_empty()).then_some(binary);
        self
    }

    /// JSON text that goes on the wire, preferring the cached raw string.
    pub fn json_text(&self) -> Option<String> {
        match (&self.json_raw, &self.json) {
            (Some(raw), _) => Some(raw.clone()),
            (None, Some(value)) => Some(value.to_string()),
            (None, None) => None,
        }
    }

    pub fn has_json(&self) -> bool {
        self.json_raw.as_ref().is_some_and(|raw| !raw.is_empty()) || self.json.is_some()
    }

    pub fn has_binary(&self) -> bool {
        self.binary.as_ref().is_some_and(|bytes| !bytes.is_empty())
    }
}

/// Fixed 17-byte chunk preamble.
///
/// ```text
/// [0]      flags (bit0 = binary, bit1 = JSON, bits 2-7 reserved)
/// [1-8]    JSON length   (i64, little-endian)
/// [9-16]   binary length (i64, little-endian)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub flags: u8,
    pub json_len: i64,
    pub binary_len: i64,
}

impl ChunkHeader {
    /// Build a header whose flags agree with the given span lengths.
    pub fn for_lengths(json_len: usize, binary_len: usize) -> Self {
        let mut flags = 0;
        if json_len > 0 {
            flags |= FLAG_JSON;
        }
        if binary_len > 0 {
            flags |= FLAG_BINARY;
        }
        Self {
            flags,
            json_len: json_len as i64,
            binary_len: binary_len as i64,
        }
    }

    pub fn parse(bytes: &[u8; CHUNK_HEADER_SIZE]) -> Self {
        let mut json_len = [0u8; 8];
        let mut binary_len = [0u8; 8];
        json_len.copy_from_slice(&bytes[1..9]);
        binary_len.copy_from_slice(&bytes[9..17]);
        Self {
            flags: bytes[0],
            json_len: i64::from_le_bytes(json_len),
            binary_len: i64::from_le_bytes(binary_len),
        }
    }

    pub fn to_bytes(&self) -> [u8; CHUNK_HEADER_SIZE] {
        let mut header = [0u8; CHUNK_HEADER_SIZE];
        header[0] = self.flags;
        header[1..9].copy_from_slice(&self.json_len.to_le_bytes());
        header[9..17].copy_from_slice(&self.binary_len.to_le_bytes());
        header
    }

    pub fn has_json(&self) -> bool {
        self.flags & FLAG_JSON != 0
    }

    pub fn has_binary(&self) -> bool {
        self.flags & FLAG_BINARY != 0
    }

    /// Check the flag/length agreement and reserved bits.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.flags & FLAG_RESERVED != 0 {
            return Err(StreamError::InvalidChunkHeader(format!(
                "reserved flag bits set: {:#010b}",
                self.flags
            )));
        }
        if self.json_len < 0 || self.binary_len < 0 {
            return Err(StreamError::InvalidChunkHeader(format!(
                "negative length (json {}, binary {})",
                self.json_len, self.binary_len
            )));
        }
        if self.has_json() != (self.json_len > 0) {
            return Err(StreamError::InvalidChunkHeader(format!(
                "JSON flag does not match length {}",
                self.json_len
            )));
        }
        if self.has_binary() != (self.binary_len > 0) {
            return Err(StreamError::InvalidChunkHeader(format!(
                "binary flag does not match length {}",
                self.binary_len
            )));
        }
        Ok(())
    }
}
