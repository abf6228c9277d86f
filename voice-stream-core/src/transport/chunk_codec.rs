//! Chunk framing codec.
//!
//! Every message on the wire is a record:
//!
//! ```text
//! [flags: 1][json_len: i64 LE][binary_len: i64 LE][json bytes][binary bytes]
//! ```
//!
//! [`ChunkDecoder`] is a resumable state machine (header, JSON span, binary
//! span) fed with network reads of any size. A record whose header fails
//! validation is dropped and decoding resumes with the next 17 bytes.

use serde_json::Value;

use crate::models::chunk::{Chunk, ChunkHeader, CHUNK_HEADER_SIZE};

/// Upper bound on eager allocation for a declared span length.
const MAX_RESERVE: u64 = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Header,
    Json { remaining: u64, binary: u64 },
    Binary { remaining: u64 },
}

/// Incremental chunk decoder. One instance per connection.
#[derive(Debug)]
pub struct ChunkDecoder {
    phase: Phase,
    header: [u8; CHUNK_HEADER_SIZE],
    header_len: usize,
    json: Vec<u8>,
    binary: Vec<u8>,
    pending: Chunk,
    records_decoded: u64,
    records_dropped: u64,
    dropping: bool,
}

impl Default for ChunkDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self {
            phase: Phase::Header,
            header: [0; CHUNK_HEADER_SIZE],
            header_len: 0,
            json: Vec::new(),
            binary: Vec::new(),
            pending: Chunk::default(),
            records_decoded: 0,
            records_dropped: 0,
            dropping: false,
        }
    }

    /// Decode `data`, returning every record completed by it.
    pub fn decode(&mut self, data: &[u8]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        self.run(data, None, &mut |chunk| chunks.push(chunk));
        chunks
    }

    /// Decode `data` without buffering binary spans.
    ///
    /// Binary bytes go to `on_binary` as they arrive. A record's JSON is
    /// handed to `on_chunk` as soon as its span completes, so the chunk
    /// never carries binary; records without JSON produce no chunk.
    pub fn decode_streaming(
        &mut self,
        data: &[u8],
        on_chunk: &mut dyn FnMut(Chunk),
        on_binary: &mut dyn FnMut(&[u8]),
    ) {
        self.run(data, Some(on_binary), on_chunk);
    }

    /// Records decoded since creation.
    pub fn records_decoded(&self) -> u64 {
        self.records_decoded
    }

    /// Records dropped for an invalid header.
    pub fn records_dropped(&self) -> u64 {
        self.records_dropped
    }

    /// Whether a record is partially decoded.
    pub fn in_record(&self) -> bool {
        self.header_len > 0 || self.phase != Phase::Header
    }

    /// Discard any partial record.
    pub fn reset(&mut self) {
        self.phase = Phase::Header;
        self.header_len = 0;
        self.json.clear();
        self.binary.clear();
        self.pending = Chunk::default();
    }

    fn run(
        &mut self,
        data: &[u8],
        mut on_binary: Option<&mut dyn FnMut(&[u8])>,
        on_chunk: &mut dyn FnMut(Chunk),
    ) {
        let streaming = on_binary.is_some();
        let mut pos = 0;
        while pos < data.len() {
            let rest = &data[pos..];
            match self.phase {
                Phase::Header => {
                    let take = (CHUNK_HEADER_SIZE - self.header_len).min(rest.len());
                    self.header[self.header_len..self.header_len + take].copy_from_slice(&rest[..take]);
                    self.header_len += take;
                    pos += take;
                    if self.header_len == CHUNK_HEADER_SIZE {
                        self.header_len = 0;
                        self.start_record(streaming, on_chunk);
                    }
                }
                Phase::Json { remaining, binary } => {
                    let take = remaining.min(rest.len() as u64) as usize;
                    self.json.extend_from_slice(&rest[..take]);
                    pos += take;
                    if remaining > take as u64 {
                        self.phase = Phase::Json {
                            remaining: remaining - take as u64,
                            binary,
                        };
                        continue;
                    }

                    self.finish_json();
                    if streaming {
                        on_chunk(std::mem::take(&mut self.pending));
                    }
                    if binary > 0 {
                        self.start_binary(binary, streaming);
                    } else {
                        self.finish_record(streaming, on_chunk);
                    }
                }
                Phase::Binary { remaining } => {
                    let take = remaining.min(rest.len() as u64) as usize;
                    match on_binary {
                        Some(ref mut forward) => forward(&rest[..take]),
                        None => self.binary.extend_from_slice(&rest[..take]),
                    }
                    pos += take;
                    if remaining > take as u64 {
                        self.phase = Phase::Binary {
                            remaining: remaining - take as u64,
                        };
                    } else {
                        self.finish_record(streaming, on_chunk);
                    }
                }
            }
        }
    }

    fn start_record(&mut self, streaming: bool, on_chunk: &mut dyn FnMut(Chunk)) {
        let header = ChunkHeader::parse(&self.header);
        if let Err(e) = header.validate() {
            self.records_dropped += 1;
            if self.dropping {
                log::trace!("Dropping chunk record: {}", e);
            } else {
                log::warn!(
                    "Dropping chunk record after {} good records: {}",
                    self.records_decoded,
                    e
                );
                self.dropping = true;
            }
            self.phase = Phase::Header;
            return;
        }
        if self.dropping {
            log::debug!("Chunk framing recovered after {} dropped records", self.records_dropped);
            self.dropping = false;
        }

        log::trace!(
            "Chunk record: {} JSON bytes, {} binary bytes",
            header.json_len,
            header.binary_len
        );
        self.pending = Chunk::default();
        let (json_len, binary_len) = (header.json_len as u64, header.binary_len as u64);
        if json_len > 0 {
            self.json.clear();
            self.json.reserve(json_len.min(MAX_RESERVE) as usize);
            self.phase = Phase::Json {
                remaining: json_len,
                binary: binary_len,
            };
        } else if binary_len > 0 {
            self.start_binary(binary_len, streaming);
        } else {
            self.finish_record(streaming, on_chunk);
        }
    }

    fn start_binary(&mut self, len: u64, streaming: bool) {
        self.binary.clear();
        if !streaming {
            self.binary.reserve(len.min(MAX_RESERVE) as usize);
        }
        self.phase = Phase::Binary { remaining: len };
    }

    fn finish_json(&mut self) {
        let text = match String::from_utf8(std::mem::take(&mut self.json)) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Chunk JSON is not valid UTF-8 ({}), decoding lossily", e.utf8_error());
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        self.pending.json = match serde_json::from_str::<Value>(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Chunk JSON failed to parse, keeping raw text: {}", e);
                None
            }
        };
        self.pending.json_raw = Some(text);
    }

    fn finish_record(&mut self, streaming: bool, on_chunk: &mut dyn FnMut(Chunk)) {
        self.records_decoded += 1;
        self.phase = Phase::Header;
        if streaming {
            self.pending = Chunk::default();
            return;
        }
        let mut chunk = std::mem::take(&mut self.pending);
        if !self.binary.is_empty() {
            chunk.binary = Some(std::mem::take(&mut self.binary));
        }
        on_chunk(chunk);
    }
}

/// Serialize a chunk into one wire record.
///
/// The cached raw JSON string is sent when present so the bytes match what
/// the producer wrote; otherwise the tree is serialized.
pub fn encode_chunk(chunk: &Chunk) -> Vec<u8> {
    let json = chunk.json_text().unwrap_or_default();
    let binary = chunk.binary.as_deref().unwrap_or_default();

    let header = ChunkHeader::for_lengths(json.len(), binary.len());
    let mut out = Vec::with_capacity(CHUNK_HEADER_SIZE + json.len() + binary.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(json.as_bytes());
    out.extend_from_slice(binary);
    out
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use serde_json::json;

    use super::*;
    use crate::models::chunk::{FLAG_BINARY, FLAG_JSON};

    fn sample_chunks() -> Vec<Chunk> {
        vec![
            Chunk::new()
                .with_json_str(r#"{"type":"audio","seq":1}"#)
                .with_binary(vec![1, 2, 3, 4, 5]),
            Chunk::new().with_json_str(r#"{"type":"end"}"#),
            Chunk::new().with_binary((0..=255).collect::<Vec<u8>>()),
            Chunk::new(),
            Chunk::new().with_json_str("").with_binary(Vec::new()),
            Chunk::new().with_json_str(r#"{"text":"héllo wörld","score":0.10}"#),
        ]
    }

    fn encode_all(chunks: &[Chunk]) -> Vec<u8> {
        chunks.iter().flat_map(encode_chunk).collect()
    }

    #[test]
    fn round_trip_including_empty_spans() {
        for chunk in sample_chunks() {
            let mut decoder = ChunkDecoder::new();
            let decoded = decoder.decode(&encode_chunk(&chunk));
            assert_eq!(decoded, vec![chunk]);
            assert!(!decoder.in_record());
        }
    }

    #[test]
    fn tree_only_json_is_serialized() {
        let chunk = Chunk::new().with_json_value(json!({"event": "start"}));
        let decoded = ChunkDecoder::new().decode(&encode_chunk(&chunk));

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].json, chunk.json);
        assert_eq!(decoded[0].json_raw.as_deref(), Some(r#"{"event":"start"}"#));
    }

    #[test]
    fn encode_sends_raw_json_verbatim() {
        let raw = r#"{ "b": 1.50, "a": 2 }"#;
        let bytes = encode_chunk(&Chunk::new().with_json_str(raw));

        assert_eq!(bytes[0], FLAG_JSON);
        assert_eq!(&bytes[CHUNK_HEADER_SIZE..], raw.as_bytes());
    }

    #[test]
    fn byte_at_a_time_matches_single_call() {
        let stream = encode_all(&sample_chunks());
        let whole = ChunkDecoder::new().decode(&stream);
        assert_eq!(whole, sample_chunks());

        for step in [1, 2, 3, 16, 17, 18, 100] {
            let mut decoder = ChunkDecoder::new();
            let pieces: Vec<Chunk> = stream.chunks(step).flat_map(|piece| decoder.decode(piece)).collect();
            assert_eq!(pieces, whole, "step {}", step);
            assert_eq!(decoder.records_decoded(), 5);
        }
    }

    #[test]
    fn invalid_header_drops_only_that_record() {
        let chunks = sample_chunks();
        let mut stream = encode_chunk(&chunks[0]);
        let mut bad = ChunkHeader::for_lengths(0, 0).to_bytes();
        bad[0] = 0b0000_0100;
        stream.extend_from_slice(&bad);
        let mut mismatch = ChunkHeader::for_lengths(0, 0).to_bytes();
        mismatch[0] = FLAG_BINARY;
        stream.extend_from_slice(&mismatch);
        stream.extend(encode_chunk(&chunks[1]));

        let mut decoder = ChunkDecoder::new();
        let decoded = decoder.decode(&stream);

        assert_eq!(decoded, vec![chunks[0].clone(), chunks[1].clone()]);
        assert_eq!(decoder.records_dropped(), 2);
        assert_eq!(decoder.records_decoded(), 2);
    }

    #[test]
    fn streaming_mode_forwards_binary_and_emits_json_early() {
        let chunks = sample_chunks();
        let stream = encode_all(&chunks[..3]);
        let events = RefCell::new(Vec::new());
        let binary = RefCell::new(Vec::new());

        let mut decoder = ChunkDecoder::new();
        for piece in stream.chunks(4) {
            decoder.decode_streaming(
                piece,
                &mut |chunk| events.borrow_mut().push(chunk),
                &mut |bytes: &[u8]| binary.borrow_mut().extend_from_slice(bytes),
            );
        }

        let events = events.into_inner();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].json, chunks[0].json);
        assert!(events[0].binary.is_none());
        assert_eq!(events[1].json_raw, chunks[1].json_raw);

        let mut expected = vec![1, 2, 3, 4, 5];
        expected.extend(0..=255u8);
        assert_eq!(binary.into_inner(), expected);
        assert_eq!(decoder.records_decoded(), 3);
    }

    #[test]
    fn json_arrives_before_its_binary() {
        let stream = encode_chunk(&sample_chunks()[0]);
        let order = RefCell::new(Vec::new());

        let mut decoder = ChunkDecoder::new();
        decoder.decode_streaming(
            &stream,
            &mut |_| order.borrow_mut().push("json"),
            &mut |_: &[u8]| order.borrow_mut().push("binary"),
        );
        assert_eq!(order.into_inner(), vec!["json", "binary"]);
    }

    #[test]
    fn malformed_json_keeps_raw_text() {
        let mut stream = ChunkHeader::for_lengths(2, 0).to_bytes().to_vec();
        stream.extend_from_slice(&[0xFF, 0xFE]);
        let not_json = b"not json";
        stream.extend_from_slice(&ChunkHeader::for_lengths(not_json.len(), 0).to_bytes());
        stream.extend_from_slice(not_json);

        let decoded = ChunkDecoder::new().decode(&stream);
        assert_eq!(decoded.len(), 2);
        assert!(decoded[0].json.is_none());
        assert_eq!(decoded[0].json_raw.as_deref(), Some("\u{FFFD}\u{FFFD}"));
        assert!(decoded[1].json.is_none());
        assert_eq!(decoded[1].json_raw.as_deref(), Some("not json"));
    }

    #[test]
    fn reset_discards_partial_record() {
        let stream = encode_chunk(&sample_chunks()[0]);
        let mut decoder = ChunkDecoder::new();
        assert!(decoder.decode(&stream[..20]).is_empty());
        assert!(decoder.in_record());

        decoder.reset();
        assert_eq!(decoder.decode(&stream).len(), 1);
    }
}
