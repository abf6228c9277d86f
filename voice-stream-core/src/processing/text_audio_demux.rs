//! Text/audio demultiplexer.
//!
//! Splits a stream of records into caption text and audio bytes. Each record
//! starts with a 17-byte header:
//!
//! ```text
//! [0]      flags: bit 0 = audio present, bit 1 = text present
//! [1-8]    text length   (i64, little-endian)
//! [9-16]   audio length  (i64, little-endian)
//! ```
//!
//! followed by the text bytes (UTF-8) and then the audio bytes, which go
//! verbatim to the wrapped decoder. A header that fails validation means the
//! stream carries no records at all: everything from that point on, the
//! header bytes included, is passed to the wrapped decoder as audio until
//! `reset`.

use crate::traits::audio_decoder::{AudioDecoder, TextCallback};

pub const DEMUX_HEADER_SIZE: usize = 17;

const FLAG_AUDIO: u8 = 0x01;
const FLAG_TEXT: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Header,
    Text { remaining: u64, audio: u64 },
    Audio { remaining: u64 },
    Passthrough,
}

pub struct TextAudioDemux {
    inner: Box<dyn AudioDecoder>,
    on_text: Option<TextCallback>,
    max_text_bytes: u64,
    max_audio_bytes: u64,
    phase: Phase,
    header: [u8; DEMUX_HEADER_SIZE],
    header_len: usize,
    text: Vec<u8>,
    records: u64,
}

impl TextAudioDemux {
    /// Wrap `inner`. The limits bound a single record and only serve to
    /// recognise streams that carry no headers.
    pub fn new(
        inner: Box<dyn AudioDecoder>,
        on_text: Option<TextCallback>,
        max_text_bytes: u64,
        max_audio_bytes: u64,
    ) -> Self {
        Self {
            inner,
            on_text,
            max_text_bytes,
            max_audio_bytes,
            phase: Phase::Header,
            header: [0; DEMUX_HEADER_SIZE],
            header_len: 0,
            text: Vec::new(),
            records: 0,
        }
    }

    /// Records whose header has been accepted.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Whether header parsing was abandoned and all bytes go to the inner decoder.
    pub fn is_passthrough(&self) -> bool {
        self.phase == Phase::Passthrough
    }

    /// Validate the buffered header, returning `(text_len, audio_len)`.
    fn parse_header(&self) -> Result<(u64, u64), String> {
        let flags = self.header[0];
        let mut len = [0u8; 8];
        len.copy_from_slice(&self.header[1..9]);
        let text_len = i64::from_le_bytes(len);
        len.copy_from_slice(&self.header[9..17]);
        let audio_len = i64::from_le_bytes(len);

        if flags == 0 || flags & !(FLAG_AUDIO | FLAG_TEXT) != 0 {
            return Err(format!("bad flags {:#04x}", flags));
        }
        if text_len < 0 || audio_len < 0 {
            return Err(format!("negative length (text {}, audio {})", text_len, audio_len));
        }
        if (flags & FLAG_TEXT == 0 && text_len > 0) || (flags & FLAG_AUDIO == 0 && audio_len > 0) {
            return Err(format!(
                "flags {:#04x} disagree with lengths (text {}, audio {})",
                flags, text_len, audio_len
            ));
        }
        let (text_len, audio_len) = (text_len as u64, audio_len as u64);
        if text_len > self.max_text_bytes {
            return Err(format!("text length {} over limit {}", text_len, self.max_text_bytes));
        }
        if audio_len > self.max_audio_bytes {
            return Err(format!("audio length {} over limit {}", audio_len, self.max_audio_bytes));
        }
        Ok((text_len, audio_len))
    }

    fn next_record_phase(audio: u64) -> Phase {
        if audio > 0 {
            Phase::Audio { remaining: audio }
        } else {
            Phase::Header
        }
    }

    fn finish_header(&mut self, on_samples: &mut dyn FnMut(&[f32])) {
        self.header_len = 0;
        match self.parse_header() {
            Ok((text, audio)) => {
                self.records += 1;
                log::trace!("Demux record {}: {} text bytes, {} audio bytes", self.records, text, audio);
                self.phase = if text > 0 {
                    self.text.clear();
                    Phase::Text {
                        remaining: text,
                        audio,
                    }
                } else {
                    Self::next_record_phase(audio)
                };
            }
            Err(reason) => {
                log::warn!(
                    "Text/audio header rejected after {} records ({}), passing stream through as audio",
                    self.records,
                    reason
                );
                self.phase = Phase::Passthrough;
                let header = self.header;
                self.inner.decode(&header, on_samples);
            }
        }
    }

    fn finish_text(&mut self) {
        let text = match std::str::from_utf8(&self.text) {
            Ok(text) => text.to_owned(),
            Err(e) => {
                log::warn!("Demux text is not valid UTF-8 ({}), decoding lossily", e);
                String::from_utf8_lossy(&self.text).into_owned()
            }
        };
        self.text.clear();
        if let Some(on_text) = &self.on_text {
            on_text(&text);
        }
    }
}

impl AudioDecoder for TextAudioDemux {
    fn setup(&mut self, channels: u16, sample_rate: u32) {
        self.inner.setup(channels, sample_rate);
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn decode(&mut self, data: &[u8], on_samples: &mut dyn FnMut(&[f32])) -> usize {
        let mut pos = 0;
        while pos < data.len() {
            let rest = &data[pos..];
            match self.phase {
                Phase::Header => {
                    let take = (DEMUX_HEADER_SIZE - self.header_len).min(rest.len());
                    self.header[self.header_len..self.header_len + take].copy_from_slice(&rest[..take]);
                    self.header_len += take;
                    pos += take;
                    if self.header_len == DEMUX_HEADER_SIZE {
                        self.finish_header(on_samples);
                    }
                }
                Phase::Text { remaining, audio } => {
                    let take = remaining.min(rest.len() as u64) as usize;
                    self.text.extend_from_slice(&rest[..take]);
                    pos += take;
                    if remaining == take as u64 {
                        self.finish_text();
                        self.phase = Self::next_record_phase(audio);
                    } else {
                        self.phase = Phase::Text {
                            remaining: remaining - take as u64,
                            audio,
                        };
                    }
                }
                Phase::Audio { remaining } => {
                    let take = remaining.min(rest.len() as u64) as usize;
                    self.inner.decode(&rest[..take], on_samples);
                    pos += take;
                    self.phase = Self::next_record_phase(remaining - take as u64);
                }
                Phase::Passthrough => {
                    self.inner.decode(rest, on_samples);
                    pos = data.len();
                }
            }
        }
        pos
    }

    fn reset(&mut self) {
        self.phase = Phase::Header;
        self.header_len = 0;
        self.text.clear();
        self.inner.reset();
    }
}

/// Build one demux record. Used to produce test streams and by hosts that
/// re-multiplex decoded captions.
pub fn encode_record(text: Option<&str>, audio: Option<&[u8]>) -> Vec<u8> {
    let text = text.unwrap_or_default().as_bytes();
    let audio = audio.unwrap_or_default();
    let mut flags = 0;
    if !text.is_empty() {
        flags |= FLAG_TEXT;
    }
    if !audio.is_empty() {
        flags |= FLAG_AUDIO;
    }

    let mut out = Vec::with_capacity(DEMUX_HEADER_SIZE + text.len() + audio.len());
    out.push(flags);
    out.extend_from_slice(&(text.len() as i64).to_le_bytes());
    out.extend_from_slice(&(audio.len() as i64).to_le_bytes());
    out.extend_from_slice(text);
    out.extend_from_slice(audio);
    out
}
