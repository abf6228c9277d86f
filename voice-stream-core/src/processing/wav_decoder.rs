//! Streaming WAV decoder.
//!
//! The RIFF header is parsed incrementally, so it may arrive split across any
//! number of network reads. Sub-chunks other than `fmt ` and `data` are
//! skipped. Once the `data` chunk starts, bytes are handed to a
//! [`PcmDecoder`] configured from the `fmt ` chunk.

use crate::models::audio_models::PcmSampleType;
use crate::processing::pcm_decoder::PcmDecoder;
use crate::processing::wav_format::{
    is_riff_wave, parse_subchunk_header, WavFormat, RIFF_PREAMBLE_SIZE, SUBCHUNK_HEADER_SIZE,
};
use crate::traits::audio_decoder::AudioDecoder;

/// Largest `fmt ` body accepted. Real files use 16, 18 or 40 bytes.
const MAX_FMT_LEN: usize = 256;

/// `data` sizes written by encoders that do not know the final length.
const STREAMING_SIZES: [u32; 2] = [0, u32::MAX];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Preamble,
    ChunkHeader,
    Format { len: usize, pad: bool },
    Skip { remaining: u64 },
    Data { remaining: Option<u64>, pad: bool },
    Discard,
}

pub struct WavDecoder {
    fallback_type: PcmSampleType,
    channels: u16,
    sample_rate: u32,
    phase: Phase,
    header: Vec<u8>,
    format: Option<WavFormat>,
    pcm: Option<PcmDecoder>,
}

impl WavDecoder {
    /// `fallback_type` is used when the stream turns out not to be RIFF.
    pub fn new(fallback_type: PcmSampleType, channels: u16, sample_rate: u32) -> Self {
        Self {
            fallback_type,
            channels,
            sample_rate,
            phase: Phase::Preamble,
            header: Vec::with_capacity(RIFF_PREAMBLE_SIZE),
            format: None,
            pcm: None,
        }
    }

    /// Format read from the `fmt ` chunk, once seen.
    pub fn format(&self) -> Option<&WavFormat> {
        self.format.as_ref()
    }

    /// Whether the decoder is inside a `data` chunk. Turns false again once a
    /// sized `data` chunk has been fully read.
    pub fn in_data(&self) -> bool {
        matches!(self.phase, Phase::Data { .. })
    }

    /// Buffer bytes into `self.header` until it holds `target` bytes.
    fn fill(&mut self, target: usize, data: &[u8]) -> usize {
        let take = (target - self.header.len()).min(data.len());
        self.header.extend_from_slice(&data[..take]);
        take
    }

    fn skip(&mut self, remaining: u64) {
        self.phase = if remaining == 0 {
            Phase::ChunkHeader
        } else {
            Phase::Skip { remaining }
        };
    }

    fn feed_pcm(&mut self, bytes: &[u8], on_samples: &mut dyn FnMut(&[f32])) {
        if let Some(pcm) = self.pcm.as_mut() {
            pcm.decode(bytes, on_samples);
        }
    }

    fn finish_preamble(&mut self, on_samples: &mut dyn FnMut(&[f32])) {
        if is_riff_wave(&self.header) {
            self.header.clear();
            self.phase = Phase::ChunkHeader;
            return;
        }

        log::warn!(
            "WAV stream has no RIFF header, decoding as raw {:?} PCM",
            self.fallback_type
        );
        self.pcm = Some(PcmDecoder::new(self.fallback_type, self.channels, self.sample_rate));
        self.phase = Phase::Data {
            remaining: None,
            pad: false,
        };
        let buffered = std::mem::take(&mut self.header);
        self.feed_pcm(&buffered, on_samples);
    }

    fn finish_chunk_header(&mut self) {
        let mut bytes = [0u8; SUBCHUNK_HEADER_SIZE];
        bytes.copy_from_slice(&self.header);
        self.header.clear();
        let (id, len) = parse_subchunk_header(&bytes);
        let pad = len % 2 == 1;

        match &id {
            b"fmt " => {
                if (len as usize) < 16 || len as usize > MAX_FMT_LEN {
                    log::error!("WAV fmt chunk has implausible length {}, discarding stream", len);
                    self.phase = Phase::Discard;
                } else {
                    self.phase = Phase::Format {
                        len: len as usize,
                        pad,
                    };
                }
            }
            b"data" => {
                if self.pcm.is_none() {
                    log::error!("WAV data chunk before a usable fmt chunk, discarding stream");
                    self.phase = Phase::Discard;
                    return;
                }
                let remaining = if STREAMING_SIZES.contains(&len) {
                    None
                } else {
                    Some(len as u64)
                };
                log::debug!("WAV data chunk started ({:?} bytes declared)", remaining);
                self.phase = Phase::Data { remaining, pad };
            }
            other => {
                log::trace!(
                    "Skipping WAV chunk {:?} ({} bytes)",
                    String::from_utf8_lossy(other),
                    len
                );
                self.skip(len as u64 + pad as u64);
            }
        }
    }

    fn finish_format(&mut self, pad: bool) {
        let parsed = WavFormat::parse(&self.header).and_then(|format| Ok((format, format.sample_type()?)));
        self.header.clear();

        match parsed {
            Ok((format, sample_type)) => {
                log::debug!(
                    "WAV format: {} channels, {} Hz, {}-bit",
                    format.channels,
                    format.sample_rate,
                    format.bit_depth
                );
                self.channels = format.channels;
                self.sample_rate = format.sample_rate;
                self.format = Some(format);
                self.pcm = Some(PcmDecoder::new(sample_type, format.channels, format.sample_rate));
                self.skip(pad as u64);
            }
            Err(e) => {
                log::error!("Unsupported WAV stream, discarding audio: {}", e);
                self.phase = Phase::Discard;
            }
        }
    }
}

impl AudioDecoder for WavDecoder {
    fn setup(&mut self, channels: u16, sample_rate: u32) {
        self.channels = channels;
        self.sample_rate = sample_rate;
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn decode(&mut self, data: &[u8], on_samples: &mut dyn FnMut(&[f32])) -> usize {
        let mut pos = 0;
        while pos < data.len() {
            let rest = &data[pos..];
            match self.phase {
                Phase::Preamble => {
                    pos += self.fill(RIFF_PREAMBLE_SIZE, rest);
                    if self.header.len() == RIFF_PREAMBLE_SIZE {
                        self.finish_preamble(on_samples);
                    }
                }
                Phase::ChunkHeader => {
                    pos += self.fill(SUBCHUNK_HEADER_SIZE, rest);
                    if self.header.len() == SUBCHUNK_HEADER_SIZE {
                        self.finish_chunk_header();
                    }
                }
                Phase::Format { len, pad } => {
                    pos += self.fill(len, rest);
                    if self.header.len() == len {
                        self.finish_format(pad);
                    }
                }
                Phase::Skip { remaining } => {
                    let take = remaining.min(rest.len() as u64);
                    pos += take as usize;
                    self.skip(remaining - take);
                }
                Phase::Data { remaining: None, .. } => {
                    self.feed_pcm(rest, on_samples);
                    pos = data.len();
                }
                Phase::Data {
                    remaining: Some(remaining),
                    pad,
                } => {
                    let take = remaining.min(rest.len() as u64) as usize;
                    self.feed_pcm(&rest[..take], on_samples);
                    pos += take;
                    if remaining == take as u64 {
                        self.skip(pad as u64);
                    } else {
                        self.phase = Phase::Data {
                            remaining: Some(remaining - take as u64),
                            pad,
                        };
                    }
                }
                Phase::Discard => pos = data.len(),
            }
        }
        pos
    }

    fn reset(&mut self) {
        self.phase = Phase::Preamble;
        self.header.clear();
        self.format = None;
        self.pcm = None;
    }
}
