//! WAV (RIFF) format utilities.
//!
//! Generates standard 44-byte PCM headers for exporting decoded audio and
//! parses the `fmt ` sub-chunk of incoming streams.

use crate::models::audio_models::PcmSampleType;
use crate::models::error::StreamError;
use crate::processing::pcm_decoder::encode_pcm;

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Size of the `RIFF....WAVE` preamble.
pub const RIFF_PREAMBLE_SIZE: usize = 12;

/// Size of a sub-chunk header: 4-byte id + 4-byte little-endian length.
pub const SUBCHUNK_HEADER_SIZE: usize = 8;

const FORMAT_PCM: u16 = 1;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Length of a `WAVE_FORMAT_EXTENSIBLE` fmt body, up to and including the SubFormat GUID.
const EXTENSIBLE_FMT_LEN: usize = 40;

/// `KSDATAFORMAT_SUBTYPE_PCM` as stored on disk.
const SUBFORMAT_PCM: [u8; 16] = [
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
];

/// Generate a 44-byte WAV RIFF header.
///
/// Format: PCM (format code 1), little-endian.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    36 + data_size
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bit_depth / 8
/// [32-33]  block_align = channels * bit_depth / 8
/// [34-35]  bit_depth
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(sample_rate: u32, bit_depth: u16, channels: u16, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let byte_rate = sample_rate * channels as u32 * bit_depth as u32 / 8;
    let block_align = channels * bit_depth / 8;
    let chunk_size = 36 + data_size;

    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&FORMAT_PCM.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bit_depth.to_le_bytes());

    // data sub-chunk
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Encode normalized samples as a complete 16-bit PCM WAV file.
pub fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Vec<u8> {
    let pcm = encode_pcm(samples, PcmSampleType::Int16);
    let mut wav = Vec::with_capacity(WAV_HEADER_SIZE + pcm.len());
    wav.extend_from_slice(&generate_wav_header(sample_rate, 16, channels, pcm.len() as u32));
    wav.extend_from_slice(&pcm);
    wav
}

/// Contents of a `fmt ` sub-chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub format_code: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub bit_depth: u16,
    /// SubFormat GUID of an extensible fmt chunk.
    pub sub_format: Option<[u8; 16]>,
}

impl WavFormat {
    /// Parse the body of a `fmt ` sub-chunk (without its 8-byte header).
    pub fn parse(body: &[u8]) -> Result<Self, StreamError> {
        if body.len() < 16 {
            return Err(StreamError::InvalidWavHeader(format!(
                "fmt chunk too short: {} bytes",
                body.len()
            )));
        }
        let format = Self {
            format_code: u16::from_le_bytes([body[0], body[1]]),
            channels: u16::from_le_bytes([body[2], body[3]]),
            sample_rate: u32::from_le_bytes([body[4], body[5], body[6], body[7]]),
            bit_depth: u16::from_le_bytes([body[14], body[15]]),
            sub_format: None,
        };
        if format.channels == 0 || format.sample_rate == 0 {
            return Err(StreamError::InvalidWavHeader(format!(
                "{} channels at {} Hz",
                format.channels, format.sample_rate
            )));
        }
        if format.format_code != FORMAT_EXTENSIBLE {
            return Ok(format);
        }
        if body.len() < EXTENSIBLE_FMT_LEN {
            return Err(StreamError::InvalidWavHeader(format!(
                "extensible fmt chunk too short: {} bytes",
                body.len()
            )));
        }
        let mut guid = [0u8; 16];
        guid.copy_from_slice(&body[24..EXTENSIBLE_FMT_LEN]);
        Ok(Self {
            sub_format: Some(guid),
            ..format
        })
    }

    /// Sample layout for this format. WAV stores 8-bit audio unsigned and
    /// wider audio signed.
    pub fn sample_type(&self) -> Result<PcmSampleType, StreamError> {
        let integer_pcm = match self.format_code {
            FORMAT_PCM => true,
            FORMAT_EXTENSIBLE => self.sub_format == Some(SUBFORMAT_PCM),
            _ => false,
        };
        if !integer_pcm {
            return Err(StreamError::UnsupportedPcmFormat(format!(
                "WAV format code {:#06x}, sub-format {:02x?}",
                self.format_code, self.sub_format
            )));
        }
        PcmSampleType::from_bits(self.bit_depth, self.bit_depth > 8)
    }
}

/// Split a sub-chunk header into its id and body length.
pub fn parse_subchunk_header(bytes: &[u8; SUBCHUNK_HEADER_SIZE]) -> ([u8; 4], u32) {
    let id = [bytes[0], bytes[1], bytes[2], bytes[3]];
    let len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    (id, len)
}

/// Check the 12-byte `RIFF....WAVE` preamble.
pub fn is_riff_wave(preamble: &[u8]) -> bool {
    preamble.len() >= RIFF_PREAMBLE_SIZE && &preamble[0..4] == b"RIFF" && &preamble[8..12] == b"WAVE"
}
