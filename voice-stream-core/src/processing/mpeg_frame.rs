//! MPEG audio (Layer I/II/III) frame header parsing.
//!
//! Header layout (ISO/IEC 11172-3 / 13818-3), 32 bits MSB-first:
//! ```text
//! AAAAAAAA AAABBCCD EEEEFFGH IIJJKLMM
//! A sync (11)   B version (2)   C layer (2)      D protection (1)
//! E bitrate (4) F sample rate (2) G padding (1)  H private (1)
//! I mode (2)    J mode ext (2)  K copyright (1)  L original (1)  M emphasis (2)
//! ```

use crate::models::error::StreamError;
use crate::processing::bit_reader::BitReader;

/// Size of an MPEG audio frame header in bytes.
pub const MPEG_HEADER_SIZE: usize = 4;

const CRC_SIZE: usize = 2;

// Bitrates in kbps, indexed by the 4-bit bitrate field. Index 0 is free format, 15 is invalid.
const BITRATES_V1_L1: [u32; 15] = [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448];
const BITRATES_V1_L2: [u32; 15] = [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384];
const BITRATES_V1_L3: [u32; 15] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
const BITRATES_V2_L1: [u32; 15] = [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256];
const BITRATES_V2_L23: [u32; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

const SAMPLE_RATES_V1: [u32; 3] = [44100, 48000, 32000];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegLayer {
    Layer1,
    Layer2,
    Layer3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    Mono,
}

/// Decoded header of one MPEG audio frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpegFrame {
    pub version: MpegVersion,
    pub layer: MpegLayer,
    pub has_crc: bool,
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
    pub padding: bool,
    pub private_bit: bool,
    pub channel_mode: ChannelMode,
    pub mode_extension: u8,
    pub copyright: bool,
    pub original: bool,
    pub emphasis: u8,
    /// Total frame size in bytes, header included.
    pub frame_length: usize,
    /// Samples per channel produced by this frame.
    pub samples_per_frame: usize,
}

impl MpegFrame {
    /// Parse the 4-byte header at the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, StreamError> {
        let mut reader = BitReader::new(bytes);

        let sync = reader.read_bits(11)?;
        if sync != 0x7FF {
            return Err(StreamError::InvalidFrameHeader(format!("bad frame sync {:#05x}", sync)));
        }

        let version = match reader.read_bits(2)? {
            0 => MpegVersion::Mpeg25,
            2 => MpegVersion::Mpeg2,
            3 => MpegVersion::Mpeg1,
            _ => return Err(StreamError::InvalidFrameHeader("reserved version".into())),
        };
        let layer = match reader.read_bits(2)? {
            1 => MpegLayer::Layer3,
            2 => MpegLayer::Layer2,
            3 => MpegLayer::Layer1,
            _ => return Err(StreamError::InvalidFrameHeader("reserved layer".into())),
        };
        // Protection bit is 0 when a CRC follows the header
        let has_crc = !reader.read_bit()?;

        let bitrate_index = reader.read_bits(4)? as usize;
        if bitrate_index == 0 {
            return Err(StreamError::FreeFormatUnsupported);
        }
        let table = match (version, layer) {
            (MpegVersion::Mpeg1, MpegLayer::Layer1) => &BITRATES_V1_L1,
            (MpegVersion::Mpeg1, MpegLayer::Layer2) => &BITRATES_V1_L2,
            (MpegVersion::Mpeg1, MpegLayer::Layer3) => &BITRATES_V1_L3,
            (_, MpegLayer::Layer1) => &BITRATES_V2_L1,
            (_, _) => &BITRATES_V2_L23,
        };
        let bitrate_kbps = *table
            .get(bitrate_index)
            .ok_or_else(|| StreamError::InvalidFrameHeader("bitrate index 15".into()))?;

        let sample_rate_index = reader.read_bits(2)? as usize;
        let base_rate = *SAMPLE_RATES_V1
            .get(sample_rate_index)
            .ok_or_else(|| StreamError::InvalidFrameHeader("reserved sample rate index".into()))?;
        let sample_rate = match version {
            MpegVersion::Mpeg1 => base_rate,
            MpegVersion::Mpeg2 => base_rate / 2,
            MpegVersion::Mpeg25 => base_rate / 4,
        };

        let padding = reader.read_bit()?;
        let private_bit = reader.read_bit()?;
        let channel_mode = match reader.read_bits(2)? {
            0 => ChannelMode::Stereo,
            1 => ChannelMode::JointStereo,
            2 => ChannelMode::DualChannel,
            _ => ChannelMode::Mono,
        };
        let mode_extension = reader.read_bits(2)? as u8;
        let copyright = reader.read_bit()?;
        let original = reader.read_bit()?;
        let emphasis = reader.read_bits(2)? as u8;

        let samples_per_frame = match (version, layer) {
            (_, MpegLayer::Layer1) => 384,
            (_, MpegLayer::Layer2) | (MpegVersion::Mpeg1, MpegLayer::Layer3) => 1152,
            (_, MpegLayer::Layer3) => 576,
        };
        let bitrate = bitrate_kbps as usize * 1000;
        let frame_length = match layer {
            MpegLayer::Layer1 => (12 * bitrate / sample_rate as usize + padding as usize) * 4,
            _ => samples_per_frame / 8 * bitrate / sample_rate as usize + padding as usize,
        };

        let frame = Self {
            version,
            layer,
            has_crc,
            bitrate_kbps,
            sample_rate,
            padding,
            private_bit,
            channel_mode,
            mode_extension,
            copyright,
            original,
            emphasis,
            frame_length,
            samples_per_frame,
        };
        if frame.frame_length < frame.min_frame_length() {
            return Err(StreamError::InvalidFrameHeader(format!(
                "frame length {} shorter than its headers",
                frame.frame_length
            )));
        }
        Ok(frame)
    }

    pub fn channels(&self) -> u16 {
        match self.channel_mode {
            ChannelMode::Mono => 1,
            _ => 2,
        }
    }

    /// Layer III side information size in bytes (0 for layers I and II).
    pub fn side_info_len(&self) -> usize {
        match (self.layer, self.version, self.channel_mode) {
            (MpegLayer::Layer3, MpegVersion::Mpeg1, ChannelMode::Mono) => 17,
            (MpegLayer::Layer3, MpegVersion::Mpeg1, _) => 32,
            (MpegLayer::Layer3, _, ChannelMode::Mono) => 9,
            (MpegLayer::Layer3, _, _) => 17,
            _ => 0,
        }
    }

    /// Smallest frame that can hold the header, CRC and side information.
    pub fn min_frame_length(&self) -> usize {
        MPEG_HEADER_SIZE + if self.has_crc { CRC_SIZE } else { 0 } + self.side_info_len()
    }

    /// Layer III `main_data_begin`: how many bytes of this frame's audio live
    /// in earlier frames. `frame` must start at the header.
    pub fn main_data_begin(&self, frame: &[u8]) -> Result<u16, StreamError> {
        if self.layer != MpegLayer::Layer3 {
            return Ok(0);
        }
        let mut reader = BitReader::new(frame);
        reader.skip_bits(MPEG_HEADER_SIZE * 8)?;
        if self.has_crc {
            reader.skip_bits(CRC_SIZE * 8)?;
        }
        let width = if self.version == MpegVersion::Mpeg1 { 9 } else { 8 };
        Ok(reader.read_bits(width)? as u16)
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples_per_frame as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mpeg1_layer3_128k_44100() {
        let frame = MpegFrame::parse(&[0xFF, 0xFB, 0x90, 0x00]).unwrap();

        assert_eq!(frame.version, MpegVersion::Mpeg1);
        assert_eq!(frame.layer, MpegLayer::Layer3);
        assert!(!frame.has_crc);
        assert_eq!(frame.bitrate_kbps, 128);
        assert_eq!(frame.sample_rate, 44100);
        assert!(!frame.padding);
        assert_eq!(frame.channel_mode, ChannelMode::Stereo);
        assert_eq!(frame.channels(), 2);
        assert_eq!(frame.frame_length, 417);
        assert_eq!(frame.samples_per_frame, 1152);
        assert_eq!(frame.side_info_len(), 32);
    }

    #[test]
    fn padding_adds_one_byte() {
        let frame = MpegFrame::parse(&[0xFF, 0xFB, 0x92, 0x00]).unwrap();
        assert!(frame.padding);
        assert_eq!(frame.frame_length, 418);
    }

    #[test]
    fn crc_and_header_flags() {
        // Protection bit cleared, joint stereo, mode ext 2, copyright + original, emphasis 1
        let frame = MpegFrame::parse(&[0xFF, 0xFA, 0x91, 0x6D]).unwrap();
        assert!(frame.has_crc);
        assert!(frame.private_bit);
        assert_eq!(frame.channel_mode, ChannelMode::JointStereo);
        assert_eq!(frame.mode_extension, 2);
        assert!(frame.copyright);
        assert!(frame.original);
        assert_eq!(frame.emphasis, 1);
        assert_eq!(frame.min_frame_length(), 4 + 2 + 32);
    }

    #[test]
    fn mpeg2_and_mpeg25_layer3_halve_frame_size() {
        let v2 = MpegFrame::parse(&[0xFF, 0xF3, 0x80, 0xC0]).unwrap();
        assert_eq!(v2.version, MpegVersion::Mpeg2);
        assert_eq!(v2.bitrate_kbps, 64);
        assert_eq!(v2.sample_rate, 22050);
        assert_eq!(v2.samples_per_frame, 576);
        assert_eq!(v2.frame_length, 208);
        assert_eq!(v2.channels(), 1);
        assert_eq!(v2.side_info_len(), 9);

        let v25 = MpegFrame::parse(&[0xFF, 0xE3, 0x80, 0x00]).unwrap();
        assert_eq!(v25.version, MpegVersion::Mpeg25);
        assert_eq!(v25.sample_rate, 11025);
        assert_eq!(v25.frame_length, 417);
    }

    #[test]
    fn layer1_and_layer2_lengths() {
        let l1 = MpegFrame::parse(&[0xFF, 0xFF, 0xC0, 0x00]).unwrap();
        assert_eq!(l1.layer, MpegLayer::Layer1);
        assert_eq!(l1.bitrate_kbps, 384);
        assert_eq!(l1.samples_per_frame, 384);
        assert_eq!(l1.frame_length, 416);

        let l2 = MpegFrame::parse(&[0xFF, 0xFD, 0xC4, 0x00]).unwrap();
        assert_eq!(l2.layer, MpegLayer::Layer2);
        assert_eq!(l2.bitrate_kbps, 256);
        assert_eq!(l2.sample_rate, 48000);
        assert_eq!(l2.frame_length, 768);
    }

    #[test]
    fn invalid_headers_are_rejected() {
        let cases: [[u8; 4]; 5] = [
            [0xFE, 0xFB, 0x90, 0x00], // broken sync
            [0xFF, 0xEB, 0x90, 0x00], // reserved version
            [0xFF, 0xF9, 0x90, 0x00], // reserved layer
            [0xFF, 0xFB, 0xF0, 0x00], // bitrate index 15
            [0xFF, 0xFB, 0x9C, 0x00], // sample rate index 3
        ];
        for header in cases {
            assert!(
                matches!(MpegFrame::parse(&header), Err(StreamError::InvalidFrameHeader(_))),
                "{:02X?}",
                header
            );
        }
    }

    #[test]
    fn free_format_is_unsupported() {
        assert_eq!(
            MpegFrame::parse(&[0xFF, 0xFB, 0x00, 0x00]),
            Err(StreamError::FreeFormatUnsupported)
        );
    }

    #[test]
    fn short_input_is_insufficient() {
        assert!(matches!(
            MpegFrame::parse(&[0xFF, 0xFB]),
            Err(StreamError::InsufficientData { .. })
        ));
    }

    #[test]
    fn reads_main_data_begin() {
        let mut frame_bytes = vec![0u8; 417];
        frame_bytes[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
        // 9-bit main_data_begin = 0b1_0000_0011 (259)
        frame_bytes[4] = 0b1000_0001;
        frame_bytes[5] = 0b1000_0000;

        let frame = MpegFrame::parse(&frame_bytes).unwrap();
        assert_eq!(frame.main_data_begin(&frame_bytes).unwrap(), 259);
    }
}
