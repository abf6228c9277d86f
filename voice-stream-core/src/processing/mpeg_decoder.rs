//! Streaming MP3 decoder.
//!
//! Network reads are cut at arbitrary points, so the decoder accumulates a
//! 4-byte header, validates it, then buffers the rest of the frame before
//! handing the complete frame to `nanomp3` for sample synthesis.
//!
//! A header that fails to parse costs one byte: the window slides forward and
//! the search for the next sync word continues. Corruption therefore drops the
//! damaged frame only, and playback resumes on the next valid one.

use crate::processing::mpeg_frame::{MpegFrame, MPEG_HEADER_SIZE};
use crate::traits::audio_decoder::AudioDecoder;

pub struct MpegDecoder {
    header: [u8; MPEG_HEADER_SIZE],
    header_len: usize,
    frame: Option<MpegFrame>,
    frame_bytes: Vec<u8>,
    inner: nanomp3::Decoder,
    pcm: Vec<f32>,
    channels: u16,
    sample_rate: u32,
    frame_index: u64,
    corrupt_headers: u64,
    resyncing: bool,
}

impl MpegDecoder {
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        Self {
            header: [0; MPEG_HEADER_SIZE],
            header_len: 0,
            frame: None,
            frame_bytes: Vec::new(),
            inner: nanomp3::Decoder::new(),
            pcm: vec![0.0; nanomp3::MAX_SAMPLES_PER_FRAME],
            channels,
            sample_rate,
            frame_index: 0,
            corrupt_headers: 0,
            resyncing: false,
        }
    }

    /// Frames handed to the sample decoder so far.
    pub fn frames_decoded(&self) -> u64 {
        self.frame_index
    }

    /// Header positions rejected while searching for frame sync.
    pub fn corrupt_headers(&self) -> u64 {
        self.corrupt_headers
    }

    /// Header of the frame currently being buffered, if any.
    pub fn current_frame(&self) -> Option<&MpegFrame> {
        self.frame.as_ref()
    }

    fn accept_header(&mut self) {
        match MpegFrame::parse(&self.header) {
            Ok(frame) => {
                if self.resyncing {
                    log::debug!(
                        "MP3 frame sync recovered after {} rejected header positions",
                        self.corrupt_headers
                    );
                    self.resyncing = false;
                }
                self.frame_bytes.clear();
                self.frame_bytes.reserve(frame.frame_length);
                self.frame_bytes.extend_from_slice(&self.header);
                self.frame = Some(frame);
            }
            Err(e) => {
                self.corrupt_headers += 1;
                if !self.resyncing {
                    log::warn!("MP3 frame {} header rejected, resyncing: {}", self.frame_index, e);
                    self.resyncing = true;
                } else {
                    log::trace!("MP3 header rejected: {}", e);
                }
                // Resume the sync search one byte further on
                self.header.copy_within(1.., 0);
                self.header_len = MPEG_HEADER_SIZE - 1;
            }
        }
    }

    fn decode_frame(&mut self, frame: MpegFrame, on_samples: &mut dyn FnMut(&[f32])) {
        self.channels = frame.channels();
        self.sample_rate = frame.sample_rate;
        if let Ok(begin) = frame.main_data_begin(&self.frame_bytes) {
            if begin > 0 {
                log::trace!("MP3 frame {} borrows {} reservoir bytes", self.frame_index, begin);
            }
        }

        let (consumed, info) = self.inner.decode(&self.frame_bytes, &mut self.pcm);
        match info {
            Some(info) => {
                let channels = (info.channels.num() as usize).max(1);
                let len = (info.samples_produced * channels).min(self.pcm.len());
                if len > 0 {
                    on_samples(&self.pcm[..len]);
                }
            }
            None => {
                log::debug!(
                    "MP3 frame {} ({} bytes) produced no samples, {} consumed",
                    self.frame_index,
                    self.frame_bytes.len(),
                    consumed
                );
            }
        }
        self.frame_index += 1;
    }

    fn clear_frame(&mut self) {
        self.frame = None;
        self.frame_bytes.clear();
        self.header_len = 0;
    }
}

impl AudioDecoder for MpegDecoder {
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
            match self.frame {
                None => {
                    let take = (MPEG_HEADER_SIZE - self.header_len).min(data.len() - pos);
                    self.header[self.header_len..self.header_len + take].copy_from_slice(&data[pos..pos + take]);
                    self.header_len += take;
                    pos += take;
                    if self.header_len == MPEG_HEADER_SIZE {
                        self.accept_header();
                    }
                }
                Some(frame) => {
                    let take = (frame.frame_length - self.frame_bytes.len()).min(data.len() - pos);
                    self.frame_bytes.extend_from_slice(&data[pos..pos + take]);
                    pos += take;
                    if self.frame_bytes.len() == frame.frame_length {
                        self.decode_frame(frame, on_samples);
                        self.clear_frame();
                    }
                }
            }
        }
        pos
    }

    fn reset(&mut self) {
        self.clear_frame();
        self.inner = nanomp3::Decoder::new();
        self.resyncing = false;
    }
}
