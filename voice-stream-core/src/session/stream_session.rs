use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::StreamDiagnostics;
use crate::models::chunk::Chunk;
use crate::models::config::StreamConfiguration;
use crate::models::error::StreamError;
use crate::models::session_info::StreamSessionInfo;
use crate::models::state::StreamState;
use crate::processing::decoder_factory::create_decoder;
use crate::processing::ring_buffer::Marker;
use crate::storage::clip_stream::{AudioClipStream, ClipStreamEvent, ClipStreamListener};
use crate::traits::audio_decoder::{AudioDecoder, TextCallback};
use crate::traits::stream_delegate::StreamDelegate;
use crate::transport::chunk_codec::ChunkDecoder;

/// Decoder output side of a session: one audio decoder feeding one clip.
///
/// The clip is created on the first decoded samples so it takes the format
/// MP3 and WAV streams report in their own headers.
struct AudioPipeline {
    decoder: Box<dyn AudioDecoder>,
    clip: Option<Arc<AudioClipStream>>,
    ready_length_secs: f32,
    max_length_secs: f32,
    listener: ClipStreamListener,
    decoded: Vec<f32>,
    samples_decoded: u64,
}

impl AudioPipeline {
    fn feed(&mut self, bytes: &[u8]) {
        let decoded = &mut self.decoded;
        decoded.clear();
        self.decoder
            .decode(bytes, &mut |samples: &[f32]| decoded.extend_from_slice(samples));
        if self.decoded.is_empty() {
            return;
        }
        self.samples_decoded += self.decoded.len() as u64;

        let clip = match &self.clip {
            Some(clip) => Arc::clone(clip),
            None => {
                let (channels, sample_rate) = (self.decoder.channels(), self.decoder.sample_rate());
                log::debug!("Audio clip started: {} channels at {} Hz", channels, sample_rate);
                let stream =
                    AudioClipStream::new(channels, sample_rate, self.ready_length_secs, self.max_length_secs)
                        .with_listener(Arc::clone(&self.listener));
                let clip = Arc::new(stream);
                self.clip = Some(Arc::clone(&clip));
                clip
            }
        };
        if let Err(e) = clip.add_samples(&self.decoded) {
            log::warn!("Dropping {} decoded samples: {}", self.decoded.len(), e);
        }
    }
}

/// Delegate slot shared with the decoder callbacks, so a delegate set after
/// `open` still receives text and clip events.
type DelegateSlot = Arc<Mutex<Option<Arc<dyn StreamDelegate>>>>;

fn current_delegate(slot: &DelegateSlot) -> Option<Arc<dyn StreamDelegate>> {
    slot.lock().clone()
}

/// Orchestrates one voice stream from network bytes to a playable clip.
///
/// ```text
/// bytes → [ChunkDecoder] ─ JSON ──────────────────────────→ delegate.on_chunk
///               └──────── binary → [AudioDecoder] → [AudioClipStream] → Marker readers
///                                     └─ text records ──→ delegate.on_text
/// ```
///
/// With `chunked_transport` off, bytes go straight to the audio decoder.
/// All decoding happens synchronously on the thread calling [`receive`].
///
/// [`receive`]: StreamSession::receive
pub struct StreamSession {
    config: StreamConfiguration,
    state: StreamState,
    info: Option<StreamSessionInfo>,
    delegate: DelegateSlot,
    chunks: ChunkDecoder,
    pipeline: Option<AudioPipeline>,
    diagnostics: Arc<Mutex<StreamDiagnostics>>,
}

impl StreamSession {
    pub fn new(config: StreamConfiguration) -> Result<Self, StreamError> {
        config.validate().map_err(StreamError::ConfigurationFailed)?;
        Ok(Self {
            config,
            state: StreamState::Idle,
            info: None,
            delegate: Arc::new(Mutex::new(None)),
            chunks: ChunkDecoder::new(),
            pipeline: None,
            diagnostics: Arc::new(Mutex::new(StreamDiagnostics::default())),
        })
    }

    /// Install the event delegate. Takes effect immediately, including for
    /// a stream that is already open.
    pub fn set_delegate(&mut self, delegate: Arc<dyn StreamDelegate>) {
        *self.delegate.lock() = Some(delegate);
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn config(&self) -> &StreamConfiguration {
        &self.config
    }

    /// Identity of the current stream, once opened.
    pub fn info(&self) -> Option<&StreamSessionInfo> {
        self.info.as_ref()
    }

    pub fn diagnostics(&self) -> StreamDiagnostics {
        self.diagnostics.lock().clone()
    }

    /// Clip receiving decoded audio. `None` until the first samples decode.
    pub fn clip(&self) -> Option<Arc<AudioClipStream>> {
        self.pipeline.as_ref().and_then(|p| p.clip.clone())
    }

    /// Reader at the oldest retained sample of the clip.
    pub fn create_reader(&self) -> Option<Marker<f32>> {
        self.clip().map(|clip| clip.create_reader())
    }

    /// Start a stream. Transitions: idle/completed/closed → open.
    pub fn open(&mut self) -> Result<StreamSessionInfo, StreamError> {
        if self.state.accepts_data() {
            return Err(StreamError::InvalidState(format!(
                "cannot open a session that is {:?}",
                self.state
            )));
        }

        let decoder = create_decoder(&self.config, Some(self.text_callback()))?;
        self.pipeline = Some(AudioPipeline {
            decoder,
            clip: None,
            ready_length_secs: self.config.ready_length_secs,
            max_length_secs: self.config.max_length_secs,
            listener: self.clip_listener(),
            decoded: Vec::new(),
            samples_decoded: 0,
        });
        self.chunks = ChunkDecoder::new();
        *self.diagnostics.lock() = StreamDiagnostics::default();

        let info = StreamSessionInfo::new(&self.config);
        log::info!(
            "Stream {} opened: {:?} at {} Hz, {} channels, text events {}",
            info.id,
            info.encoding,
            info.sample_rate,
            info.channels,
            info.text_events
        );
        self.info = Some(info.clone());
        self.set_state(StreamState::Open);
        Ok(info)
    }

    /// Feed bytes from the network. Transitions: open → streaming.
    ///
    /// Corrupt data is logged and absorbed; only calling outside an open
    /// stream is an error.
    pub fn receive(&mut self, data: &[u8]) -> Result<(), StreamError> {
        if !self.state.accepts_data() {
            return Err(StreamError::InvalidState(format!(
                "cannot receive data while {:?}",
                self.state
            )));
        }
        let Some(pipeline) = self.pipeline.as_mut() else {
            return Err(StreamError::InvalidState("session has no decoder".into()));
        };

        if self.config.chunked_transport {
            let delegate = current_delegate(&self.delegate);
            let mut json_chunks = 0u64;
            self.chunks.decode_streaming(
                data,
                &mut |chunk: Chunk| {
                    json_chunks += 1;
                    if let Some(delegate) = &delegate {
                        delegate.on_chunk(&chunk);
                    }
                },
                &mut |binary: &[u8]| pipeline.feed(binary),
            );
            log::trace!("Received {} bytes, {} JSON chunks", data.len(), json_chunks);
        } else {
            pipeline.feed(data);
        }

        {
            let mut d = self.diagnostics.lock();
            d.bytes_received += data.len() as u64;
            d.chunks_decoded = self.chunks.records_decoded();
            d.chunks_dropped = self.chunks.records_dropped();
            d.samples_decoded = pipeline.samples_decoded;
        }

        if self.state == StreamState::Open {
            self.set_state(StreamState::Streaming);
        }
        Ok(())
    }

    /// End of stream: completes the clip. Transitions: open/streaming → completed.
    pub fn finish(&mut self) -> Result<(), StreamError> {
        if !self.state.accepts_data() {
            return Err(StreamError::InvalidState(format!(
                "cannot finish a session that is {:?}",
                self.state
            )));
        }
        if self.chunks.in_record() {
            log::warn!("Stream finished inside a chunk record, discarding the partial record");
            self.chunks.reset();
        }
        match self.clip() {
            Some(clip) => clip.mark_complete(),
            None => log::debug!("Stream finished without audio"),
        }
        self.set_state(StreamState::Completed);
        Ok(())
    }

    /// Stop the stream from any state. Readers keep the clip alive.
    pub fn close(&mut self) {
        if self.state == StreamState::Closed {
            return;
        }
        if let Some(clip) = self.clip() {
            clip.mark_complete();
        }
        self.pipeline = None;
        self.chunks.reset();
        let d = self.diagnostics();
        log::info!(
            "Stream {} closed: {} bytes, {} chunks ({} dropped), {} samples, {} text events",
            self.info.as_ref().map(|i| i.id.as_str()).unwrap_or("-"),
            d.bytes_received,
            d.chunks_decoded,
            d.chunks_dropped,
            d.samples_decoded,
            d.text_events
        );
        self.set_state(StreamState::Closed);
    }

    // --- Internal helpers ---

    fn set_state(&mut self, new_state: StreamState) {
        self.state = new_state;
        if let Some(delegate) = current_delegate(&self.delegate) {
            delegate.on_state_changed(new_state);
        }
    }

    fn text_callback(&self) -> TextCallback {
        let slot = Arc::clone(&self.delegate);
        let diagnostics = Arc::clone(&self.diagnostics);
        Arc::new(move |text: &str| {
            diagnostics.lock().text_events += 1;
            if let Some(delegate) = current_delegate(&slot) {
                delegate.on_text(text);
            }
        })
    }

    fn clip_listener(&self) -> ClipStreamListener {
        let slot = Arc::clone(&self.delegate);
        Arc::new(move |event: ClipStreamEvent| {
            if let Some(delegate) = current_delegate(&slot) {
                delegate.on_clip_event(event);
            }
        })
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if self.state.accepts_data() {
            self.close();
        }
    }
}
