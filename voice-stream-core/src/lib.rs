//! # voice-stream-core
//!
//! Streaming audio transport and decode core for voice services.
//!
//! Network reads arrive cut at arbitrary points. The chunk codec splits them
//! into JSON control messages and binary audio, format decoders (PCM, MP3,
//! WAV, optionally wrapped in a text/audio demux) turn the audio into
//! normalized `f32` samples, and a ring-buffered clip stream hands those to
//! any number of readers. Sockets, HTTP and playback belong to the host.
//!
//! ## Architecture
//!
//! ```text
//! voice-stream-core (this crate)
//! ├── traits/       ← AudioDecoder, StreamDelegate
//! ├── models/       ← StreamError, StreamState, StreamConfiguration, Chunk, ChunkHeader, etc.
//! ├── transport/    ← ChunkDecoder, encode_chunk
//! ├── processing/   ← BitReader, PCM/MPEG/WAV decoders, TextAudioDemux, RingBuffer
//! ├── storage/      ← AudioClipStream
//! └── session/      ← StreamSession (open/receive/finish/close orchestrator)
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;
pub mod transport;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{AudioEncoding, PcmSampleType, StreamDiagnostics};
pub use models::chunk::{Chunk, ChunkHeader};
pub use models::config::StreamConfiguration;
pub use models::error::StreamError;
pub use models::session_info::StreamSessionInfo;
pub use models::state::StreamState;
pub use processing::decoder_factory::create_decoder;
pub use processing::ring_buffer::{Marker, MarkerRead, RingBuffer};
pub use session::stream_session::StreamSession;
pub use storage::clip_stream::{AudioClipStream, ClipStreamEvent};
pub use traits::audio_decoder::{AudioDecoder, TextCallback};
pub use traits::stream_delegate::StreamDelegate;
pub use transport::chunk_codec::{encode_chunk, ChunkDecoder};
