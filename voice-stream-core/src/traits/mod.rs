pub mod audio_decoder;
pub mod stream_delegate;
