pub mod bit_reader;
pub mod decoder_factory;
pub mod mpeg_decoder;
pub mod mpeg_frame;
pub mod pcm_decoder;
pub mod ring_buffer;
pub mod text_audio_demux;
pub mod wav_decoder;
pub mod wav_format;
