pub mod clip_stream;
