pub mod chunk_codec;
