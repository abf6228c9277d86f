use std::sync::Arc;

/// Callback invoked with each fully assembled text record of a demuxed stream.
pub type TextCallback = Arc<dyn Fn(&str) + Send + Sync + 'static>;

/// Incremental decoder from encoded bytes to normalized `f32` samples.
///
/// `decode` is fed network reads of any length, including single bytes, and
/// calls `on_samples` zero or more times with interleaved samples. Decoders
/// keep partial samples, headers and frames between calls. One instance
/// serves one stream and must not be fed from several threads at once.
pub trait AudioDecoder: Send {
    /// Configure the expected channel count and sample rate.
    ///
    /// Self-describing formats (MP3, WAV) replace these once their headers
    /// have been read.
    fn setup(&mut self, channels: u16, sample_rate: u32);

    fn channels(&self) -> u16;

    fn sample_rate(&self) -> u32;

    /// Decode `data`, returning the number of bytes consumed.
    fn decode(&mut self, data: &[u8], on_samples: &mut dyn FnMut(&[f32])) -> usize;

    /// Drop all carried state so the next byte starts a fresh stream.
    fn reset(&mut self);
}
