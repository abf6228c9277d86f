//! Raw little-endian PCM to normalized `f32`.
//!
//! Signed types map to `[-1.0, 1.0]` by dividing by the type's maximum.
//! Unsigned types map to `[0.0, 1.0]` the same way.

use crate::models::audio_models::PcmSampleType;
use crate::traits::audio_decoder::AudioDecoder;

/// Incremental PCM decoder.
///
/// Bytes that do not complete a sample are carried to the next call; the
/// carried remainder is always shorter than one sample.
#[derive(Debug, Clone)]
pub struct PcmDecoder {
    sample_type: PcmSampleType,
    channels: u16,
    sample_rate: u32,
    overflow: Vec<u8>,
    scratch: Vec<f32>,
}

impl PcmDecoder {
    pub fn new(sample_type: PcmSampleType, channels: u16, sample_rate: u32) -> Self {
        Self {
            sample_type,
            channels,
            sample_rate,
            overflow: Vec::with_capacity(sample_type.byte_width()),
            scratch: Vec::new(),
        }
    }

    pub fn sample_type(&self) -> PcmSampleType {
        self.sample_type
    }

    /// Bytes held over from the previous call.
    pub fn pending_bytes(&self) -> usize {
        self.overflow.len()
    }
}

impl AudioDecoder for PcmDecoder {
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
        let width = self.sample_type.byte_width();
        let mut rest = data;
        self.scratch.clear();

        // Complete the sample split by the previous call first
        if !self.overflow.is_empty() {
            let take = (width - self.overflow.len()).min(rest.len());
            self.overflow.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.overflow.len() < width {
                return data.len();
            }
            self.scratch.push(decode_sample(&self.overflow, self.sample_type));
            self.overflow.clear();
        }

        let whole = rest.len() - rest.len() % width;
        self.scratch.extend(
            rest[..whole]
                .chunks_exact(width)
                .map(|bytes| decode_sample(bytes, self.sample_type)),
        );
        self.overflow.extend_from_slice(&rest[whole..]);

        if !self.scratch.is_empty() {
            on_samples(&self.scratch);
        }
        data.len()
    }

    fn reset(&mut self) {
        self.overflow.clear();
        self.scratch.clear();
    }
}

/// Decode one sample. `bytes` must be exactly one sample wide.
pub fn decode_sample(bytes: &[u8], sample_type: PcmSampleType) -> f32 {
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    match sample_type {
        PcmSampleType::Int16 => {
            let raw = i16::from_le_bytes([buf[0], buf[1]]);
            (raw as f32 / i16::MAX as f32).max(-1.0)
        }
        PcmSampleType::UInt16 => u16::from_le_bytes([buf[0], buf[1]]) as f32 / u16::MAX as f32,
        PcmSampleType::Int32 => {
            let raw = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
            (raw as f64 / i32::MAX as f64).max(-1.0) as f32
        }
        PcmSampleType::UInt32 => {
            (u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as f64 / u32::MAX as f64) as f32
        }
        PcmSampleType::Int64 => {
            let raw = i64::from_le_bytes(buf);
            (raw as f64 / i64::MAX as f64).max(-1.0) as f32
        }
        PcmSampleType::UInt64 => (u64::from_le_bytes(buf) as f64 / u64::MAX as f64) as f32,
    }
}

/// Convert normalized samples to little-endian PCM bytes.
///
/// Clamps out-of-range values. Output length = `samples.len() * byte_width`.
pub fn encode_pcm(samples: &[f32], sample_type: PcmSampleType) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * sample_type.byte_width());
    for &sample in samples {
        let signed = sample.clamp(-1.0, 1.0) as f64;
        let unsigned = sample.clamp(0.0, 1.0) as f64;
        match sample_type {
            PcmSampleType::Int16 => {
                data.extend_from_slice(&((signed * i16::MAX as f64).round() as i16).to_le_bytes())
            }
            PcmSampleType::UInt16 => {
                data.extend_from_slice(&((unsigned * u16::MAX as f64).round() as u16).to_le_bytes())
            }
            PcmSampleType::Int32 => {
                data.extend_from_slice(&((signed * i32::MAX as f64).round() as i32).to_le_bytes())
            }
            PcmSampleType::UInt32 => {
                data.extend_from_slice(&((unsigned * u32::MAX as f64).round() as u32).to_le_bytes())
            }
            PcmSampleType::Int64 => {
                data.extend_from_slice(&((signed * i64::MAX as f64) as i64).to_le_bytes())
            }
            PcmSampleType::UInt64 => {
                data.extend_from_slice(&((unsigned * u64::MAX as f64) as u64).to_le_bytes())
            }
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn decode_all(decoder: &mut PcmDecoder, data: &[u8], step: usize) -> Vec<f32> {
        let mut out = Vec::new();
        for piece in data.chunks(step) {
            decoder.decode(piece, &mut |samples: &[f32]| out.extend_from_slice(samples));
        }
        out
    }

    #[test]
    fn int16_round_trip() {
        let raw: Vec<i16> = vec![0, 1, -1, 16384, -16384, i16::MAX, -i16::MAX, 1234];
        let bytes: Vec<u8> = raw.iter().flat_map(|v| v.to_le_bytes()).collect();

        let mut decoder = PcmDecoder::new(PcmSampleType::Int16, 1, 24000);
        let decoded = decode_all(&mut decoder, &bytes, bytes.len());

        assert_eq!(decoded.len(), raw.len());
        for (sample, value) in decoded.iter().zip(&raw) {
            assert_abs_diff_eq!(*sample, *value as f32 / 32767.0, epsilon = 1e-6);
        }
        assert_eq!(encode_pcm(&decoded, PcmSampleType::Int16), bytes);
    }

    #[test]
    fn misaligned_deliveries_match_single_call() {
        let samples: Vec<f32> = (0..97).map(|i| ((i as f32) * 0.37).sin() * 0.9).collect();

        for sample_type in [
            PcmSampleType::Int16,
            PcmSampleType::UInt16,
            PcmSampleType::Int32,
            PcmSampleType::UInt32,
            PcmSampleType::Int64,
            PcmSampleType::UInt64,
        ] {
            let bytes = encode_pcm(&samples, sample_type);
            let whole = decode_all(&mut PcmDecoder::new(sample_type, 1, 16000), &bytes, bytes.len());

            for step in [1, 3, 5, 7] {
                let mut decoder = PcmDecoder::new(sample_type, 1, 16000);
                let pieces = decode_all(&mut decoder, &bytes, step);
                assert_eq!(pieces, whole, "{:?} step {}", sample_type, step);
                assert_eq!(decoder.pending_bytes(), 0);
            }
        }
    }

    #[test]
    fn overflow_stays_below_sample_width() {
        let mut decoder = PcmDecoder::new(PcmSampleType::Int32, 1, 16000);
        let mut count = 0;
        decoder.decode(&[1, 2, 3, 4, 5, 6], &mut |s: &[f32]| count += s.len());
        assert_eq!(count, 1);
        assert_eq!(decoder.pending_bytes(), 2);

        decoder.decode(&[7], &mut |s: &[f32]| count += s.len());
        assert_eq!(count, 1);
        assert_eq!(decoder.pending_bytes(), 3);

        decoder.decode(&[8, 9], &mut |s: &[f32]| count += s.len());
        assert_eq!(count, 2);
        assert_eq!(decoder.pending_bytes(), 1);
    }

    #[test]
    fn normalization_ranges() {
        assert_abs_diff_eq!(decode_sample(&i16::MIN.to_le_bytes(), PcmSampleType::Int16), -1.0);
        assert_abs_diff_eq!(decode_sample(&i16::MAX.to_le_bytes(), PcmSampleType::Int16), 1.0);
        assert_abs_diff_eq!(decode_sample(&u16::MAX.to_le_bytes(), PcmSampleType::UInt16), 1.0);
        assert_abs_diff_eq!(decode_sample(&0u16.to_le_bytes(), PcmSampleType::UInt16), 0.0);
        assert_abs_diff_eq!(
            decode_sample(&(i32::MAX / 2).to_le_bytes(), PcmSampleType::Int32),
            0.5,
            epsilon = 1e-6
        );
        assert_abs_diff_eq!(decode_sample(&i64::MIN.to_le_bytes(), PcmSampleType::Int64), -1.0);
        assert_abs_diff_eq!(decode_sample(&u64::MAX.to_le_bytes(), PcmSampleType::UInt64), 1.0);
    }

    #[test]
    fn encode_clamps_out_of_range() {
        let pcm = encode_pcm(&[2.0, -3.0], PcmSampleType::Int16);
        assert_eq!(i16::from_le_bytes([pcm[0], pcm[1]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([pcm[2], pcm[3]]), -i16::MAX);
    }

    #[test]
    fn reset_drops_partial_sample() {
        let mut decoder = PcmDecoder::new(PcmSampleType::Int16, 1, 16000);
        decoder.decode(&[0xFF], &mut |_: &[f32]| {});
        decoder.reset();

        let mut out = Vec::new();
        decoder.decode(&[0x00, 0x40], &mut |s: &[f32]| out.extend_from_slice(s));
        assert_eq!(out.len(), 1);
        assert_abs_diff_eq!(out[0], 16384.0 / 32767.0, epsilon = 1e-6);
    }
}
