//! MSB-first bit reader over a byte slice.
//!
//! Bytes are pulled into a 64-bit bucket as needed; consumed high bits are
//! masked off after every read so the bucket only ever holds unread bits.
//! Used for MPEG frame headers and side information.

use crate::models::error::StreamError;

#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    bucket: u64,
    bucket_bits: u32,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bucket: 0,
            bucket_bits: 0,
        }
    }

    /// Read `count` bits (1..=32) as an unsigned integer, first bit most significant.
    pub fn read_bits(&mut self, count: u32) -> Result<u32, StreamError> {
        if count == 0 || count > 32 {
            return Err(StreamError::InvalidState(format!(
                "bit reads must be 1..=32 bits, got {}",
                count
            )));
        }
        let available = self.bits_remaining();
        if (count as usize) > available {
            return Err(StreamError::InsufficientData {
                requested: count as usize,
                available,
            });
        }

        // At most 31 bits are carried over, so the bucket never exceeds 39 bits.
        while self.bucket_bits < count {
            self.bucket = (self.bucket << 8) | u64::from(self.data[self.byte_pos]);
            self.byte_pos += 1;
            self.bucket_bits += 8;
        }

        let shift = self.bucket_bits - count;
        let value = (self.bucket >> shift) & ((1u64 << count) - 1);
        self.bucket_bits = shift;
        self.bucket &= (1u64 << self.bucket_bits) - 1;
        Ok(value as u32)
    }

    pub fn read_bit(&mut self) -> Result<bool, StreamError> {
        Ok(self.read_bits(1)? == 1)
    }

    pub fn read_u8(&mut self) -> Result<u8, StreamError> {
        Ok(self.read_bits(8)? as u8)
    }

    pub fn read_u16(&mut self) -> Result<u16, StreamError> {
        Ok(self.read_bits(16)? as u16)
    }

    pub fn skip_bits(&mut self, mut count: usize) -> Result<(), StreamError> {
        let available = self.bits_remaining();
        if count > available {
            return Err(StreamError::InsufficientData {
                requested: count,
                available,
            });
        }
        while count > 0 {
            let step = count.min(32);
            self.read_bits(step as u32)?;
            count -= step;
        }
        Ok(())
    }

    /// Discard bits up to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        let partial = self.bucket_bits % 8;
        self.bucket_bits -= partial;
        self.bucket &= (1u64 << self.bucket_bits) - 1;
    }

    pub fn bits_remaining(&self) -> usize {
        (self.data.len() - self.byte_pos) * 8 + self.bucket_bits as usize
    }

    /// Number of bits consumed since the start of the slice.
    pub fn bit_position(&self) -> usize {
        self.byte_pos * 8 - self.bucket_bits as usize
    }

    /// Index of the byte holding the next unread bit.
    pub fn byte_position(&self) -> usize {
        self.bit_position() / 8
    }

    pub fn reset(&mut self) {
        self.byte_pos = 0;
        self.bucket = 0;
        self.bucket_bits = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_msb_first_across_byte_boundaries() {
        let data = [0b1010_1100, 0b0101_0011, 0xFF];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_bits(3).unwrap(), 0b101);
        assert_eq!(reader.read_bits(7).unwrap(), 0b0_1100_01);
        assert_eq!(reader.read_bits(6).unwrap(), 0b01_0011);
        assert_eq!(reader.bit_position(), 16);
        assert_eq!(reader.read_u8().unwrap(), 0xFF);
        assert_eq!(reader.bits_remaining(), 0);
    }

    #[test]
    fn reads_full_32_bits_after_odd_offset() {
        let data = [0x12, 0x34, 0x56, 0x78, 0x9A];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_bits(4).unwrap(), 0x1);
        assert_eq!(reader.read_bits(32).unwrap(), 0x2345_6789);
        assert_eq!(reader.read_bits(4).unwrap(), 0xA);
    }

    #[test]
    fn single_bits_match_byte_value() {
        let data = [0b1001_0110];
        let mut reader = BitReader::new(&data);
        let bits: Vec<bool> = (0..8).map(|_| reader.read_bit().unwrap()).collect();
        assert_eq!(bits, vec![true, false, false, true, false, true, true, false]);
    }

    #[test]
    fn overrun_is_reported() {
        let data = [0xAB];
        let mut reader = BitReader::new(&data);
        reader.read_bits(5).unwrap();

        assert_eq!(
            reader.read_bits(4),
            Err(StreamError::InsufficientData {
                requested: 4,
                available: 3
            })
        );
        // Failed read leaves the cursor untouched.
        assert_eq!(reader.read_bits(3).unwrap(), 0b011);
    }

    #[test]
    fn invalid_widths_are_rejected() {
        let data = [0u8; 8];
        let mut reader = BitReader::new(&data);
        assert!(matches!(reader.read_bits(0), Err(StreamError::InvalidState(_))));
        assert!(matches!(reader.read_bits(33), Err(StreamError::InvalidState(_))));
    }

    #[test]
    fn skip_align_and_reset() {
        let data = [0xF0, 0x0F, 0xAA];
        let mut reader = BitReader::new(&data);

        reader.skip_bits(3).unwrap();
        reader.align_to_byte();
        assert_eq!(reader.byte_position(), 1);
        assert_eq!(reader.read_u8().unwrap(), 0x0F);

        reader.reset();
        assert_eq!(reader.read_u16().unwrap(), 0xF00F);
        assert!(reader.skip_bits(9).is_err());
    }
}
