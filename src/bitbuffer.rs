//! Bit-level reader over an immutable byte slice.
//!
//! Mirrors the original `BitPackedBuffer`: a byte cursor plus a one-byte
//! staging register holding bits not yet consumed. Supports both bit
//! orderings used on the wire (big-endian for schema-directed streams,
//! little-endian for the attributes sub-stream).

use crate::error::{Error, Result};

/// Streaming bit reader over a borrowed byte slice.
pub struct BitBuffer<'a> {
    data: &'a [u8],
    pos: usize,
    staging: u8,
    count: u8,
    big_endian: bool,
}

impl<'a> BitBuffer<'a> {
    /// Construct a reader over `data` using big-endian bit order.
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_endianness(data, true)
    }

    /// Construct a reader over `data` using little-endian bit order, as
    /// used by the attributes sub-stream.
    pub fn new_little_endian(data: &'a [u8]) -> Self {
        Self::with_endianness(data, false)
    }

    fn with_endianness(data: &'a [u8], big_endian: bool) -> Self {
        Self {
            data,
            pos: 0,
            staging: 0,
            count: 0,
            big_endian,
        }
    }

    fn next_byte(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    /// Read `n` bits (0..=64) and return them as an unsigned integer.
    ///
    /// In big-endian mode, bits are drawn MSB-first within each byte, and
    /// the first-loaded byte supplies the most-significant portion of the
    /// result. In little-endian mode, each fully-consumed chunk of the
    /// staging register is placed at the next unused low-bit position of
    /// the accumulator.
    pub fn read_bits(&mut self, n: u32) -> Result<u64> {
        if n == 0 {
            return Ok(0);
        }

        let mut result: u64 = 0;
        let mut remaining = n;
        let mut read_so_far: u32 = 0;

        loop {
            if self.count == 0 {
                self.staging = self
                    .next_byte()
                    .ok_or(Error::Truncated("bits"))?;
                self.count = 8;
            }

            if remaining > self.count as u32 {
                let chunk = self.staging;
                remaining -= self.count as u32;

                if self.big_endian {
                    result |= (chunk as u64) << remaining;
                } else {
                    result |= (chunk as u64) << read_so_far;
                    read_so_far += self.count as u32;
                }
                self.count = 0;
            } else {
                let mask = if remaining >= 8 {
                    0xFFu8
                } else {
                    (1u16 << remaining).wrapping_sub(1) as u8
                };
                let chunk = self.staging & mask;
                self.staging >>= remaining;
                self.count -= remaining as u8;

                if self.big_endian {
                    result |= chunk as u64;
                } else {
                    result |= (chunk as u64) << read_so_far;
                }
                break;
            }
        }

        Ok(result)
    }

    /// Discard any unread bits left in the staging register without
    /// advancing the byte position beyond what is already staged.
    pub fn byte_align(&mut self) {
        self.count = 0;
    }

    /// Byte-align, then read `n` raw bytes directly from the stream,
    /// bypassing the staging register.
    pub fn read_aligned_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        self.byte_align();
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(Error::Truncated("aligned bytes"))?;
        let bytes = self.data[self.pos..end].to_vec();
        self.pos = end;
        Ok(bytes)
    }

    /// Read `n` bytes, using the fast aligned path when the staging
    /// register is empty and falling back to bit-by-bit composition
    /// otherwise.
    pub fn read_unaligned_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        if self.count == 0 {
            let end = self
                .pos
                .checked_add(n)
                .filter(|&end| end <= self.data.len())
                .ok_or(Error::Truncated("unaligned bytes"))?;
            let bytes = self.data[self.pos..end].to_vec();
            self.pos = end;
            Ok(bytes)
        } else {
            (0..n).map(|_| Ok(self.read_bits(8)? as u8)).collect()
        }
    }

    /// Read `n` bits (arbitrary length, not limited to 64) as a raw,
    /// unaligned bit payload, packed 8 bits per output byte (the final
    /// byte may hold fewer than 8 meaningful low bits). Used for
    /// `bitarray` fields, whose declared length is not bounded the way a
    /// single `read_bits` call is.
    pub fn read_bit_blob(&mut self, mut n: u64) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(((n + 7) / 8) as usize);
        while n > 0 {
            let chunk = n.min(8) as u32;
            bytes.push(self.read_bits(chunk)? as u8);
            n -= chunk as u64;
        }
        Ok(bytes)
    }

    /// Returns true when no further bytes can be drawn from the source.
    ///
    /// This has a side effect: if the staging register is empty, it
    /// attempts to load the next byte into it. A successful load means the
    /// buffer is not done (and the loaded byte is now staged for the next
    /// `read_bits`); a failed load means the source is exhausted. The
    /// event-stream driver relies on this behavior exactly as written —
    /// see the original's `BitPackedBuffer.done`, whose docstring calls it
    /// "broken" but whose behavior this crate preserves.
    pub fn done(&mut self) -> bool {
        if self.count == 0 {
            match self.next_byte() {
                Some(byte) => {
                    self.staging = byte;
                    self.count = 8;
                    false
                }
                None => true,
            }
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_endian_byte_reads() {
        let data = [0xF0, 0x0F, 0xFF, 0x00];
        let mut buf = BitBuffer::new(&data);

        assert_eq!(buf.read_bits(8).unwrap(), 0xF0);
        assert_eq!(buf.read_bits(8).unwrap(), 0x0F);
        assert_eq!(buf.read_bits(8).unwrap(), 0xFF);
        assert_eq!(buf.read_bits(8).unwrap(), 0x00);
        assert!(buf.done());
    }

    #[test]
    fn big_endian_reads_crossing_byte_boundary() {
        // A 12-bit read consumes byte0 whole (shifted up to make room for
        // the 4 bits still needed) plus the low nibble of byte1; the
        // leftover high nibble of byte1 comes out on the next read. This
        // is the same chunk-placement rule the whole-byte case in `S1`
        // degenerates from.
        let data = [0xAB, 0xCD];
        let mut buf = BitBuffer::new(&data);

        assert_eq!(buf.read_bits(12).unwrap(), 0xABD);
        assert_eq!(buf.read_bits(4).unwrap(), 0xC);
    }

    #[test]
    fn little_endian_reads() {
        // Little-endian mode never reverses bit order within a byte; it
        // only changes how multi-byte chunks are assembled into the
        // accumulator (low chunk goes into the low bits first).
        let data = [0xB1, 0x0F];
        let mut buf = BitBuffer::new_little_endian(&data);

        assert_eq!(buf.read_bits(4).unwrap(), 0x1);
        assert_eq!(buf.read_bits(4).unwrap(), 0xB);
        assert_eq!(buf.read_bits(8).unwrap(), 0x0F);
    }

    #[test]
    fn little_endian_straddles_byte_boundary() {
        let data = [0xFF, 0x00];
        let mut buf = BitBuffer::new_little_endian(&data);

        // low 8 bits come straight from byte0; 4 more from the low nibble
        // of byte1, placed above them.
        assert_eq!(buf.read_bits(12).unwrap(), 0x0FF);
    }

    #[test]
    fn byte_align_then_aligned_read() {
        let data = [0b1010_0000, 0xAB, 0xCD];
        let mut buf = BitBuffer::new(&data);

        assert_eq!(buf.read_bits(3).unwrap(), 0b101);
        buf.byte_align();
        buf.byte_align(); // idempotent
        assert_eq!(buf.read_aligned_bytes(2).unwrap(), vec![0xAB, 0xCD]);
    }

    #[test]
    fn zero_width_read_consumes_nothing() {
        let data = [0xFF];
        let mut buf = BitBuffer::new(&data);
        assert_eq!(buf.read_bits(0).unwrap(), 0);
        assert_eq!(buf.read_bits(8).unwrap(), 0xFF);
    }

    #[test]
    fn truncated_read_errors() {
        let data: [u8; 0] = [];
        let mut buf = BitBuffer::new(&data);
        assert!(matches!(buf.read_bits(8), Err(Error::Truncated(_))));
    }

    #[test]
    fn done_loads_next_byte_as_side_effect() {
        let data = [0x42];
        let mut buf = BitBuffer::new(&data);
        assert!(!buf.done());
        assert_eq!(buf.read_bits(8).unwrap(), 0x42);
        assert!(buf.done());
    }
}
