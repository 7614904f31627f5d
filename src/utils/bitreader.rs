use crate::utils::error::{JpegError, JpegResult};

/// Bit reader for entropy-coded JPEG data.
///
/// Bits are read MSB-first, one byte at a time. A `0xFF` byte must be followed by a
/// stuffed `0x00`, which is dropped; anything else there is a marker and reading stops
/// with `JpegError::UnexpectedMarker`.
#[derive(Debug)]
pub struct BitReader<'a> {
    data: &'a [u8],
    position: usize,
    buffer: u8,
    bits_in_buffer: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8], position: usize) -> Self {
        BitReader {
            data,
            position,
            buffer: 0,
            bits_in_buffer: 0,
        }
    }

    /// Byte offset of the next unread byte. Bits still in the buffer are not counted.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Reads a single bit from the bitstream.
    ///
    /// # Returns
    /// - `0` or `1`
    /// - `JpegError::UnexpectedEof` past the end of the data
    /// - `JpegError::UnexpectedMarker` if a marker interrupts the data
    pub fn read_bit(&mut self) -> JpegResult<u32> {
        if self.bits_in_buffer == 0 {
            let byte = *self.data.get(self.position).ok_or(JpegError::UnexpectedEof)?;
            self.position += 1;

            if byte == 0xFF {
                let next = *self.data.get(self.position).ok_or(JpegError::UnexpectedEof)?;
                if next != 0x00 {
                    return Err(JpegError::UnexpectedMarker(0xFF00 | next as u16));
                }
                self.position += 1;
            }

            self.buffer = byte;
            self.bits_in_buffer = 8;
        }

        self.bits_in_buffer -= 1;
        Ok(((self.buffer >> self.bits_in_buffer) & 1) as u32)
    }

    /// Reads `n` bits MSB-first as an unsigned value.
    pub fn receive(&mut self, n: u8) -> JpegResult<i32> {
        let mut value = 0i32;
        for _ in 0..n {
            value = (value << 1) | self.read_bit()? as i32;
        }

        Ok(value)
    }

    /// Reads `n` bits and maps them onto the signed magnitude range of category `n`.
    pub fn receive_and_extend(&mut self, n: u8) -> JpegResult<i32> {
        if n == 0 {
            return Ok(0);
        }

        let value = self.receive(n)?;
        Ok(extend(value, n))
    }

    /// Drops the partially consumed byte, aligning the reader to the next byte boundary.
    pub fn clear_buffer(&mut self) {
        self.buffer = 0;
        self.bits_in_buffer = 0;
    }

    /// Returns the two bytes at the current position as a big-endian value without
    /// consuming them.
    pub fn peek_u16(&self) -> Option<u16> {
        let high = *self.data.get(self.position)?;
        let low = *self.data.get(self.position + 1)?;
        Some(u16::from_be_bytes([high, low]))
    }

    pub fn skip(&mut self, n: usize) {
        self.position = (self.position + n).min(self.data.len());
    }
}

/// Sign-extends a raw `n`-bit magnitude: values with a clear top bit are negative.
pub(crate) fn extend(value: i32, n: u8) -> i32 {
    if value >= 1 << (n - 1) {
        value
    } else {
        value + (-1 << n) + 1
    }
}
