/// Bit writer for entropy-coded JPEG data.
///
/// Mirrors [`BitReader`](crate::utils::bitreader::BitReader): bits go out MSB-first and
/// every completed `0xFF` byte is followed by a stuffed `0x00`.
#[derive(Debug, Default)]
pub struct BitWriter {
    output: Vec<u8>,
    buffer: u32,
    bits_in_buffer: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues writing after existing bytes, e.g. headers already emitted.
    pub fn with_output(output: Vec<u8>) -> Self {
        BitWriter {
            output,
            buffer: 0,
            bits_in_buffer: 0,
        }
    }

    /// Appends the low `length` bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u32, length: u8) {
        debug_assert!(length <= 24);

        if length == 0 {
            return;
        }

        let mask = (1u32 << length) - 1;
        self.buffer = (self.buffer << length) | (value & mask);
        self.bits_in_buffer += length;

        while self.bits_in_buffer >= 8 {
            let byte = (self.buffer >> (self.bits_in_buffer - 8)) as u8;
            self.emit_byte(byte);
            self.bits_in_buffer -= 8;
        }

        self.buffer &= (1u32 << self.bits_in_buffer) - 1;
    }

    fn emit_byte(&mut self, byte: u8) {
        self.output.push(byte);
        if byte == 0xFF {
            self.output.push(0x00);
        }
    }

    /// Pads the last partial byte with 1-bits.
    pub fn flush(&mut self) {
        if self.bits_in_buffer > 0 {
            let pad = 8 - self.bits_in_buffer;
            self.write_bits((1u32 << pad) - 1, pad);
        }
    }

    /// Writes a raw byte outside the entropy-coded segment (no stuffing).
    /// The bit buffer must be empty.
    pub fn write_raw_u8(&mut self, byte: u8) {
        debug_assert_eq!(self.bits_in_buffer, 0);
        self.output.push(byte);
    }

    pub fn write_raw_u16(&mut self, value: u16) {
        debug_assert_eq!(self.bits_in_buffer, 0);
        self.output.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_raw_bytes(&mut self, bytes: &[u8]) {
        debug_assert_eq!(self.bits_in_buffer, 0);
        self.output.extend_from_slice(bytes);
    }

    /// Flushes pending bits and returns the written bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.flush();
        self.output
    }
}
