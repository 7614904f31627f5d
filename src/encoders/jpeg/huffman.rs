use crate::utils::tables::HuffmanSpec;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Code {
    pub value: u16,
    pub length: u8,
}

/// Symbol to code lookup, the inverse of the decoder's tree.
#[derive(Debug, Clone)]
pub struct CodeTable {
    codes: [Code; 256],
}

impl CodeTable {
    /// Assigns canonical codes: increasing within a length, doubling between lengths.
    pub fn from_spec(spec: &HuffmanSpec) -> CodeTable {
        let mut codes = [Code::default(); 256];
        let mut value = 0u16;
        let mut symbols = spec.values.iter();

        for (i, &count) in spec.counts.iter().enumerate() {
            for _ in 0..count {
                if let Some(&symbol) = symbols.next() {
                    codes[symbol as usize] = Code {
                        value,
                        length: i as u8 + 1,
                    };
                }
                value += 1;
            }
            value <<= 1;
        }

        CodeTable { codes }
    }

    pub fn get(&self, symbol: u8) -> Code {
        self.codes[symbol as usize]
    }
}

/// Number of magnitude bits for `value`, the JPEG "category" (SSSS).
pub fn category(value: i32) -> u8 {
    (32 - value.unsigned_abs().leading_zeros()) as u8
}

/// Magnitude bits of `value` in `category(value)` bits; negatives are stored as one's complement.
pub fn magnitude_bits(value: i32, category: u8) -> u32 {
    if value < 0 {
        (value + (1 << category) - 1) as u32
    } else {
        value as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::tables::{AC_CHROMINANCE, AC_LUMINANCE, DC_LUMINANCE};

    #[test]
    fn test_standard_codes() {
        let dc = CodeTable::from_spec(&DC_LUMINANCE);
        assert_eq!(dc.get(0), Code { value: 0b00, length: 2 });
        assert_eq!(dc.get(5), Code { value: 0b110, length: 3 });
        assert_eq!(dc.get(11), Code { value: 0b1_1111_1110, length: 9 });

        let ac = CodeTable::from_spec(&AC_LUMINANCE);
        assert_eq!(ac.get(0x00), Code { value: 0b1010, length: 4 });
        assert_eq!(ac.get(0xF0), Code { value: 0b111_1111_1001, length: 11 });
        assert_eq!(ac.get(0xFA), Code { value: 0xFFFE, length: 16 });

        let ac = CodeTable::from_spec(&AC_CHROMINANCE);
        assert_eq!(ac.get(0x00), Code { value: 0b00, length: 2 });
        assert_eq!(ac.get(0xF0), Code { value: 0b11_1111_1010, length: 10 });
    }

    #[test]
    fn test_category() {
        assert_eq!(category(0), 0);
        assert_eq!(category(1), 1);
        assert_eq!(category(-1), 1);
        assert_eq!(category(2), 2);
        assert_eq!(category(-3), 2);
        assert_eq!(category(255), 8);
        assert_eq!(category(-1024), 11);
        assert_eq!(category(2047), 11);
    }

    #[test]
    fn test_magnitude_bits() {
        assert_eq!(magnitude_bits(1, 1), 1);
        assert_eq!(magnitude_bits(-1, 1), 0);
        assert_eq!(magnitude_bits(-3, 2), 0);
        assert_eq!(magnitude_bits(-2, 2), 1);
        assert_eq!(magnitude_bits(5, 3), 5);
        assert_eq!(magnitude_bits(-5, 3), 2);
    }
}
