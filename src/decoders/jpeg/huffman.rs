use crate::utils::bitreader::BitReader;
use crate::utils::error::{JpegError, JpegResult};
use serde::Serialize;

const LEAF: u16 = 0x8000;
const EMPTY: u16 = 0;

/// Canonical Huffman decoding tree, stored as a flat array of nodes.
///
/// Each node has two child slots (bit 0, bit 1). A slot is either empty, the index of
/// another node, or a leaf tagged with [`LEAF`] holding the decoded symbol. The root is
/// node 0, so no slot ever points back at it and 0 can mean "empty".
#[derive(Debug, Clone, Default)]
pub struct HuffmanTree {
    nodes: Vec<[u16; 2]>,
}

impl HuffmanTree {
    /// Builds the tree from the 16 code-length counts and the symbols in DHT order.
    pub fn build(counts: &[u8; 16], symbols: &[u8]) -> JpegResult<HuffmanTree> {
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        if total != symbols.len() {
            return Err(JpegError::InvalidHuffmanTable(format!(
                "{} code lengths for {} symbols",
                total,
                symbols.len()
            )));
        }

        let mut tree = HuffmanTree {
            nodes: vec![[EMPTY; 2]],
        };

        let mut code = 0u32;
        let mut symbol_index = 0;

        for (i, &count) in counts.iter().enumerate() {
            let length = i as u8 + 1;

            for _ in 0..count {
                if code >= 1 << length {
                    return Err(JpegError::InvalidHuffmanTable(format!(
                        "code space of length {} over-subscribed",
                        length
                    )));
                }

                tree.insert(code, length, symbols[symbol_index])?;
                symbol_index += 1;
                code += 1;
            }

            code <<= 1;
        }

        Ok(tree)
    }

    fn insert(&mut self, code: u32, length: u8, symbol: u8) -> JpegResult<()> {
        let mut node = 0usize;

        for depth in (0..length).rev() {
            let bit = ((code >> depth) & 1) as usize;
            let child = self.nodes[node][bit];

            if depth == 0 {
                if child != EMPTY {
                    return Err(JpegError::InvalidHuffmanTable("overlapping codes".to_string()));
                }
                self.nodes[node][bit] = LEAF | symbol as u16;
                return Ok(());
            }

            if child & LEAF != 0 {
                return Err(JpegError::InvalidHuffmanTable("code is a prefix of another".to_string()));
            }

            node = if child == EMPTY {
                self.nodes.push([EMPTY; 2]);
                let index = self.nodes.len() - 1;
                self.nodes[node][bit] = index as u16;
                index
            } else {
                child as usize
            };
        }

        Ok(())
    }

    /// Walks the tree one bit at a time until a leaf is reached.
    pub fn decode(&self, reader: &mut BitReader) -> JpegResult<u8> {
        let mut node = 0usize;

        loop {
            let bit = reader.read_bit()? as usize;
            let child = self.nodes.get(node).ok_or(JpegError::InvalidHuffmanSequence)?[bit];

            if child == EMPTY {
                return Err(JpegError::InvalidHuffmanSequence);
            }

            if child & LEAF != 0 {
                return Ok((child & 0xFF) as u8);
            }

            node = child as usize;
        }
    }
}

/// A table as defined by a DHT segment.
#[derive(Debug, Clone, Serialize)]
pub struct HuffmanTable {
    pub class: u8,
    pub id: u8,
    pub counts: [u8; 16],
    pub symbols: Vec<u8>,
    #[serde(skip)]
    pub tree: HuffmanTree,
}

impl HuffmanTable {
    pub fn new(class: u8, id: u8, counts: [u8; 16], symbols: Vec<u8>) -> JpegResult<HuffmanTable> {
        let tree = HuffmanTree::build(&counts, &symbols)?;

        Ok(HuffmanTable {
            class,
            id,
            counts,
            symbols,
            tree,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::bitwriter::BitWriter;
    use crate::utils::tables::{AC_LUMINANCE, DC_LUMINANCE};

    fn bits(pattern: &str) -> Vec<u8> {
        let mut writer = BitWriter::new();
        for c in pattern.chars() {
            writer.write_bits(if c == '1' { 1 } else { 0 }, 1);
        }
        writer.finish()
    }

    #[test]
    fn test_canonical_dc_luminance_codes() {
        let tree = HuffmanTree::build(&DC_LUMINANCE.counts, DC_LUMINANCE.values).unwrap();

        // Table K.3
        let expected = [
            (0u8, "00"),
            (1, "010"),
            (2, "011"),
            (3, "100"),
            (4, "101"),
            (5, "110"),
            (6, "1110"),
            (7, "11110"),
            (8, "111110"),
            (9, "1111110"),
            (10, "11111110"),
            (11, "111111110"),
        ];

        for (symbol, pattern) in expected {
            let data = bits(pattern);
            let mut reader = BitReader::new(&data, 0);
            assert_eq!(tree.decode(&mut reader).unwrap(), symbol, "pattern {}", pattern);
        }
    }

    #[test]
    fn test_canonical_ac_luminance_codes() {
        let tree = HuffmanTree::build(&AC_LUMINANCE.counts, AC_LUMINANCE.values).unwrap();

        // Table K.5: EOB, 0/1, ZRL and the longest code for 15/10.
        let expected = [
            (0x00u8, "1010"),
            (0x01, "00"),
            (0x02, "01"),
            (0x11, "1100"),
            (0xF0, "11111111001"),
            (0xFA, "1111111111111110"),
        ];

        for (symbol, pattern) in expected {
            let data = bits(pattern);
            let mut reader = BitReader::new(&data, 0);
            assert_eq!(tree.decode(&mut reader).unwrap(), symbol, "pattern {}", pattern);
        }
    }

    /// Counts that never fill the code space, so at least one code of each length stays free.
    fn generated_counts(seed: u32) -> [u8; 16] {
        let mut state = seed;
        let mut counts = [0u8; 16];
        let mut available = 2u32;

        for count in counts.iter_mut() {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let limit = (available - 1).min(8);
            // every third length is left empty
            let n = if (state >> 16) % 3 == 0 { 0 } else { (state >> 8) % (limit + 1) };
            *count = n as u8;
            available = (available - n) * 2;
        }

        counts
    }

    /// Expected (code, length) per symbol, assigned in DHT order.
    fn reference_codes(counts: &[u8; 16]) -> Vec<(u32, u8)> {
        let mut codes = Vec::new();
        let mut code = 0u32;

        for (i, &count) in counts.iter().enumerate() {
            for _ in 0..count {
                codes.push((code, i as u8 + 1));
                code += 1;
            }
            code <<= 1;
        }

        codes
    }

    #[test]
    fn test_generated_tables_are_canonical() {
        let mut sets: Vec<[u8; 16]> = (1..=12).map(generated_counts).collect();

        let mut extremes = [0u8; 16];
        extremes[0] = 1;
        extremes[15] = 1;
        sets.push(extremes);

        for counts in sets {
            let codes = reference_codes(&counts);
            let symbols: Vec<u8> = (0..codes.len()).map(|i| (i * 37 + 5) as u8).collect();
            let tree = HuffmanTree::build(&counts, &symbols).unwrap();

            for (&(code, length), &symbol) in codes.iter().zip(&symbols) {
                let mut writer = BitWriter::new();
                writer.write_bits(code, length);
                let data = writer.finish();

                let mut reader = BitReader::new(&data, 0);
                assert_eq!(
                    tree.decode(&mut reader).unwrap(),
                    symbol,
                    "code {:0width$b} in {:?}",
                    code,
                    counts,
                    width = length as usize
                );
            }
        }
    }

    #[test]
    fn test_unassigned_code_is_rejected() {
        let tree = HuffmanTree::build(&DC_LUMINANCE.counts, DC_LUMINANCE.values).unwrap();

        // 111111111 is past the last 9-bit code
        let data = bits("1111111110000000");
        let mut reader = BitReader::new(&data, 0);
        assert!(matches!(tree.decode(&mut reader), Err(JpegError::InvalidHuffmanSequence)));
    }

    #[test]
    fn test_over_subscribed_counts() {
        let mut counts = [0u8; 16];
        counts[0] = 3;

        assert!(matches!(
            HuffmanTree::build(&counts, &[1, 2, 3]),
            Err(JpegError::InvalidHuffmanTable(_))
        ));
        assert!(matches!(
            HuffmanTree::build(&counts, &[1, 2]),
            Err(JpegError::InvalidHuffmanTable(_))
        ));
    }
}
