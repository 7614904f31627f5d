use crate::decoders::jpeg::frame::{Component, Frame};
use crate::decoders::jpeg::huffman::HuffmanTree;
use crate::utils::bitreader::BitReader;
use crate::utils::error::{JpegError, JpegResult};
use crate::utils::tables::ZIGZAG_TO_NATURAL;

/// How the blocks of one scan are coded. Chosen once per SOS segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Baseline,
    ProgressiveDcFirst,
    ProgressiveDcRefine,
    ProgressiveAcFirst,
    ProgressiveAcRefine,
}

impl ScanMode {
    pub fn select(progressive: bool, spectral_start: u8, successive_prev: u8) -> ScanMode {
        match (progressive, spectral_start == 0, successive_prev == 0) {
            (false, _, _) => ScanMode::Baseline,
            (true, true, true) => ScanMode::ProgressiveDcFirst,
            (true, true, false) => ScanMode::ProgressiveDcRefine,
            (true, false, true) => ScanMode::ProgressiveAcFirst,
            (true, false, false) => ScanMode::ProgressiveAcRefine,
        }
    }

    fn needs_dc_table(&self) -> bool {
        matches!(self, ScanMode::Baseline | ScanMode::ProgressiveDcFirst)
    }

    fn needs_ac_table(&self) -> bool {
        matches!(
            self,
            ScanMode::Baseline | ScanMode::ProgressiveAcFirst | ScanMode::ProgressiveAcRefine
        )
    }
}

/// A frame component taking part in a scan, with the tables bound to it by the SOS header.
#[derive(Debug, Clone)]
pub struct ScanComponent<'t> {
    pub index: usize,
    pub dc_table_id: u8,
    pub ac_table_id: u8,
    pub dc_table: Option<&'t HuffmanTree>,
    pub ac_table: Option<&'t HuffmanTree>,
}

impl<'t> ScanComponent<'t> {
    fn dc(&self) -> JpegResult<&'t HuffmanTree> {
        self.dc_table.ok_or(JpegError::MissingTable {
            kind: "DC Huffman",
            id: self.dc_table_id,
        })
    }

    fn ac(&self) -> JpegResult<&'t HuffmanTree> {
        self.ac_table.ok_or(JpegError::MissingTable {
            kind: "AC Huffman",
            id: self.ac_table_id,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Scan<'t> {
    pub components: Vec<ScanComponent<'t>>,
    pub spectral_start: u8,
    pub spectral_end: u8,
    pub successive_prev: u8,
    pub successive: u8,
    pub reset_interval: usize,
}

/// Position inside the successive-approximation AC refinement of a block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum RefineState {
    /// Next thing in the stream is a run/size symbol.
    #[default]
    Initial,
    /// Skipping a zero run (ZRL), refining nonzero coefficients passed on the way.
    SkipZeros,
    /// Skipping a zero run, then placing the pending value.
    SkipZerosThenSet,
    /// Placing the pending value at the next zero coefficient.
    SetValue,
    /// Inside an EOB run: only nonzero coefficients receive correction bits.
    EobRun,
}

/// Entropy decoder state carried from block to block and reset at every restart interval.
#[derive(Debug, Clone, Default)]
pub struct ScanDecoderState {
    pub eobrun: u32,
    refine: RefineState,
    refine_run: u32,
    next_value: i32,
}

impl ScanDecoderState {
    pub fn reset(&mut self) {
        *self = ScanDecoderState::default();
    }
}

struct ScanDecoder<'a> {
    reader: BitReader<'a>,
    state: ScanDecoderState,
    mode: ScanMode,
    spectral_start: usize,
    spectral_end: usize,
    successive: u8,
}

impl<'a> ScanDecoder<'a> {
    fn decode_block(&mut self, component: &mut Component, row: usize, col: usize, tables: &ScanComponent) -> JpegResult<()> {
        let offset = component.block_offset(row, col);
        let Component { pred, coefficients, .. } = component;
        let block = &mut coefficients[offset..offset + 64];

        match self.mode {
            ScanMode::Baseline => self.decode_baseline(block, pred, tables.dc()?, tables.ac()?),
            ScanMode::ProgressiveDcFirst => self.decode_dc_first(block, pred, tables.dc()?),
            ScanMode::ProgressiveDcRefine => self.decode_dc_refine(block),
            ScanMode::ProgressiveAcFirst => self.decode_ac_first(block, tables.ac()?),
            ScanMode::ProgressiveAcRefine => self.decode_ac_refine(block, tables.ac()?),
        }
    }

    fn decode_dc_diff(&mut self, dc: &HuffmanTree) -> JpegResult<i32> {
        let t = dc.decode(&mut self.reader)?;
        if t > 16 {
            return Err(JpegError::InvalidHuffmanSequence);
        }

        self.reader.receive_and_extend(t)
    }

    fn decode_baseline(&mut self, block: &mut [i32], pred: &mut i32, dc: &HuffmanTree, ac: &HuffmanTree) -> JpegResult<()> {
        *pred = pred.wrapping_add(self.decode_dc_diff(dc)?);
        block[0] = *pred;

        let mut k = 1;
        while k < 64 {
            let rs = ac.decode(&mut self.reader)?;
            let s = rs & 15;
            let r = (rs >> 4) as usize;

            if s == 0 {
                if r < 15 {
                    break;
                }
                k += 16;
                continue;
            }

            k += r;
            if k > 63 {
                return Err(JpegError::InvalidHuffmanSequence);
            }

            block[ZIGZAG_TO_NATURAL[k]] = self.reader.receive_and_extend(s)?;
            k += 1;
        }

        Ok(())
    }

    fn decode_dc_first(&mut self, block: &mut [i32], pred: &mut i32, dc: &HuffmanTree) -> JpegResult<()> {
        *pred = pred.wrapping_add(self.decode_dc_diff(dc)? * (1 << self.successive));
        block[0] = *pred;
        Ok(())
    }

    fn decode_dc_refine(&mut self, block: &mut [i32]) -> JpegResult<()> {
        block[0] |= (self.reader.read_bit()? as i32) << self.successive;
        Ok(())
    }

    fn decode_ac_first(&mut self, block: &mut [i32], ac: &HuffmanTree) -> JpegResult<()> {
        if self.state.eobrun > 0 {
            self.state.eobrun -= 1;
            return Ok(());
        }

        let mut k = self.spectral_start;
        while k <= self.spectral_end {
            let rs = ac.decode(&mut self.reader)?;
            let s = rs & 15;
            let r = rs >> 4;

            if s == 0 {
                if r < 15 {
                    self.state.eobrun = self.reader.receive(r)? as u32 + (1 << r) - 1;
                    break;
                }
                k += 16;
                continue;
            }

            k += r as usize;
            if k > 63 {
                return Err(JpegError::InvalidHuffmanSequence);
            }

            block[ZIGZAG_TO_NATURAL[k]] = self.reader.receive_and_extend(s)? * (1 << self.successive);
            k += 1;
        }

        Ok(())
    }

    fn refine(&mut self, coefficient: &mut i32) -> JpegResult<()> {
        let direction = if *coefficient < 0 { -1 } else { 1 };
        *coefficient += ((self.reader.read_bit()? as i32) << self.successive) * direction;
        Ok(())
    }

    fn decode_ac_refine(&mut self, block: &mut [i32], ac: &HuffmanTree) -> JpegResult<()> {
        let mut k = self.spectral_start;

        while k <= self.spectral_end {
            let z = ZIGZAG_TO_NATURAL[k];

            match self.state.refine {
                RefineState::Initial => {
                    let rs = ac.decode(&mut self.reader)?;
                    let s = rs & 15;
                    let r = rs >> 4;

                    if s == 0 {
                        if r < 15 {
                            self.state.eobrun = self.reader.receive(r)? as u32 + (1 << r);
                            self.state.refine = RefineState::EobRun;
                        } else {
                            self.state.refine_run = 16;
                            self.state.refine = RefineState::SkipZeros;
                        }
                    } else {
                        if s != 1 {
                            return Err(JpegError::InvalidAcRefinement(s));
                        }

                        self.state.next_value = self.reader.receive_and_extend(s)?;
                        self.state.refine_run = r as u32;
                        self.state.refine = if r != 0 {
                            RefineState::SkipZerosThenSet
                        } else {
                            RefineState::SetValue
                        };
                    }

                    // The symbol does not consume a coefficient.
                    continue;
                }
                RefineState::SkipZeros | RefineState::SkipZerosThenSet => {
                    if block[z] != 0 {
                        self.refine(&mut block[z])?;
                    } else {
                        self.state.refine_run = self.state.refine_run.saturating_sub(1);
                        if self.state.refine_run == 0 {
                            self.state.refine = match self.state.refine {
                                RefineState::SkipZerosThenSet => RefineState::SetValue,
                                _ => RefineState::Initial,
                            };
                        }
                    }
                }
                RefineState::SetValue => {
                    if block[z] != 0 {
                        self.refine(&mut block[z])?;
                    } else {
                        block[z] = self.state.next_value * (1 << self.successive);
                        self.state.refine = RefineState::Initial;
                    }
                }
                RefineState::EobRun => {
                    if block[z] != 0 {
                        self.refine(&mut block[z])?;
                    }
                }
            }

            k += 1;
        }

        if self.state.refine == RefineState::EobRun {
            self.state.eobrun = self.state.eobrun.saturating_sub(1);
            if self.state.eobrun == 0 {
                self.state.refine = RefineState::Initial;
            }
        }

        Ok(())
    }
}

/// Decodes the entropy-coded segment of one scan starting at `offset` into the frame's
/// coefficient blocks.
///
/// Returns the offset of the first byte after the scan data, which is normally the next
/// marker.
pub fn decode_scan(frame: &mut Frame, scan: &Scan, data: &[u8], offset: usize) -> JpegResult<usize> {
    let mode = ScanMode::select(frame.is_progressive(), scan.spectral_start, scan.successive_prev);

    if scan.components.is_empty() {
        return Err(JpegError::InvalidSegment("scan without components".to_string()));
    }

    for component in &scan.components {
        if mode.needs_dc_table() {
            component.dc()?;
        }
        if mode.needs_ac_table() {
            component.ac()?;
        }
    }

    let mut decoder = ScanDecoder {
        reader: BitReader::new(data, offset),
        state: ScanDecoderState::default(),
        mode,
        spectral_start: scan.spectral_start as usize,
        spectral_end: scan.spectral_end as usize,
        successive: scan.successive,
    };

    let mcus_per_line = frame.mcus_per_line;
    let single = scan.components.len() == 1;

    let mcu_expected = if single {
        let component = &frame.components[scan.components[0].index];
        component.blocks_per_line * component.blocks_per_column
    } else {
        frame.mcus_per_line * frame.mcus_per_column
    };

    let interval = if scan.reset_interval == 0 {
        mcu_expected
    } else {
        scan.reset_interval
    };

    let mut mcu = 0;
    while mcu < mcu_expected {
        for component in &scan.components {
            frame.components[component.index].pred = 0;
        }
        decoder.state.reset();

        let mut n = 0;
        while n < interval && mcu < mcu_expected {
            if single {
                let tables = &scan.components[0];
                let component = &mut frame.components[tables.index];
                let row = mcu / component.blocks_per_line;
                let col = mcu % component.blocks_per_line;
                decoder.decode_block(component, row, col, tables)?;
            } else {
                let mcu_row = mcu / mcus_per_line;
                let mcu_col = mcu % mcus_per_line;

                for tables in &scan.components {
                    let component = &mut frame.components[tables.index];
                    let (h, v) = (component.h as usize, component.v as usize);

                    for j in 0..v {
                        for k in 0..h {
                            decoder.decode_block(component, mcu_row * v + j, mcu_col * h + k, tables)?;
                        }
                    }
                }
            }

            mcu += 1;
            n += 1;
        }

        decoder.reader.clear_buffer();

        match decoder.reader.peek_u16() {
            None => break,
            Some(marker) if marker < 0xFF00 => return Err(JpegError::MarkerNotFound(marker)),
            Some(0xFFD0..=0xFFD7) => decoder.reader.skip(2),
            Some(_) => break,
        }
    }

    Ok(decoder.reader.position())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::jpeg::frame::{ComponentSpec, JpegMode};
    use crate::utils::bitwriter::BitWriter;
    use crate::utils::tables::{AC_LUMINANCE, DC_LUMINANCE};

    fn gray_frame(mode: JpegMode, width: u32, height: u32) -> Frame {
        let spec = ComponentSpec {
            id: 1,
            horizontal_sampling_factor: 1,
            vertical_sampling_factor: 1,
            quantization_table_id: 0,
        };
        Frame::new(mode, 8, width, height, &[spec]).unwrap()
    }

    fn bits(writer: &mut BitWriter, pattern: &str) {
        for c in pattern.chars().filter(|c| !c.is_whitespace()) {
            writer.write_bits(if c == '1' { 1 } else { 0 }, 1);
        }
    }

    fn trees() -> (HuffmanTree, HuffmanTree) {
        (
            HuffmanTree::build(&DC_LUMINANCE.counts, DC_LUMINANCE.values).unwrap(),
            HuffmanTree::build(&AC_LUMINANCE.counts, AC_LUMINANCE.values).unwrap(),
        )
    }

    fn scan<'t>(dc: &'t HuffmanTree, ac: &'t HuffmanTree, ss: u8, se: u8, ah: u8, al: u8, reset: usize) -> Scan<'t> {
        Scan {
            components: vec![ScanComponent {
                index: 0,
                dc_table_id: 0,
                ac_table_id: 0,
                dc_table: Some(dc),
                ac_table: Some(ac),
            }],
            spectral_start: ss,
            spectral_end: se,
            successive_prev: ah,
            successive: al,
            reset_interval: reset,
        }
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(ScanMode::select(false, 5, 1), ScanMode::Baseline);
        assert_eq!(ScanMode::select(true, 0, 0), ScanMode::ProgressiveDcFirst);
        assert_eq!(ScanMode::select(true, 0, 1), ScanMode::ProgressiveDcRefine);
        assert_eq!(ScanMode::select(true, 1, 0), ScanMode::ProgressiveAcFirst);
        assert_eq!(ScanMode::select(true, 1, 2), ScanMode::ProgressiveAcRefine);
    }

    #[test]
    fn test_baseline_block() -> Result<(), Box<dyn std::error::Error>> {
        let (dc, ac) = trees();
        let mut frame = gray_frame(JpegMode::Baseline, 8, 8);

        // DC diff 5 (category 3), -1 at k=1, one zero, 3 at k=3, EOB
        let mut writer = BitWriter::new();
        bits(&mut writer, "100 101");
        bits(&mut writer, "00 0");
        bits(&mut writer, "11011 11"); // 1/2, value 3
        bits(&mut writer, "1010");
        let mut data = writer.finish();
        data.extend_from_slice(&[0xFF, 0xD9]);

        let end = decode_scan(&mut frame, &scan(&dc, &ac, 0, 63, 0, 0, 0), &data, 0)?;

        assert_eq!(end, data.len() - 2);
        let block = frame.components[0].block(0, 0);
        assert_eq!(block[0], 5);
        assert_eq!(block[ZIGZAG_TO_NATURAL[1]], -1);
        assert_eq!(block[ZIGZAG_TO_NATURAL[2]], 0);
        assert_eq!(block[ZIGZAG_TO_NATURAL[3]], 3);
        Ok(())
    }

    #[test]
    fn test_restart_resets_predictor() -> Result<(), Box<dyn std::error::Error>> {
        let (dc, ac) = trees();
        let mut frame = gray_frame(JpegMode::Baseline, 16, 8);

        let mut data = Vec::new();
        for rst in [Some(0xD0u8), None] {
            let mut writer = BitWriter::new();
            bits(&mut writer, "100 101 1010");
            data.extend(writer.finish());
            if let Some(code) = rst {
                data.extend_from_slice(&[0xFF, code]);
            }
        }
        data.extend_from_slice(&[0xFF, 0xD9]);

        let end = decode_scan(&mut frame, &scan(&dc, &ac, 0, 63, 0, 0, 1), &data, 0)?;

        assert_eq!(end, data.len() - 2);
        // Without the reset the second DC would be 10.
        assert_eq!(frame.components[0].block(0, 0)[0], 5);
        assert_eq!(frame.components[0].block(0, 1)[0], 5);
        Ok(())
    }

    #[test]
    fn test_missing_restart_marker() {
        let (dc, ac) = trees();
        let mut frame = gray_frame(JpegMode::Baseline, 16, 8);

        let mut writer = BitWriter::new();
        bits(&mut writer, "100 101 1010");
        let mut data = writer.finish();
        data.extend_from_slice(&[0x12, 0x34]);

        let result = decode_scan(&mut frame, &scan(&dc, &ac, 0, 63, 0, 0, 1), &data, 0);
        assert!(matches!(result, Err(JpegError::MarkerNotFound(0x1234))));
    }

    #[test]
    fn test_dc_first_and_refine() -> Result<(), Box<dyn std::error::Error>> {
        let (dc, ac) = trees();
        let mut frame = gray_frame(JpegMode::Progressive, 8, 8);

        // DC diff 5 shifted by 1 -> 10
        let mut writer = BitWriter::new();
        bits(&mut writer, "100 101");
        let data = writer.finish();
        decode_scan(&mut frame, &scan(&dc, &ac, 0, 0, 0, 1, 0), &data, 0)?;
        assert_eq!(frame.components[0].block(0, 0)[0], 10);

        let mut writer = BitWriter::new();
        bits(&mut writer, "1");
        let data = writer.finish();
        decode_scan(&mut frame, &scan(&dc, &ac, 0, 0, 1, 0, 0), &data, 0)?;
        assert_eq!(frame.components[0].block(0, 0)[0], 11);
        Ok(())
    }

    #[test]
    fn test_ac_first_eob_run() -> Result<(), Box<dyn std::error::Error>> {
        let (dc, _) = trees();
        // 2-bit codes: 00 -> 0/1, 01 -> EOB, 10 -> EOB1
        let mut counts = [0u8; 16];
        counts[1] = 3;
        let ac = HuffmanTree::build(&counts, &[0x01, 0x00, 0x10])?;
        let mut frame = gray_frame(JpegMode::Progressive, 32, 8);

        let mut writer = BitWriter::new();
        bits(&mut writer, "00 1"); // block 0: +1 at k=1
        bits(&mut writer, "10 1"); // EOB run of 3 blocks: this one and the next two
        bits(&mut writer, "00 0 01"); // block 3: -1 at k=1, EOB
        let data = writer.finish();

        decode_scan(&mut frame, &scan(&dc, &ac, 1, 5, 0, 1, 0), &data, 0)?;

        let blocks = &frame.components[0];
        assert_eq!(blocks.block(0, 0)[ZIGZAG_TO_NATURAL[1]], 2);
        assert!(blocks.block(0, 1).iter().all(|&c| c == 0));
        assert!(blocks.block(0, 2).iter().all(|&c| c == 0));
        assert_eq!(blocks.block(0, 3)[ZIGZAG_TO_NATURAL[1]], -2);
        Ok(())
    }

    #[test]
    fn test_ac_refine_places_and_corrects() -> Result<(), Box<dyn std::error::Error>> {
        let (dc, ac) = trees();
        let mut frame = gray_frame(JpegMode::Progressive, 8, 8);
        frame.components[0].block_mut(0, 0)[ZIGZAG_TO_NATURAL[1]] = 2;

        // 1/1 with value +1, correction bit 1 for the nonzero coefficient at k=1,
        // skip the zero at k=2, place +1 at k=3, then EOB.
        let mut writer = BitWriter::new();
        bits(&mut writer, "1100 1 1 1010");
        let data = writer.finish();

        decode_scan(&mut frame, &scan(&dc, &ac, 1, 5, 1, 0, 0), &data, 0)?;

        let block = frame.components[0].block(0, 0);
        assert_eq!(block[ZIGZAG_TO_NATURAL[1]], 3);
        assert_eq!(block[ZIGZAG_TO_NATURAL[2]], 0);
        assert_eq!(block[ZIGZAG_TO_NATURAL[3]], 1);
        assert_eq!(block[ZIGZAG_TO_NATURAL[4]], 0);
        Ok(())
    }

    #[test]
    fn test_ac_refine_eob_run_spans_blocks() -> Result<(), Box<dyn std::error::Error>> {
        let (dc, _) = trees();
        // 2-bit codes: 00 -> 0/1, 01 -> EOB, 10 -> EOB1
        let mut counts = [0u8; 16];
        counts[1] = 3;
        let ac = HuffmanTree::build(&counts, &[0x01, 0x00, 0x10])?;
        let mut frame = gray_frame(JpegMode::Progressive, 16, 8);
        frame.components[0].block_mut(0, 0)[ZIGZAG_TO_NATURAL[1]] = 2;
        frame.components[0].block_mut(0, 1)[ZIGZAG_TO_NATURAL[1]] = -2;

        // EOB run of 2 covers both blocks; each only carries a correction bit.
        let mut writer = BitWriter::new();
        bits(&mut writer, "10 0 1 1");
        let data = writer.finish();

        decode_scan(&mut frame, &scan(&dc, &ac, 1, 5, 1, 0, 0), &data, 0)?;

        let blocks = &frame.components[0];
        assert_eq!(blocks.block(0, 0)[ZIGZAG_TO_NATURAL[1]], 3);
        assert_eq!(blocks.block(0, 1)[ZIGZAG_TO_NATURAL[1]], -3);
        assert_eq!(blocks.block(0, 0)[ZIGZAG_TO_NATURAL[2]], 0);
        assert_eq!(blocks.block(0, 1)[ZIGZAG_TO_NATURAL[2]], 0);
        Ok(())
    }

    #[test]
    fn test_ac_refine_rejects_large_size() {
        let (dc, ac) = trees();
        let mut frame = gray_frame(JpegMode::Progressive, 8, 8);

        // 0/2 is not a valid refinement symbol
        let mut writer = BitWriter::new();
        bits(&mut writer, "01 10");
        let data = writer.finish();

        let result = decode_scan(&mut frame, &scan(&dc, &ac, 1, 5, 1, 0, 0), &data, 0);
        assert!(matches!(result, Err(JpegError::InvalidAcRefinement(2))));
    }

    #[test]
    fn test_truncated_scan() {
        let (dc, ac) = trees();
        let mut frame = gray_frame(JpegMode::Baseline, 8, 8);

        let result = decode_scan(&mut frame, &scan(&dc, &ac, 0, 63, 0, 0, 0), &[0x80], 0);
        assert!(matches!(result, Err(JpegError::UnexpectedEof)));
    }
}
