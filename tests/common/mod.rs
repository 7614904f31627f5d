//! Writes JPEG streams straight from quantized coefficients, so that the same blocks can
//! be stored as baseline, baseline with restarts, or progressive scans.

#![allow(dead_code)]

use jpegkit::bitwriter::BitWriter;
use jpegkit::tables::{HuffmanSpec, AC_LUMINANCE, DC_LUMINANCE};

/// Blocks in zig-zag order, every component sampled 1x1.
#[derive(Debug, Clone)]
pub struct CoefficientImage {
    pub width: u16,
    pub height: u16,
    pub components: Vec<Vec<[i32; 64]>>,
}

impl CoefficientImage {
    pub fn blocks_wide(&self) -> usize {
        (self.width as usize).div_ceil(8)
    }

    pub fn blocks_high(&self) -> usize {
        (self.height as usize).div_ceil(8)
    }

    /// Pseudo-random coefficients: busy low frequencies, sparse high ones with long zero runs.
    pub fn random(width: u16, height: u16, components: usize, seed: u32) -> CoefficientImage {
        let mut rng = Lcg(seed);
        let blocks = (width as usize).div_ceil(8) * (height as usize).div_ceil(8);

        let components = (0..components)
            .map(|_| {
                (0..blocks)
                    .map(|_| {
                        let mut block = [0i32; 64];
                        block[0] = rng.range(-300, 300);
                        for (k, value) in block.iter_mut().enumerate().skip(1) {
                            *value = if k < 10 {
                                if rng.range(0, 9) < 6 {
                                    rng.range(-40, 40)
                                } else {
                                    0
                                }
                            } else if rng.range(0, 99) < 8 {
                                rng.range(-6, 6)
                            } else {
                                0
                            };
                        }
                        block
                    })
                    .collect()
            })
            .collect();

        CoefficientImage {
            width,
            height,
            components,
        }
    }

    /// Every block of component `c` holds only the DC value `dcs[c]`.
    pub fn flat(width: u16, height: u16, dcs: &[i32]) -> CoefficientImage {
        let blocks = (width as usize).div_ceil(8) * (height as usize).div_ceil(8);

        CoefficientImage {
            width,
            height,
            components: dcs
                .iter()
                .map(|&dc| {
                    let mut block = [0i32; 64];
                    block[0] = dc;
                    vec![block; blocks]
                })
                .collect(),
        }
    }
}

pub struct Lcg(pub u32);

impl Lcg {
    pub fn next(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        self.0 >> 8
    }

    pub fn range(&mut self, low: i32, high: i32) -> i32 {
        low + (self.next() % (high - low + 1) as u32) as i32
    }
}

/// Canonical (code, length) per symbol.
pub struct Codes([(u16, u8); 256]);

impl Codes {
    pub fn new(spec: &HuffmanSpec) -> Codes {
        let mut table = [(0u16, 0u8); 256];
        let mut code = 0u16;
        let mut k = 0;

        for (i, &count) in spec.counts.iter().enumerate() {
            for _ in 0..count {
                table[spec.values[k] as usize] = (code, i as u8 + 1);
                code += 1;
                k += 1;
            }
            code <<= 1;
        }

        Codes(table)
    }

    fn emit(&self, writer: &mut BitWriter, symbol: u8) {
        let (code, length) = self.0[symbol as usize];
        assert!(length > 0, "symbol {:#04x} has no code", symbol);
        writer.write_bits(code as u32, length);
    }

    /// Emits `run << 4 | category` followed by the magnitude bits of `value`.
    fn emit_value(&self, writer: &mut BitWriter, run: u8, value: i32) {
        let category = (32 - value.unsigned_abs().leading_zeros()) as u8;
        self.emit(writer, (run << 4) | category);

        if category > 0 {
            let mask = (1u32 << category) - 1;
            let bits = if value < 0 { (value - 1) as u32 & mask } else { value as u32 };
            writer.write_bits(bits, category);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    DcFirst { al: u8 },
    DcRefine { al: u8 },
    AcFirst { ss: u8, se: u8, al: u8 },
    AcRefine { ss: u8, se: u8, al: u8 },
}

/// Scan script: DC and AC bands sent at half precision first, then refined.
pub const PROGRESSIVE_SCRIPT: [ScanKind; 5] = [
    ScanKind::DcFirst { al: 1 },
    ScanKind::AcFirst { ss: 1, se: 5, al: 1 },
    ScanKind::AcFirst { ss: 6, se: 63, al: 1 },
    ScanKind::DcRefine { al: 0 },
    ScanKind::AcRefine { ss: 1, se: 63, al: 0 },
];

struct Tables {
    dc: Codes,
    ac: Codes,
}

fn segment(out: &mut Vec<u8>, marker: u16, payload: &[u8]) {
    out.extend_from_slice(&marker.to_be_bytes());
    out.extend_from_slice(&(payload.len() as u16 + 2).to_be_bytes());
    out.extend_from_slice(payload);
}

fn headers(image: &CoefficientImage, sof: u16, restart_interval: u16, adobe: Option<u8>) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];

    if let Some(transform) = adobe {
        segment(&mut out, 0xFFEE, &[b'A', b'd', b'o', b'b', b'e', 0, 100, 0, 0, 0, 0, transform]);
    }

    let mut dqt = vec![0x00];
    dqt.extend_from_slice(&[1; 64]);
    segment(&mut out, 0xFFDB, &dqt);

    let mut frame = vec![8];
    frame.extend_from_slice(&image.height.to_be_bytes());
    frame.extend_from_slice(&image.width.to_be_bytes());
    frame.push(image.components.len() as u8);
    for id in 1..=image.components.len() as u8 {
        frame.extend_from_slice(&[id, 0x11, 0]);
    }
    segment(&mut out, sof, &frame);

    for (class, spec) in [(0x00, &DC_LUMINANCE), (0x10, &AC_LUMINANCE)] {
        let mut dht = vec![class];
        dht.extend_from_slice(&spec.counts);
        dht.extend_from_slice(spec.values);
        segment(&mut out, 0xFFC4, &dht);
    }

    if restart_interval > 0 {
        segment(&mut out, 0xFFDD, &restart_interval.to_be_bytes());
    }

    out
}

fn start_scan(out: Vec<u8>, components: &[usize], ss: u8, se: u8, ah: u8, al: u8) -> BitWriter {
    let mut sos = vec![components.len() as u8];
    for &c in components {
        sos.extend_from_slice(&[c as u8 + 1, 0x00]);
    }
    sos.extend_from_slice(&[ss, se, (ah << 4) | al]);

    let mut out = out;
    segment(&mut out, 0xFFDA, &sos);
    BitWriter::with_output(out)
}

fn finish(writer: BitWriter) -> Vec<u8> {
    let mut out = writer.finish();
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

/// Sequential stream with every component interleaved in one scan.
pub fn baseline(image: &CoefficientImage, restart_interval: u16) -> Vec<u8> {
    baseline_with(image, restart_interval, None)
}

pub fn baseline_with(image: &CoefficientImage, restart_interval: u16, adobe: Option<u8>) -> Vec<u8> {
    let tables = Tables {
        dc: Codes::new(&DC_LUMINANCE),
        ac: Codes::new(&AC_LUMINANCE),
    };

    let all: Vec<usize> = (0..image.components.len()).collect();
    let mut writer = start_scan(headers(image, 0xFFC0, restart_interval, adobe), &all, 0, 63, 0, 0);
    let mut preds = vec![0i32; image.components.len()];
    let blocks = image.blocks_wide() * image.blocks_high();

    for mcu in 0..blocks {
        if restart_interval > 0 && mcu > 0 && mcu % restart_interval as usize == 0 {
            writer.flush();
            let n = (mcu / restart_interval as usize - 1) % 8;
            writer.write_raw_u16(0xFFD0 + n as u16);
            preds.fill(0);
        }

        for (c, component) in image.components.iter().enumerate() {
            write_baseline_block(&mut writer, &tables, &component[mcu], &mut preds[c]);
        }
    }

    finish(writer)
}

/// Progressive stream following `script`. DC scans interleave all components, AC scans
/// hold one component each.
pub fn progressive(image: &CoefficientImage, script: &[ScanKind]) -> Vec<u8> {
    let tables = Tables {
        dc: Codes::new(&DC_LUMINANCE),
        ac: Codes::new(&AC_LUMINANCE),
    };

    let all: Vec<usize> = (0..image.components.len()).collect();
    let blocks = image.blocks_wide() * image.blocks_high();
    let mut out = headers(image, 0xFFC2, 0, None);

    for &kind in script {
        match kind {
            ScanKind::DcFirst { al } | ScanKind::DcRefine { al } => {
                let refine = matches!(kind, ScanKind::DcRefine { .. });
                let ah = if refine { al + 1 } else { 0 };
                let mut writer = start_scan(out, &all, 0, 0, ah, al);
                let mut preds = vec![0i32; image.components.len()];

                for mcu in 0..blocks {
                    for (c, component) in image.components.iter().enumerate() {
                        let value = component[mcu][0] >> al;
                        if refine {
                            writer.write_bits((value & 1) as u32, 1);
                        } else {
                            tables.dc.emit_value(&mut writer, 0, value - preds[c]);
                            preds[c] = value;
                        }
                    }
                }

                writer.flush();
                out = writer.finish();
            }
            ScanKind::AcFirst { ss, se, al } | ScanKind::AcRefine { ss, se, al } => {
                let refine = matches!(kind, ScanKind::AcRefine { .. });
                let ah = if refine { al + 1 } else { 0 };

                for (c, component) in image.components.iter().enumerate() {
                    let mut writer = start_scan(out, &[c], ss, se, ah, al);

                    for block in component {
                        if refine {
                            write_ac_refine(&mut writer, &tables.ac, block, ss as usize, se as usize, al);
                        } else {
                            write_ac_first(&mut writer, &tables.ac, block, ss as usize, se as usize, al);
                        }
                    }

                    out = writer.finish();
                }
            }
        }
    }

    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

fn write_baseline_block(writer: &mut BitWriter, tables: &Tables, block: &[i32; 64], pred: &mut i32) {
    tables.dc.emit_value(writer, 0, block[0] - *pred);
    *pred = block[0];

    let mut run = 0u8;
    for &value in &block[1..] {
        if value == 0 {
            run += 1;
            continue;
        }

        while run > 15 {
            tables.ac.emit(writer, 0xF0);
            run -= 16;
        }

        tables.ac.emit_value(writer, run, value);
        run = 0;
    }

    if run > 0 {
        tables.ac.emit(writer, 0x00);
    }
}

fn write_ac_first(writer: &mut BitWriter, ac: &Codes, block: &[i32; 64], ss: usize, se: usize, al: u8) {
    let mut run = 0u8;

    for &value in &block[ss..=se] {
        let magnitude = value.abs() >> al;
        if magnitude == 0 {
            run += 1;
            continue;
        }

        while run > 15 {
            ac.emit(writer, 0xF0);
            run -= 16;
        }

        ac.emit_value(writer, run, if value < 0 { -magnitude } else { magnitude });
        run = 0;
    }

    if run > 0 {
        ac.emit(writer, 0x00);
    }
}

fn write_ac_refine(writer: &mut BitWriter, ac: &Codes, block: &[i32; 64], ss: usize, se: usize, al: u8) {
    let magnitudes: Vec<i32> = block.iter().map(|v| v.abs() >> al).collect();
    // Last coefficient that becomes nonzero in this scan
    let eob = (ss..=se).rev().find(|&k| magnitudes[k] == 1);

    let mut run = 0u8;
    let mut corrections: Vec<u32> = Vec::new();

    for k in ss..=se {
        let magnitude = magnitudes[k];
        if magnitude == 0 {
            run += 1;
            continue;
        }

        while run > 15 && eob.is_some_and(|e| k <= e) {
            ac.emit(writer, 0xF0);
            run -= 16;
            for bit in corrections.drain(..) {
                writer.write_bits(bit, 1);
            }
        }

        if magnitude > 1 {
            corrections.push((magnitude & 1) as u32);
            continue;
        }

        ac.emit(writer, (run << 4) | 1);
        writer.write_bits(u32::from(block[k] > 0), 1);
        for bit in corrections.drain(..) {
            writer.write_bits(bit, 1);
        }
        run = 0;
    }

    if run > 0 || !corrections.is_empty() {
        ac.emit(writer, 0x00);
        for bit in corrections.drain(..) {
            writer.write_bits(bit, 1);
        }
    }
}
