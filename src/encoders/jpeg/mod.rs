mod color;
pub(crate) mod fdct;
mod huffman;

use crate::utils::bitwriter::BitWriter;
use crate::utils::error::{JpegError, JpegResult};
use crate::utils::image::Image;
use crate::utils::tables::{
    HuffmanSpec, AC_CHROMINANCE, AC_LUMINANCE, CHROMINANCE_QUANTIZATION, DC_CHROMINANCE, DC_LUMINANCE,
    LUMINANCE_QUANTIZATION, NATURAL_TO_ZIGZAG, ZIGZAG_TO_NATURAL,
};
use color::YuvConverter;
use huffman::{category, magnitude_bits, CodeTable};
use log::debug;

pub const DEFAULT_QUALITY: u8 = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChromaSubsampling {
    /// 16x16 MCUs, one chroma sample per 2x2 pixels.
    #[default]
    Yuv420,
    /// 8x8 MCUs, full resolution chroma.
    Yuv444,
}

impl ChromaSubsampling {
    fn luma_factor(&self) -> u8 {
        match self {
            ChromaSubsampling::Yuv420 => 2,
            ChromaSubsampling::Yuv444 => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderOptions {
    /// 1 to 100, out of range values are clamped.
    pub quality: u8,
    pub subsampling: ChromaSubsampling,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        EncoderOptions {
            quality: DEFAULT_QUALITY,
            subsampling: ChromaSubsampling::default(),
        }
    }
}

/// Scales a base quantization table (natural order) for a quality of 1 to 100.
pub fn scale_quantization_table(base: &[u16; 64], quality: u8) -> [u16; 64] {
    let quality = quality.clamp(1, 100) as u32;
    let scale = if quality < 50 { 5000 / quality } else { 200 - quality * 2 };

    let mut table = [0u16; 64];
    for (out, &value) in table.iter_mut().zip(base.iter()) {
        *out = ((value as u32 * scale + 50) / 100).clamp(1, 255) as u16;
    }

    table
}

struct ComponentTables<'a> {
    divisors: &'a [f32; 64],
    dc: &'a CodeTable,
    ac: &'a CodeTable,
}

/// Baseline JPEG encoder using the standard Huffman tables.
#[derive(Debug, Clone)]
pub struct JpegEncoder {
    options: EncoderOptions,
    luma_table: [u16; 64],
    chroma_table: [u16; 64],
    luma_divisors: [f32; 64],
    chroma_divisors: [f32; 64],
    luma_dc: CodeTable,
    luma_ac: CodeTable,
    chroma_dc: CodeTable,
    chroma_ac: CodeTable,
    yuv: YuvConverter,
}

impl JpegEncoder {
    pub fn new(options: EncoderOptions) -> JpegEncoder {
        let options = EncoderOptions {
            quality: options.quality.clamp(1, 100),
            ..options
        };

        let luma_table = scale_quantization_table(&LUMINANCE_QUANTIZATION, options.quality);
        let chroma_table = scale_quantization_table(&CHROMINANCE_QUANTIZATION, options.quality);

        JpegEncoder {
            options,
            luma_divisors: fdct::divisors(&luma_table),
            chroma_divisors: fdct::divisors(&chroma_table),
            luma_table,
            chroma_table,
            luma_dc: CodeTable::from_spec(&DC_LUMINANCE),
            luma_ac: CodeTable::from_spec(&AC_LUMINANCE),
            chroma_dc: CodeTable::from_spec(&DC_CHROMINANCE),
            chroma_ac: CodeTable::from_spec(&AC_CHROMINANCE),
            yuv: YuvConverter::new(),
        }
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    /// Encodes an RGBA image as a baseline JFIF stream. Alpha is ignored.
    pub fn encode(&self, image: &Image) -> JpegResult<Vec<u8>> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 || width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(JpegError::InvalidDimensions { width, height });
        }

        debug!(
            "Encoding {}x{} at quality {} ({:?})",
            width, height, self.options.quality, self.options.subsampling
        );

        let mut writer = BitWriter::with_output(Vec::with_capacity(width as usize * height as usize / 4 + 1024));
        writer.write_raw_u16(0xFFD8);
        self.write_app0(&mut writer);
        self.write_dqt(&mut writer);
        self.write_sof0(&mut writer, width as u16, height as u16);
        self.write_dht(&mut writer);
        self.write_sos(&mut writer);

        let luma = ComponentTables {
            divisors: &self.luma_divisors,
            dc: &self.luma_dc,
            ac: &self.luma_ac,
        };
        let chroma = ComponentTables {
            divisors: &self.chroma_divisors,
            dc: &self.chroma_dc,
            ac: &self.chroma_ac,
        };

        let mut pred = [0i32; 3];

        match self.options.subsampling {
            ChromaSubsampling::Yuv444 => {
                for y in (0..height).step_by(8) {
                    for x in (0..width).step_by(8) {
                        let [y_block, cb_block, cr_block] = self.yuv.sample_block(image, x, y, 1);
                        Self::encode_block(&mut writer, &y_block, &mut pred[0], &luma);
                        Self::encode_block(&mut writer, &cb_block, &mut pred[1], &chroma);
                        Self::encode_block(&mut writer, &cr_block, &mut pred[2], &chroma);
                    }
                }
            }
            ChromaSubsampling::Yuv420 => {
                for y in (0..height).step_by(16) {
                    for x in (0..width).step_by(16) {
                        for (dx, dy) in [(0, 0), (8, 0), (0, 8), (8, 8)] {
                            // The converter clamps, so blocks past the edge repeat the border.
                            let [y_block, _, _] = self.yuv.sample_block(image, x + dx, y + dy, 1);
                            Self::encode_block(&mut writer, &y_block, &mut pred[0], &luma);
                        }

                        let [_, cb_block, cr_block] = self.yuv.sample_block(image, x, y, 2);
                        Self::encode_block(&mut writer, &cb_block, &mut pred[1], &chroma);
                        Self::encode_block(&mut writer, &cr_block, &mut pred[2], &chroma);
                    }
                }
            }
        }

        writer.flush();
        writer.write_raw_u16(0xFFD9);

        let output = writer.finish();
        debug!("Encoded {} bytes", output.len());
        Ok(output)
    }

    /// FDCT, quantization and Huffman coding of one block. `pred` carries the DC value to
    /// the next block of the same component.
    fn encode_block(writer: &mut BitWriter, samples: &[f32; 64], pred: &mut i32, tables: &ComponentTables) {
        let natural = fdct::forward_dct_quantize(samples, tables.divisors);

        let mut zigzag = [0i32; 64];
        for (k, &value) in natural.iter().enumerate() {
            zigzag[NATURAL_TO_ZIGZAG[k]] = value;
        }

        let diff = zigzag[0] - *pred;
        *pred = zigzag[0];

        let size = category(diff);
        let code = tables.dc.get(size);
        writer.write_bits(code.value as u32, code.length);
        writer.write_bits(magnitude_bits(diff, size), size);

        let end = match zigzag.iter().rposition(|&c| c != 0) {
            Some(end) if end > 0 => end,
            _ => {
                let eob = tables.ac.get(0x00);
                writer.write_bits(eob.value as u32, eob.length);
                return;
            }
        };

        let mut run = 0u8;
        for &value in &zigzag[1..=end] {
            if value == 0 {
                run += 1;
                continue;
            }

            while run >= 16 {
                let zrl = tables.ac.get(0xF0);
                writer.write_bits(zrl.value as u32, zrl.length);
                run -= 16;
            }

            let size = category(value);
            let code = tables.ac.get((run << 4) | size);
            writer.write_bits(code.value as u32, code.length);
            writer.write_bits(magnitude_bits(value, size), size);
            run = 0;
        }

        if end != 63 {
            let eob = tables.ac.get(0x00);
            writer.write_bits(eob.value as u32, eob.length);
        }
    }

    fn write_app0(&self, writer: &mut BitWriter) {
        writer.write_raw_u16(0xFFE0);
        writer.write_raw_u16(16);
        writer.write_raw_bytes(b"JFIF\0");
        writer.write_raw_bytes(&[1, 1]); // version 1.1
        writer.write_raw_u8(0); // no units, aspect ratio only
        writer.write_raw_u16(1);
        writer.write_raw_u16(1);
        writer.write_raw_bytes(&[0, 0]); // no thumbnail
    }

    fn write_dqt(&self, writer: &mut BitWriter) {
        writer.write_raw_u16(0xFFDB);
        writer.write_raw_u16(2 + 2 * 65);

        for (id, table) in [(0u8, &self.luma_table), (1, &self.chroma_table)] {
            writer.write_raw_u8(id);
            for &natural in ZIGZAG_TO_NATURAL.iter() {
                writer.write_raw_u8(table[natural] as u8);
            }
        }
    }

    fn write_sof0(&self, writer: &mut BitWriter, width: u16, height: u16) {
        let factor = self.options.subsampling.luma_factor();

        writer.write_raw_u16(0xFFC0);
        writer.write_raw_u16(17);
        writer.write_raw_u8(8);
        writer.write_raw_u16(height);
        writer.write_raw_u16(width);
        writer.write_raw_u8(3);
        // id, sampling factors, quantization table
        writer.write_raw_bytes(&[1, (factor << 4) | factor, 0]);
        writer.write_raw_bytes(&[2, 0x11, 1]);
        writer.write_raw_bytes(&[3, 0x11, 1]);
    }

    fn write_dht(&self, writer: &mut BitWriter) {
        let specs: [(u8, &HuffmanSpec); 4] = [
            (0x00, &DC_LUMINANCE),
            (0x10, &AC_LUMINANCE),
            (0x01, &DC_CHROMINANCE),
            (0x11, &AC_CHROMINANCE),
        ];
        let length = 2 + specs.iter().map(|(_, s)| 17 + s.values.len()).sum::<usize>();

        writer.write_raw_u16(0xFFC4);
        writer.write_raw_u16(length as u16);

        for (class_and_id, spec) in specs {
            writer.write_raw_u8(class_and_id);
            writer.write_raw_bytes(&spec.counts);
            writer.write_raw_bytes(spec.values);
        }
    }

    fn write_sos(&self, writer: &mut BitWriter) {
        writer.write_raw_u16(0xFFDA);
        writer.write_raw_u16(12);
        writer.write_raw_u8(3);
        // id, DC/AC table selectors
        writer.write_raw_bytes(&[1, 0x00]);
        writer.write_raw_bytes(&[2, 0x11]);
        writer.write_raw_bytes(&[3, 0x11]);
        writer.write_raw_bytes(&[0, 63, 0]); // full spectrum, no successive approximation
    }
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self::new(EncoderOptions::default())
    }
}
