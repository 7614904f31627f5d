mod app;
mod color;
mod frame;
mod huffman;
mod idct;
mod marker;
mod scan;

pub use app::{AdobeHeader, JfifHeader};
pub use color::ColorModel;
pub use frame::{ComponentSpec, JpegMode, QuantizationTable};
pub use huffman::HuffmanTable;
pub use marker::JpegMarker;

use crate::utils::error::{JpegError, JpegResult};
use crate::utils::image::{Image, Samples};
use crate::utils::info::JpegInfo;
use crate::utils::marker::Marker;
use crate::utils::tables::ZIGZAG_TO_NATURAL;
use crate::utils::traits::SafeAccess;
use color::Plane;
use frame::Frame;
use log::{debug, warn};
use scan::{Scan, ScanComponent};

/// Default limit on `width * height`.
pub const DEFAULT_MAX_PIXELS: u64 = 1 << 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Whether three or four components are YCbCr/YCCK, when no Adobe segment says so.
    pub color_transform: Option<bool>,
    /// Frames larger than this are rejected before any allocation.
    pub max_pixels: Option<u64>,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        DecoderOptions {
            color_transform: None,
            max_pixels: Some(DEFAULT_MAX_PIXELS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Start,
    Markers,
    Done,
}

/// Baseline and progressive JPEG decoder over an in-memory stream.
pub struct JpegDecoder<'a> {
    data: &'a [u8],
    options: DecoderOptions,
    position: usize,
    state: ParseState,
    frame: Option<Frame>,
    quantization_tables: [Option<QuantizationTable>; 4],
    dc_tables: [Option<HuffmanTable>; 4],
    ac_tables: [Option<HuffmanTable>; 4],
    restart_interval: u16,
    jfif: Option<JfifHeader>,
    adobe: Option<AdobeHeader>,
    comments: Vec<String>,
    scan_count: usize,
}

impl std::fmt::Debug for JpegDecoder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JpegDecoder")
            .field("data", &self.data.len())
            .field("position", &self.position)
            .field("state", &self.state)
            .field("frame", &self.frame.as_ref().map(|frame| (frame.width, frame.height)))
            .field("restart_interval", &self.restart_interval)
            .field("scan_count", &self.scan_count)
            .finish()
    }
}

impl<'a> JpegDecoder<'a> {
    pub fn new(data: &'a [u8], options: DecoderOptions) -> Self {
        JpegDecoder {
            data,
            options,
            position: 0,
            state: ParseState::Start,
            frame: None,
            quantization_tables: Default::default(),
            dc_tables: Default::default(),
            ac_tables: Default::default(),
            restart_interval: 0,
            jfif: None,
            adobe: None,
            comments: Vec::new(),
            scan_count: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.frame.as_ref().map_or(0, |frame| frame.width)
    }

    pub fn height(&self) -> u32 {
        self.frame.as_ref().map_or(0, |frame| frame.height)
    }

    /// Reads markers up to and including the frame header.
    pub fn read_headers(&mut self) -> JpegResult<()> {
        if self.frame.is_none() {
            self.parse(true)?;
        }

        match self.frame {
            Some(_) => Ok(()),
            None => Err(JpegError::MissingFrame),
        }
    }

    /// Decodes the whole stream to RGBA at its own size.
    pub fn decode(&mut self) -> JpegResult<Image> {
        self.read_headers()?;
        let (width, height) = (self.width(), self.height());
        self.decode_scaled(width, height)
    }

    /// Decodes the whole stream to RGBA, resampled to `width` x `height` by nearest neighbour.
    pub fn decode_scaled(&mut self, width: u32, height: u32) -> JpegResult<Image> {
        let (model, samples) = self.assemble(width, height)?;
        let pixels = color::pack_rgba(model, &samples)?;

        Image::from_rgba8(width, height, pixels)
    }

    /// Decodes the whole stream to interleaved component samples, without RGBA packing.
    ///
    /// YCbCr comes out as RGB and four-component images as complemented CMYK. This is the
    /// only output for two-component images.
    pub fn decode_samples(&mut self) -> JpegResult<Samples> {
        self.read_headers()?;
        let (width, height) = (self.width(), self.height());
        let (model, data) = self.assemble(width, height)?;

        Ok(Samples {
            width,
            height,
            components: model.channels(),
            data,
        })
    }

    /// Header summary. Scan count and tables reflect what has been parsed so far.
    pub fn info(&mut self) -> JpegResult<JpegInfo> {
        self.read_headers()?;
        let frame = self.frame.as_ref().ok_or(JpegError::MissingFrame)?;

        Ok(JpegInfo {
            width: frame.width,
            height: frame.height,
            precision: frame.precision,
            component_count: frame.components.len(),
            mode: frame.mode,
            components: frame.specs(),
            quantization_tables: self.quantization_tables.iter().flatten().cloned().collect(),
            huffman_tables: self
                .dc_tables
                .iter()
                .chain(self.ac_tables.iter())
                .flatten()
                .cloned()
                .collect(),
            restart_interval: self.restart_interval,
            scan_count: self.scan_count,
            jfif: self.jfif.clone(),
            adobe: self.adobe,
            comments: self.comments.clone(),
            color_model: self.color_model().ok(),
        })
    }

    fn color_model(&self) -> JpegResult<ColorModel> {
        let frame = self.frame.as_ref().ok_or(JpegError::MissingFrame)?;
        ColorModel::resolve(
            frame.components.len(),
            self.adobe.map(|adobe| adobe.transform_code),
            self.options.color_transform,
        )
    }

    /// Runs all remaining scans, then turns the coefficients into samples.
    fn assemble(&mut self, width: u32, height: u32) -> JpegResult<(ColorModel, Vec<u8>)> {
        if self.state != ParseState::Done {
            self.parse(false)?;
        }

        let model = self.color_model()?;
        let frame = self.frame.as_ref().ok_or(JpegError::MissingFrame)?;

        let mut planes = Vec::with_capacity(frame.components.len());
        for component in &frame.components {
            let id = component.quantization_table_id;
            let table = self
                .quantization_tables
                .get(id as usize)
                .and_then(|t| t.as_ref())
                .ok_or(JpegError::MissingTable {
                    kind: "quantization",
                    id,
                })?;

            planes.push(Plane::build(component, &table.table));
        }

        let samples = color::resample(frame, &planes, model, width, height)?;
        Ok((model, samples))
    }

    fn read_u16(&mut self) -> JpegResult<u16> {
        let bytes = self.data.get_range_safe(self.position..self.position + 2)?;
        self.position += 2;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a length-prefixed segment and returns its payload.
    fn read_segment(&mut self) -> JpegResult<&'a [u8]> {
        let length = self.read_u16()? as usize;
        if length < 2 {
            return Err(JpegError::InvalidSegment(format!("segment length {}", length)));
        }

        let data = self.data;
        let payload = data.get_range_safe(self.position..self.position + length - 2)?;
        self.position += length - 2;
        Ok(payload)
    }

    /// The marker loop. With `until_frame`, returns as soon as a frame header is read.
    fn parse(&mut self, until_frame: bool) -> JpegResult<()> {
        if self.state == ParseState::Start {
            if self.read_u16().ok() != Some(0xFFD8) {
                return Err(JpegError::MissingSoi);
            }
            self.state = ParseState::Markers;
        }

        let mut resynced = false;

        while self.state == ParseState::Markers {
            if self.position + 2 > self.data.len() {
                if self.scan_count == 0 {
                    return Err(JpegError::UnexpectedEof);
                }
                warn!("Reached end of data without EOI");
                self.state = ParseState::Done;
                break;
            }

            let value = self.read_u16()?;

            // Fill bytes before a marker
            if value == 0xFFFF {
                self.position -= 1;
                continue;
            }

            if value == 0xFF00 {
                continue;
            }

            let marker = JpegMarker::from_u16(value);
            if let Some(marker) = &marker {
                debug!("Marker {:?} at offset {}", marker, self.position - 2);
            }

            match marker {
                Some(JpegMarker::APP(n)) => self.read_app(n)?,
                Some(JpegMarker::COM) => {
                    let payload = self.read_segment()?;
                    self.comments.push(String::from_utf8_lossy(payload).into_owned());
                }
                Some(JpegMarker::DQT) => self.read_quantization_tables()?,
                Some(JpegMarker::DHT) => self.read_huffman_tables()?,
                Some(JpegMarker::DRI) => self.read_restart_interval()?,
                Some(JpegMarker::SOF(n @ (0 | 1 | 2))) => {
                    self.read_frame(n)?;
                    if until_frame {
                        return Ok(());
                    }
                }
                Some(JpegMarker::SOF(_)) | Some(JpegMarker::DAC) => {
                    return Err(JpegError::UnsupportedProcess(value));
                }
                Some(JpegMarker::SOS) => self.read_scan()?,
                Some(JpegMarker::EOI) => self.state = ParseState::Done,
                _ => {
                    // A marker whose 0xFF was swallowed by the preceding data shows up one
                    // byte late: back up and read it again.
                    let start = self.position;
                    let truncated = !resynced
                        && start >= 3
                        && self.data[start - 3] == 0xFF
                        && (0xC0..=0xFE).contains(&self.data[start - 2]);

                    if !truncated {
                        return Err(JpegError::UnknownMarker(value));
                    }

                    warn!("Unknown marker {:#06X} at offset {}, backing up", value, start - 2);
                    self.position = start - 3;
                    resynced = true;
                    continue;
                }
            }

            resynced = false;
        }

        Ok(())
    }

    fn read_app(&mut self, n: u8) -> JpegResult<()> {
        let payload = self.read_segment()?;

        match n {
            0 => match JfifHeader::parse(payload)? {
                Some(jfif) => {
                    debug!("JFIF {}.{:02}", jfif.version_major, jfif.version_minor);
                    self.jfif = Some(jfif);
                }
                None => warn!("APP0 segment is not JFIF"),
            },
            14 => {
                if let Some(adobe) = AdobeHeader::parse(payload)? {
                    debug!("Adobe segment, transform code {}", adobe.transform_code);
                    self.adobe = Some(adobe);
                }
            }
            _ => debug!("Skipping APP{} segment of {} bytes", n, payload.len()),
        }

        Ok(())
    }

    fn read_quantization_tables(&mut self) -> JpegResult<()> {
        let payload = self.read_segment()?;
        let mut offset = 0;

        while offset < payload.len() {
            let spec = payload[offset];
            let precision = spec >> 4;
            let id = spec & 0x0F;
            offset += 1;

            if id > 3 {
                return Err(JpegError::InvalidQuantizationTable(spec));
            }

            let mut table = vec![0u16; 64];
            match precision {
                0 => {
                    let values = payload.get_range_safe(offset..offset + 64)?;
                    for (j, &value) in values.iter().enumerate() {
                        table[ZIGZAG_TO_NATURAL[j]] = value as u16;
                    }
                    offset += 64;
                }
                1 => {
                    let values = payload.get_range_safe(offset..offset + 128)?;
                    for (j, pair) in values.chunks_exact(2).enumerate() {
                        table[ZIGZAG_TO_NATURAL[j]] = u16::from_be_bytes([pair[0], pair[1]]);
                    }
                    offset += 128;
                }
                _ => return Err(JpegError::InvalidQuantizationTable(spec)),
            }

            debug!("Quantization table {} ({}-bit)", id, if precision == 0 { 8 } else { 16 });
            self.quantization_tables[id as usize] = Some(QuantizationTable { id, precision, table });
        }

        Ok(())
    }

    fn read_huffman_tables(&mut self) -> JpegResult<()> {
        let payload = self.read_segment()?;
        let mut offset = 0;

        while offset < payload.len() {
            let spec = payload[offset];
            let class = spec >> 4;
            let id = spec & 0x0F;

            if class > 1 || id > 3 {
                return Err(JpegError::InvalidHuffmanTable(format!(
                    "class {} id {}",
                    class, id
                )));
            }

            let mut counts = [0u8; 16];
            counts.copy_from_slice(payload.get_range_safe(offset + 1..offset + 17)?);
            let total: usize = counts.iter().map(|&c| c as usize).sum();
            let symbols = payload.get_range_safe(offset + 17..offset + 17 + total)?.to_vec();
            offset += 17 + total;

            debug!(
                "{} Huffman table {} with {} symbols",
                if class == 0 { "DC" } else { "AC" },
                id,
                total
            );

            let table = HuffmanTable::new(class, id, counts, symbols)?;
            if class == 0 {
                self.dc_tables[id as usize] = Some(table);
            } else {
                self.ac_tables[id as usize] = Some(table);
            }
        }

        Ok(())
    }

    fn read_restart_interval(&mut self) -> JpegResult<()> {
        let payload = self.read_segment()?;
        let bytes = payload.get_range_safe(0..2)?;
        self.restart_interval = u16::from_be_bytes([bytes[0], bytes[1]]);

        debug!("Restart interval {}", self.restart_interval);
        Ok(())
    }

    fn read_frame(&mut self, n: u8) -> JpegResult<()> {
        if self.frame.is_some() {
            return Err(JpegError::MultipleFrames);
        }

        let payload = self.read_segment()?;
        let header = payload.get_range_safe(0..6)?;
        let precision = header[0];
        let height = u16::from_be_bytes([header[1], header[2]]) as u32;
        let width = u16::from_be_bytes([header[3], header[4]]) as u32;
        let count = header[5] as usize;

        let mut specs: Vec<ComponentSpec> = Vec::with_capacity(count);
        for chunk in payload.get_range_safe(6..6 + count * 3)?.chunks_exact(3) {
            if specs.iter().any(|spec| spec.id == chunk[0]) {
                return Err(JpegError::InvalidSegment(format!("duplicate component id {}", chunk[0])));
            }

            specs.push(ComponentSpec {
                id: chunk[0],
                horizontal_sampling_factor: chunk[1] >> 4,
                vertical_sampling_factor: chunk[1] & 0x0F,
                quantization_table_id: chunk[2],
            });
        }

        if let Some(max_pixels) = self.options.max_pixels {
            if width as u64 * height as u64 > max_pixels {
                return Err(JpegError::InvalidDimensions { width, height });
            }
        }

        let mode = match n {
            0 => JpegMode::Baseline,
            1 => JpegMode::ExtendedSequential,
            _ => JpegMode::Progressive,
        };

        let frame = Frame::new(mode, precision, width, height, &specs)?;

        debug!(
            "{:?} frame {}x{}, {} components, {} x {} MCUs",
            mode,
            width,
            height,
            count,
            frame.mcus_per_line,
            frame.mcus_per_column
        );
        for spec in &specs {
            debug!(
                "  component {}: {}x{} sampling, quantization table {}",
                spec.id, spec.horizontal_sampling_factor, spec.vertical_sampling_factor, spec.quantization_table_id
            );
        }

        self.frame = Some(frame);
        Ok(())
    }

    fn read_scan(&mut self) -> JpegResult<()> {
        let payload = self.read_segment()?;
        let frame = self.frame.as_mut().ok_or(JpegError::MissingFrame)?;

        let count = *payload.get_safe(0)? as usize;
        if count == 0 || count > 4 || payload.len() != 1 + count * 2 + 3 {
            return Err(JpegError::InvalidSegment(format!(
                "SOS of {} bytes for {} components",
                payload.len(),
                count
            )));
        }

        let mut components = Vec::with_capacity(count);
        for selector in payload[1..1 + count * 2].chunks_exact(2) {
            let id = selector[0];
            let index = frame.component_index(id).ok_or(JpegError::UnknownComponent(id))?;
            let dc_table_id = selector[1] >> 4;
            let ac_table_id = selector[1] & 0x0F;

            components.push(ScanComponent {
                index,
                dc_table_id,
                ac_table_id,
                dc_table: self
                    .dc_tables
                    .get(dc_table_id as usize)
                    .and_then(|t| t.as_ref())
                    .map(|t| &t.tree),
                ac_table: self
                    .ac_tables
                    .get(ac_table_id as usize)
                    .and_then(|t| t.as_ref())
                    .map(|t| &t.tree),
            });
        }

        let parameters = &payload[1 + count * 2..];
        let spectral_start = parameters[0];
        let spectral_end = parameters[1];
        let successive_prev = parameters[2] >> 4;
        let successive = parameters[2] & 0x0F;

        if successive_prev > 13 || successive > 13 {
            return Err(JpegError::InvalidSegment(format!(
                "successive approximation {}/{}",
                successive_prev, successive
            )));
        }

        if frame.is_progressive() && (spectral_start > spectral_end || spectral_end > 63) {
            return Err(JpegError::InvalidSegment(format!(
                "spectral selection {}..{}",
                spectral_start, spectral_end
            )));
        }

        if !frame.is_progressive()
            && (spectral_start != 0 || spectral_end != 63 || successive_prev != 0 || successive != 0)
        {
            warn!(
                "Sequential scan with spectral {}..{} and successive {}/{}, ignoring",
                spectral_start, spectral_end, successive_prev, successive
            );
        }

        debug!(
            "Scan {}: {} components, spectral {}..{}, successive {}/{}",
            self.scan_count, count, spectral_start, spectral_end, successive_prev, successive
        );

        let scan = Scan {
            components,
            spectral_start,
            spectral_end,
            successive_prev,
            successive,
            reset_interval: self.restart_interval as usize,
        };

        self.position = scan::decode_scan(frame, &scan, self.data, self.position)?;
        self.scan_count += 1;

        Ok(())
    }
}
