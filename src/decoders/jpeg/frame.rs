use crate::utils::error::{JpegError, JpegResult};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JpegMode {
    Baseline,
    ExtendedSequential,
    Progressive,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuantizationTable {
    pub id: u8,
    pub precision: u8,
    /// Natural (row-major) order.
    pub table: Vec<u16>,
}

/// Component as declared in the SOF segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComponentSpec {
    pub id: u8,
    pub horizontal_sampling_factor: u8,
    pub vertical_sampling_factor: u8,
    pub quantization_table_id: u8,
}

/// One color channel of the frame and its coefficient blocks.
///
/// The block grid is `grid_width` x `grid_height` blocks, rounded up to whole MCUs.
/// Only the top-left `blocks_per_line` x `blocks_per_column` blocks carry image data.
#[derive(Debug, Clone)]
pub struct Component {
    pub id: u8,
    pub h: u8,
    pub v: u8,
    pub quantization_table_id: u8,
    pub blocks_per_line: usize,
    pub blocks_per_column: usize,
    pub grid_width: usize,
    pub grid_height: usize,
    pub coefficients: Vec<i32>,
    /// DC predictor of the scan in progress.
    pub pred: i32,
}

impl Component {
    pub fn block_offset(&self, row: usize, col: usize) -> usize {
        (row * self.grid_width + col) * 64
    }

    pub fn block_mut(&mut self, row: usize, col: usize) -> &mut [i32] {
        let offset = self.block_offset(row, col);
        &mut self.coefficients[offset..offset + 64]
    }

    pub fn block(&self, row: usize, col: usize) -> &[i32] {
        let offset = self.block_offset(row, col);
        &self.coefficients[offset..offset + 64]
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub mode: JpegMode,
    pub precision: u8,
    pub width: u32,
    pub height: u32,
    pub components: Vec<Component>,
    pub max_h: u8,
    pub max_v: u8,
    pub mcus_per_line: usize,
    pub mcus_per_column: usize,
}

impl Frame {
    /// Validates the frame header and allocates every component's block grid.
    pub fn new(
        mode: JpegMode,
        precision: u8,
        width: u32,
        height: u32,
        specs: &[ComponentSpec],
    ) -> JpegResult<Frame> {
        if precision != 8 {
            return Err(JpegError::UnsupportedPrecision(precision));
        }

        if width == 0 || height == 0 {
            return Err(JpegError::InvalidDimensions { width, height });
        }

        if specs.is_empty() || specs.len() > 4 {
            return Err(JpegError::UnsupportedColorMode(specs.len()));
        }

        for spec in specs {
            let h = spec.horizontal_sampling_factor;
            let v = spec.vertical_sampling_factor;
            if !(1..=4).contains(&h) || !(1..=4).contains(&v) {
                return Err(JpegError::InvalidSegment(format!(
                    "component {} has sampling factors {}x{}",
                    spec.id, h, v
                )));
            }
        }

        let max_h = specs.iter().map(|s| s.horizontal_sampling_factor).max().unwrap_or(1);
        let max_v = specs.iter().map(|s| s.vertical_sampling_factor).max().unwrap_or(1);

        let width_in_blocks = (width as usize).div_ceil(8);
        let height_in_blocks = (height as usize).div_ceil(8);
        let mcus_per_line = width_in_blocks.div_ceil(max_h as usize);
        let mcus_per_column = height_in_blocks.div_ceil(max_v as usize);

        let components = specs
            .iter()
            .map(|spec| {
                let h = spec.horizontal_sampling_factor as usize;
                let v = spec.vertical_sampling_factor as usize;
                let grid_width = mcus_per_line * h;
                let grid_height = mcus_per_column * v;

                Component {
                    id: spec.id,
                    h: spec.horizontal_sampling_factor,
                    v: spec.vertical_sampling_factor,
                    quantization_table_id: spec.quantization_table_id,
                    blocks_per_line: (width_in_blocks * h).div_ceil(max_h as usize),
                    blocks_per_column: (height_in_blocks * v).div_ceil(max_v as usize),
                    grid_width,
                    grid_height,
                    coefficients: vec![0; grid_width * grid_height * 64],
                    pred: 0,
                }
            })
            .collect();

        Ok(Frame {
            mode,
            precision,
            width,
            height,
            components,
            max_h,
            max_v,
            mcus_per_line,
            mcus_per_column,
        })
    }

    pub fn is_progressive(&self) -> bool {
        self.mode == JpegMode::Progressive
    }

    pub fn component_index(&self, id: u8) -> Option<usize> {
        self.components.iter().position(|c| c.id == id)
    }

    pub fn specs(&self) -> Vec<ComponentSpec> {
        self.components
            .iter()
            .map(|c| ComponentSpec {
                id: c.id,
                horizontal_sampling_factor: c.h,
                vertical_sampling_factor: c.v,
                quantization_table_id: c.quantization_table_id,
            })
            .collect()
    }
}
