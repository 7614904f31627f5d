use super::frame::{Component, Frame};
use super::idct::dequantize_idct;
use crate::utils::error::{JpegError, JpegResult};
use serde::Serialize;

/// How the decoded components map to output pixels, fixed once the headers are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColorModel {
    Grayscale,
    /// Two channels in an application defined space, only available as raw samples.
    RawDual,
    YCbCr,
    Rgb,
    Cmyk,
    Ycck,
}

impl ColorModel {
    /// Picks the model from the component count, the Adobe transform code (if the stream
    /// has an APP14 Adobe segment) and the caller's hint.
    ///
    /// A set Adobe transform code always means YCbCr/YCCK. Otherwise the hint decides,
    /// falling back to YCbCr for three components and CMYK for four.
    pub fn resolve(components: usize, adobe_transform: Option<bool>, hint: Option<bool>) -> JpegResult<ColorModel> {
        let transform = |default: bool| match adobe_transform {
            Some(true) => true,
            _ => hint.unwrap_or(default),
        };

        match components {
            1 => Ok(ColorModel::Grayscale),
            2 => Ok(ColorModel::RawDual),
            3 => Ok(if transform(true) { ColorModel::YCbCr } else { ColorModel::Rgb }),
            4 => {
                if adobe_transform.is_none() {
                    return Err(JpegError::UnsupportedColorMode(4));
                }
                Ok(if transform(false) { ColorModel::Ycck } else { ColorModel::Cmyk })
            }
            n => Err(JpegError::UnsupportedColorMode(n)),
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            ColorModel::Grayscale => 1,
            ColorModel::RawDual => 2,
            ColorModel::YCbCr | ColorModel::Rgb => 3,
            ColorModel::Cmyk | ColorModel::Ycck => 4,
        }
    }
}

/// Spatial samples of one component, covering all of its real blocks.
#[derive(Debug, Clone)]
pub struct Plane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
    h: u64,
    v: u64,
}

impl Plane {
    /// Dequantizes and inverse transforms every block inside the unrounded block grid.
    pub fn build(component: &Component, table: &[u16]) -> Plane {
        let width = component.blocks_per_line * 8;
        let height = component.blocks_per_column * 8;
        let mut data = vec![0u8; width * height];
        let mut samples = [0u8; 64];

        for row in 0..component.blocks_per_column {
            for col in 0..component.blocks_per_line {
                dequantize_idct(component.block(row, col), table, &mut samples);

                for (y, line) in samples.chunks_exact(8).enumerate() {
                    let start = (row * 8 + y) * width + col * 8;
                    data[start..start + 8].copy_from_slice(line);
                }
            }
        }

        Plane {
            width,
            height,
            data,
            h: component.h as u64,
            v: component.v as u64,
        }
    }
}

/// Nearest-neighbour lookup from output coordinates into one plane.
struct Sampler<'p> {
    plane: &'p Plane,
    columns: Vec<usize>,
}

impl<'p> Sampler<'p> {
    fn new(plane: &'p Plane, frame: &Frame, target_width: u32) -> Sampler<'p> {
        let numerator = plane.h * frame.width as u64;
        let denominator = frame.max_h as u64 * target_width as u64;

        let columns = (0..target_width as u64)
            .map(|x| ((x * numerator / denominator) as usize).min(plane.width - 1))
            .collect();

        Sampler { plane, columns }
    }

    fn line(&self, frame: &Frame, y: u32, target_height: u32) -> &'p [u8] {
        let numerator = self.plane.v * frame.height as u64;
        let denominator = frame.max_v as u64 * target_height as u64;
        let row = ((y as u64 * numerator / denominator) as usize).min(self.plane.height - 1);

        &self.plane.data[row * self.plane.width..(row + 1) * self.plane.width]
    }
}

fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let (y, cb, cr) = (y as f32, cb as f32 - 128.0, cr as f32 - 128.0);

    [
        clamp_u8((y + 1.402 * cr) as i32),
        clamp_u8((y - 0.344_136_3 * cb - 0.714_136_36 * cr) as i32),
        clamp_u8((y + 1.772 * cb) as i32),
    ]
}

/// Builds the interleaved samples of every component at `target_width` x `target_height`,
/// applying the color transform of `model`.
///
/// YCbCr becomes RGB. Four-component output holds the complement of each CMYK channel,
/// which is how Adobe applications store them, with YCCK first converted to CMYK.
pub fn resample(
    frame: &Frame,
    planes: &[Plane],
    model: ColorModel,
    target_width: u32,
    target_height: u32,
) -> JpegResult<Vec<u8>> {
    if target_width == 0 || target_height == 0 {
        return Err(JpegError::InvalidDimensions {
            width: target_width,
            height: target_height,
        });
    }

    if planes.len() != model.channels() {
        return Err(JpegError::UnsupportedColorMode(planes.len()));
    }

    let samplers: Vec<Sampler> = planes.iter().map(|p| Sampler::new(p, frame, target_width)).collect();
    let channels = model.channels();
    let mut data = Vec::with_capacity(target_width as usize * target_height as usize * channels);

    for y in 0..target_height {
        let lines: Vec<&[u8]> = samplers.iter().map(|s| s.line(frame, y, target_height)).collect();

        for x in 0..target_width as usize {
            let mut sample = [0u8; 4];
            for (i, (sampler, line)) in samplers.iter().zip(&lines).enumerate() {
                sample[i] = line[sampler.columns[x]];
            }

            match model {
                ColorModel::Grayscale => data.push(sample[0]),
                ColorModel::RawDual => data.extend_from_slice(&sample[..2]),
                ColorModel::Rgb => data.extend_from_slice(&sample[..3]),
                ColorModel::YCbCr => data.extend_from_slice(&ycbcr_to_rgb(sample[0], sample[1], sample[2])),
                ColorModel::Cmyk => {
                    data.extend_from_slice(&[255 - sample[0], 255 - sample[1], 255 - sample[2], 255 - sample[3]])
                }
                ColorModel::Ycck => {
                    // Converted CMY is 255 - rgb, so its complement is rgb itself.
                    let rgb = ycbcr_to_rgb(sample[0], sample[1], sample[2]);
                    data.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255 - sample[3]]);
                }
            }
        }
    }

    Ok(data)
}

/// Packs resampled samples into RGBA8888 with opaque alpha.
pub fn pack_rgba(model: ColorModel, samples: &[u8]) -> JpegResult<Vec<u8>> {
    let mut rgba = Vec::with_capacity(samples.len() / model.channels() * 4);

    match model {
        ColorModel::Grayscale => {
            for &g in samples {
                rgba.extend_from_slice(&[g, g, g, 255]);
            }
        }
        ColorModel::RawDual => return Err(JpegError::UnsupportedColorMode(2)),
        ColorModel::YCbCr | ColorModel::Rgb => {
            for p in samples.chunks_exact(3) {
                rgba.extend_from_slice(&[p[0], p[1], p[2], 255]);
            }
        }
        ColorModel::Cmyk | ColorModel::Ycck => {
            for p in samples.chunks_exact(4) {
                let k = p[3] as i32;
                // k / 255 is integer division: only full black zeroes the ink term.
                let ink = |c: u8| 255 - clamp_u8(c as i32 * (1 - k / 255) + k);
                rgba.extend_from_slice(&[ink(p[0]), ink(p[1]), ink(p[2]), 255]);
            }
        }
    }

    Ok(rgba)
}
