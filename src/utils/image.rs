use crate::utils::error::{JpegError, JpegResult};

/// An 8-bit RGBA image, four bytes per pixel in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Image {
    /// Wraps an RGBA8888 buffer.
    ///
    /// # Errors
    ///
    /// Returns `JpegError::InvalidPixelBuffer` if `pixels` does not hold exactly
    /// `width * height * 4` bytes.
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> JpegResult<Image> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(JpegError::InvalidPixelBuffer {
                expected,
                actual: pixels.len(),
            });
        }

        Ok(Image { width, height, pixels })
    }

    /// Expands an RGB888 buffer to RGBA with opaque alpha.
    pub fn from_rgb8(width: u32, height: u32, pixels: &[u8]) -> JpegResult<Image> {
        let expected = width as usize * height as usize * 3;
        if pixels.len() != expected {
            return Err(JpegError::InvalidPixelBuffer {
                expected,
                actual: pixels.len(),
            });
        }

        let rgba = pixels
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect();

        Ok(Image { width, height, pixels: rgba })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Returns the RGBA value at `(x, y)`, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }

        let index = (y as usize * self.width as usize + x as usize) * 4;
        let p = &self.pixels[index..index + 4];
        Some([p[0], p[1], p[2], p[3]])
    }

    /// Drops the alpha channel.
    pub fn as_rgb8(&self) -> Vec<u8> {
        self.pixels
            .chunks_exact(4)
            .flat_map(|p| [p[0], p[1], p[2]])
            .collect()
    }
}

/// Raw decoded samples, one interleaved byte per component, before RGBA packing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Samples {
    pub width: u32,
    pub height: u32,
    pub components: usize,
    pub data: Vec<u8>,
}
