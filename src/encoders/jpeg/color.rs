use crate::utils::image::Image;

/// Fixed-point RGB to YCbCr conversion (BT.601, full range) through per-byte lookup.
///
/// Eight 256-entry sections: R, G, B contributions to Y, then Cb, then Cr. The Cb blue
/// and Cr red weights are both 0.5 and share the section at 1280.
#[derive(Debug, Clone)]
pub struct YuvConverter {
    table: Box<[i32; 2048]>,
}

impl YuvConverter {
    pub fn new() -> YuvConverter {
        let mut table = Box::new([0i32; 2048]);

        for i in 0..256i32 {
            let i_usize = i as usize;
            table[i_usize] = 19595 * i;
            table[i_usize + 256] = 38470 * i;
            table[i_usize + 512] = 7471 * i + 0x8000;
            table[i_usize + 768] = -11059 * i;
            table[i_usize + 1024] = -21709 * i;
            table[i_usize + 1280] = 32768 * i + 0x807FFF;
            table[i_usize + 1536] = -27439 * i;
            table[i_usize + 1792] = -5329 * i;
        }

        YuvConverter { table }
    }

    /// Level-shifted Y, Cb and Cr of one pixel.
    pub fn convert(&self, r: u8, g: u8, b: u8) -> [i32; 3] {
        let (r, g, b) = (r as usize, g as usize, b as usize);
        let t = &self.table;

        [
            ((t[r] + t[g + 256] + t[b + 512]) >> 16) - 128,
            ((t[r + 768] + t[g + 1024] + t[b + 1280]) >> 16) - 128,
            ((t[r + 1280] + t[g + 1536] + t[b + 1792]) >> 16) - 128,
        ]
    }

    /// Converts the 8x8 pixels `(x0 + col * step, y0 + row * step)` into Y, Cb and Cr blocks.
    ///
    /// Positions past the right or bottom edge repeat the last column or row. A step of 2
    /// takes the top-left pixel of each 2x2 cell.
    pub fn sample_block(&self, image: &Image, x0: u32, y0: u32, step: u32) -> [[f32; 64]; 3] {
        let mut blocks = [[0f32; 64]; 3];
        let pixels = image.pixels();
        let width = image.width() as usize;
        let last_x = image.width() - 1;
        let last_y = image.height() - 1;

        for row in 0..8u32 {
            let y = (y0 + row * step).min(last_y) as usize;

            for col in 0..8u32 {
                let x = (x0 + col * step).min(last_x) as usize;
                let p = (y * width + x) * 4;
                let yuv = self.convert(pixels[p], pixels[p + 1], pixels[p + 2]);

                let k = (row * 8 + col) as usize;
                blocks[0][k] = yuv[0] as f32;
                blocks[1][k] = yuv[1] as f32;
                blocks[2][k] = yuv[2] as f32;
            }
        }

        blocks
    }
}

impl Default for YuvConverter {
    fn default() -> Self {
        Self::new()
    }
}
