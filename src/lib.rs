mod decoders;
mod encoders;
mod utils;

pub use decoders::jpeg::{
    AdobeHeader, ColorModel, ComponentSpec, DecoderOptions, HuffmanTable, JfifHeader, JpegDecoder, JpegMarker,
    JpegMode, QuantizationTable, DEFAULT_MAX_PIXELS,
};
pub use encoders::jpeg::{
    scale_quantization_table, ChromaSubsampling, EncoderOptions, JpegEncoder, DEFAULT_QUALITY,
};
pub use utils::error::{JpegError, JpegResult};
pub use utils::image::{Image, Samples};
pub use utils::info::{ImageInfo, JpegInfo};
pub use utils::logger::Logger;
pub use utils::marker::Marker;
pub use utils::{bitreader, bitwriter, tables};

/// Reads the headers up to the frame and reports the image size.
///
/// Returns `None` for anything that is not a well-formed JPEG up to its SOF segment.
pub fn decode_info(data: &[u8]) -> Option<ImageInfo> {
    let mut decoder = JpegDecoder::new(data, DecoderOptions::default());
    decoder.read_headers().ok()?;

    Some(ImageInfo {
        width: decoder.width(),
        height: decoder.height(),
    })
}

/// Decodes a baseline or progressive JPEG to RGBA8888.
pub fn decode(data: &[u8]) -> JpegResult<Image> {
    JpegDecoder::new(data, DecoderOptions::default()).decode()
}

/// Encodes an RGBA8888 image as a baseline JFIF stream with 4:2:0 chroma.
///
/// `quality` is clamped to 1..=100. Alpha is ignored.
pub fn encode(image: &Image, quality: u8) -> JpegResult<Vec<u8>> {
    let options = EncoderOptions {
        quality,
        ..Default::default()
    };

    JpegEncoder::new(options).encode(image)
}
