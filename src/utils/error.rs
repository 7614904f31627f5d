use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JpegError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Unexpected end of data")]
    UnexpectedEof,

    #[error("SOI not found")]
    MissingSoi,

    #[error("Unknown JPEG marker: {0:#06X}")]
    UnknownMarker(u16),

    #[error("Unsupported JPEG process (marker {0:#06X})")]
    UnsupportedProcess(u16),

    #[error("Only single frame JPEGs supported")]
    MultipleFrames,

    #[error("No frame found before scan data")]
    MissingFrame,

    #[error("Invalid segment: {0}")]
    InvalidSegment(String),

    #[error("DQT: invalid table spec {0:#04X}")]
    InvalidQuantizationTable(u8),

    #[error("Invalid Huffman table: {0}")]
    InvalidHuffmanTable(String),

    #[error("Missing {kind} table {id}")]
    MissingTable { kind: &'static str, id: u8 },

    #[error("Scan references unknown component {0}")]
    UnknownComponent(u8),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Unsupported sample precision: {0}")]
    UnsupportedPrecision(u8),

    #[error("Unexpected marker in entropy-coded data: {0:#06X}")]
    UnexpectedMarker(u16),

    #[error("Invalid huffman sequence")]
    InvalidHuffmanSequence,

    #[error("Invalid ACn encoding (size {0})")]
    InvalidAcRefinement(u8),

    #[error("Marker was not found, got {0:#06X}")]
    MarkerNotFound(u16),

    #[error("Unsupported color mode with {0} components")]
    UnsupportedColorMode(usize),

    #[error("Invalid pixel buffer: expected {expected} bytes, got {actual}")]
    InvalidPixelBuffer { expected: usize, actual: usize },
}

pub type JpegResult<T> = Result<T, JpegError>;
