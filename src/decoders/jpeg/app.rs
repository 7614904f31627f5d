use crate::utils::error::JpegResult;
use crate::utils::traits::SafeAccess;
use log::warn;
use serde::Serialize;

/// APP0 "JFIF\0" segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JfifHeader {
    pub version_major: u8,
    pub version_minor: u8,
    pub density_units: u8,
    pub x_density: u16,
    pub y_density: u16,
    pub thumbnail_width: u8,
    pub thumbnail_height: u8,
    /// RGB888, `thumbnail_width * thumbnail_height` pixels.
    #[serde(skip)]
    pub thumbnail_data: Vec<u8>,
}

impl JfifHeader {
    /// Returns `Ok(None)` if the payload is not a JFIF segment.
    pub fn parse(payload: &[u8]) -> JpegResult<Option<JfifHeader>> {
        if !payload.starts_with(b"JFIF\0") {
            return Ok(None);
        }

        let fields = payload.get_range_safe(5..14)?;
        let thumbnail_width = fields[7];
        let thumbnail_height = fields[8];

        let thumbnail_size = 3 * thumbnail_width as usize * thumbnail_height as usize;
        let thumbnail_data = payload.get_range_safe(14..14 + thumbnail_size)?.to_vec();

        if payload.len() != 14 + thumbnail_size {
            warn!(
                "JFIF segment is {} bytes, expected {}",
                payload.len(),
                14 + thumbnail_size
            );
        }

        Ok(Some(JfifHeader {
            version_major: fields[0],
            version_minor: fields[1],
            density_units: fields[2],
            x_density: u16::from_be_bytes([fields[3], fields[4]]),
            y_density: u16::from_be_bytes([fields[5], fields[6]]),
            thumbnail_width,
            thumbnail_height,
            thumbnail_data,
        }))
    }
}

/// APP14 "Adobe\0" segment. Its transform code tells whether the channels were converted
/// to YCbCr (three components) or YCCK (four) before compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdobeHeader {
    pub version: u8,
    pub flags0: u16,
    pub flags1: u16,
    pub transform_code: bool,
}

impl AdobeHeader {
    /// Returns `Ok(None)` if the payload is not an Adobe segment.
    pub fn parse(payload: &[u8]) -> JpegResult<Option<AdobeHeader>> {
        if !payload.starts_with(b"Adobe\0") {
            return Ok(None);
        }

        let fields = payload.get_range_safe(6..12)?;

        Ok(Some(AdobeHeader {
            version: fields[0],
            flags0: u16::from_be_bytes([fields[1], fields[2]]),
            flags1: u16::from_be_bytes([fields[3], fields[4]]),
            transform_code: fields[5] != 0,
        }))
    }
}
