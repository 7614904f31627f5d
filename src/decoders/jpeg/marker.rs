use crate::utils::marker::Marker;

#[derive(Clone, Debug, PartialEq)]
pub enum JpegMarker {
    // Start Of Frame, 0xC0..=0xCF minus DHT (C4), JPG (C8) and DAC (CC).
    // SOF0 baseline, SOF1 extended sequential, SOF2 progressive; the rest are
    // lossless, hierarchical or arithmetic processes.
    SOF(u8),

    DHT, // Define Huffman table(s)
    DAC, // Define arithmetic coding conditioning(s)
    JPG, // Reserved for JPEG extensions

    // Restart interval termination, RST0..=RST7
    RST(u8),

    SOI, // Start of image
    EOI, // End of image
    SOS, // Start of scan
    DQT, // Define quantization table(s)
    DNL, // Define number of lines
    DRI, // Define restart interval
    DHP, // Define hierarchical progression
    EXP, // Expand reference component(s)

    // Application segments, APP0..=APP15
    APP(u8),

    // JPEG extensions, JPG0..=JPG13
    JPGn(u8),

    COM, // Comment
    TEM, // For temporary private use in arithmetic coding

    // Reserved marker
    RES(u8),
}

impl Marker for JpegMarker {
    fn from_u16(value: u16) -> Option<JpegMarker> {
        let code = (value & 0xFF) as u8;

        match value {
            0xFFC4 => Some(JpegMarker::DHT),
            0xFFC8 => Some(JpegMarker::JPG),
            0xFFCC => Some(JpegMarker::DAC),
            0xFFC0..=0xFFCF => Some(JpegMarker::SOF(code - 0xC0)),
            0xFFD0..=0xFFD7 => Some(JpegMarker::RST(code - 0xD0)),
            0xFFD8 => Some(JpegMarker::SOI),
            0xFFD9 => Some(JpegMarker::EOI),
            0xFFDA => Some(JpegMarker::SOS),
            0xFFDB => Some(JpegMarker::DQT),
            0xFFDC => Some(JpegMarker::DNL),
            0xFFDD => Some(JpegMarker::DRI),
            0xFFDE => Some(JpegMarker::DHP),
            0xFFDF => Some(JpegMarker::EXP),
            0xFFE0..=0xFFEF => Some(JpegMarker::APP(code - 0xE0)),
            0xFFF0..=0xFFFD => Some(JpegMarker::JPGn(code - 0xF0)),
            0xFFFE => Some(JpegMarker::COM),
            0xFF01 => Some(JpegMarker::TEM),
            0xFF02..=0xFFBF => Some(JpegMarker::RES(code)),
            _ => None,
        }
    }

    fn to_u16(&self) -> u16 {
        match self {
            JpegMarker::SOF(n) => 0xFFC0 | *n as u16,
            JpegMarker::DHT => 0xFFC4,
            JpegMarker::JPG => 0xFFC8,
            JpegMarker::DAC => 0xFFCC,
            JpegMarker::RST(n) => 0xFFD0 | *n as u16,
            JpegMarker::SOI => 0xFFD8,
            JpegMarker::EOI => 0xFFD9,
            JpegMarker::SOS => 0xFFDA,
            JpegMarker::DQT => 0xFFDB,
            JpegMarker::DNL => 0xFFDC,
            JpegMarker::DRI => 0xFFDD,
            JpegMarker::DHP => 0xFFDE,
            JpegMarker::EXP => 0xFFDF,
            JpegMarker::APP(n) => 0xFFE0 | *n as u16,
            JpegMarker::JPGn(n) => 0xFFF0 | *n as u16,
            JpegMarker::COM => 0xFFFE,
            JpegMarker::TEM => 0xFF01,
            JpegMarker::RES(value) => 0xFF00 | *value as u16,
        }
    }
}
