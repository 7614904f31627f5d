use crate::decoders::jpeg::{AdobeHeader, ColorModel, ComponentSpec, HuffmanTable, JfifHeader, JpegMode, QuantizationTable};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Dimensions reported by [`crate::decode_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct JpegInfo {
    pub width: u32,
    pub height: u32,
    pub precision: u8,
    pub component_count: usize,
    pub mode: JpegMode,
    pub components: Vec<ComponentSpec>,
    pub quantization_tables: Vec<QuantizationTable>,
    pub huffman_tables: Vec<HuffmanTable>,
    pub restart_interval: u16,
    pub scan_count: usize,
    pub jfif: Option<JfifHeader>,
    pub adobe: Option<AdobeHeader>,
    pub comments: Vec<String>,
    /// `None` when the component count has no supported color model.
    pub color_model: Option<ColorModel>,
}

fn print_matrix<T: Display>(f: &mut Formatter<'_>, values: &[T], width: usize, indent: &str) -> std::fmt::Result {
    if values.is_empty() {
        return writeln!(f, "{}[]", indent);
    }

    let str_values: Vec<String> = values.iter().map(|x| x.to_string()).collect();
    let max_width = str_values.iter().map(|s| s.len()).max().unwrap_or(0);

    for chunk in str_values.chunks(width) {
        write!(f, "{}", indent)?;
        for (i, value) in chunk.iter().enumerate() {
            if i == 0 {
                write!(f, "{:>width$}", value, width = max_width)?;
            } else {
                write!(f, " {:>width$}", value, width = max_width)?;
            }
        }

        writeln!(f)?;
    }

    Ok(())
}

impl Display for JpegInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Dimensions: {}x{}", self.width, self.height)?;
        writeln!(f, "Mode: {:?}", self.mode)?;
        writeln!(f, "Precision: {} bits", self.precision)?;
        match self.color_model {
            Some(model) => writeln!(f, "Color model: {:?}", model)?,
            None => writeln!(f, "Color model: unsupported")?,
        }
        writeln!(f, "Restart interval: {}", self.restart_interval)?;
        writeln!(f, "Scans: {}", self.scan_count)?;

        writeln!(f, "Components: {}", self.component_count)?;
        for component in &self.components {
            writeln!(
                f,
                "  ID {}: sampling {}x{}, quantization table {}",
                component.id,
                component.horizontal_sampling_factor,
                component.vertical_sampling_factor,
                component.quantization_table_id
            )?;
        }

        writeln!(f, "====================")?;

        for comment in &self.comments {
            writeln!(f, "Comment: {}", comment)?;
        }

        match &self.jfif {
            Some(jfif) => {
                writeln!(f, "JFIF header:")?;
                writeln!(f, "  Version: {}.{:02}", jfif.version_major, jfif.version_minor)?;
                writeln!(f, "  Density units: {}", jfif.density_units)?;
                writeln!(f, "  X density: {}", jfif.x_density)?;
                writeln!(f, "  Y density: {}", jfif.y_density)?;
                writeln!(f, "  Thumbnail dimensions: {}x{}", jfif.thumbnail_width, jfif.thumbnail_height)?;
                writeln!(f, "  Thumbnail data: {} bytes", jfif.thumbnail_data.len())?;
            }
            None => writeln!(f, "JFIF header: None")?,
        }

        match &self.adobe {
            Some(adobe) => {
                writeln!(f, "Adobe header:")?;
                writeln!(f, "  Version: {}", adobe.version)?;
                writeln!(f, "  Flags: {:#06X} {:#06X}", adobe.flags0, adobe.flags1)?;
                writeln!(f, "  Transform: {}", adobe.transform_code)?;
            }
            None => writeln!(f, "Adobe header: None")?,
        }

        writeln!(f, "====================")?;

        writeln!(f, "Quantization tables:")?;
        for table in &self.quantization_tables {
            writeln!(f, "  ID: {} ({}-bit)", table.id, if table.precision == 0 { 8 } else { 16 })?;
            print_matrix(f, &table.table, 8, "    ")?;
        }

        writeln!(f, "====================")?;

        writeln!(f, "Huffman tables:")?;
        for table in &self.huffman_tables {
            writeln!(f, "  {} ID: {}", if table.class == 0 { "DC" } else { "AC" }, table.id)?;
            writeln!(f, "  Code lengths:")?;
            print_matrix(f, &table.counts, 16, "    ")?;
            writeln!(f, "  Symbols:")?;
            print_matrix(f, &table.symbols, 16, "    ")?;
        }

        Ok(())
    }
}
