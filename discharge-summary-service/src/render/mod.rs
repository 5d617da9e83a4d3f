//! Lays a patient record and its summary out as a paginated A4 PDF.
//!
//! Rendering is split in two: [`layout_document`] positions every text run on its
//! page, then [`write_pdf`] turns that layout into bytes with `printpdf`. Output is
//! byte-identical for identical input: the dates are fixed, no XMP packet is written,
//! and the trailer `/ID` pair that `printpdf` fills with random strings is rewritten
//! to fixed values through `lopdf`.

mod layout;
mod metrics;

use printpdf::lopdf::{self, Object, StringFormat};
use printpdf::{
    BuiltinFont, CustomPdfConformance, IndirectFontRef, Mm, PdfConformance, PdfDocument,
};
use std::io::BufWriter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

use crate::models::PatientRecord;

pub use layout::{DISCLAIMER, layout_document, wrap_line};
pub use metrics::{normalize_text, text_width_mm};

pub const PAGE_WIDTH: f32 = 210.0;
pub const PAGE_HEIGHT: f32 = 297.0;
pub const MARGIN: f32 = 10.0;
pub const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
/// Inner horizontal padding of a text cell.
pub const CELL_PADDING: f32 = 1.0;
/// Lines whose cell would extend below this go to the next page.
pub const BREAK_Y: f32 = PAGE_HEIGHT - 20.0;

const DOCUMENT_TITLE: &str = "Discharge Summary";
const DOCUMENT_ID: &str = "discharge-summary";
const INSTANCE_ID: &str = "discharge-summary-render";
const LAYER_NAME: &str = "Layer 1";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("PDF font error: {0}")]
    Font(String),

    #[error("PDF save error: {0}")]
    Save(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Regular,
    Bold,
}

/// One line of text at a fixed position. Coordinates are millimetres from the
/// top-left corner of the page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub style: FontStyle,
    pub size_pt: f32,
    pub x_mm: f32,
    pub baseline_mm: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub runs: Vec<TextRun>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayout {
    pub pages: Vec<PageLayout>,
}

/// Renders the discharge summary document as PDF bytes.
pub fn render_document(record: &PatientRecord, summary_text: &str) -> Result<Vec<u8>, RenderError> {
    let layout = layout_document(record, summary_text);
    let bytes = write_pdf(&layout)?;
    info!(
        pages = layout.pages.len(),
        bytes = bytes.len(),
        "Rendered discharge summary PDF"
    );
    Ok(bytes)
}

pub fn write_pdf(layout: &DocumentLayout) -> Result<Vec<u8>, RenderError> {
    let (doc, first_page, first_layer) =
        PdfDocument::new(DOCUMENT_TITLE, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER_NAME);
    let doc = doc
        .with_conformance(PdfConformance::Custom(CustomPdfConformance {
            requires_icc_profile: false,
            requires_xmp_metadata: false,
            ..Default::default()
        }))
        .with_document_id(DOCUMENT_ID.to_string())
        .with_creation_date(OffsetDateTime::UNIX_EPOCH)
        .with_mod_date(OffsetDateTime::UNIX_EPOCH)
        .with_metadata_date(OffsetDateTime::UNIX_EPOCH);

    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| RenderError::Font(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| RenderError::Font(e.to_string()))?;

    for (index, page) in layout.pages.iter().enumerate() {
        let (page_index, layer_index) = if index == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER_NAME)
        };
        let layer = doc.get_page(page_index).get_layer(layer_index);

        for run in &page.runs {
            let font: &IndirectFontRef = match run.style {
                FontStyle::Regular => &regular,
                FontStyle::Bold => &bold,
            };
            layer.use_text(
                run.text.as_str(),
                run.size_pt,
                Mm(run.x_mm),
                Mm(PAGE_HEIGHT - run.baseline_mm),
                font,
            );
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| RenderError::Save(e.to_string()))?;
    let bytes = buf
        .into_inner()
        .map_err(|e| RenderError::Save(e.to_string()))?;

    pin_trailer_id(&bytes)
}

/// Replaces the trailer `/ID` pair with fixed strings and re-serializes.
fn pin_trailer_id(bytes: &[u8]) -> Result<Vec<u8>, RenderError> {
    let mut document =
        lopdf::Document::load_mem(bytes).map_err(|e| RenderError::Save(e.to_string()))?;
    document.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(DOCUMENT_ID.as_bytes().to_vec(), StringFormat::Literal),
            Object::String(INSTANCE_ID.as_bytes().to_vec(), StringFormat::Literal),
        ]),
    );

    let mut out = Vec::new();
    document
        .save_to(&mut out)
        .map_err(|e| RenderError::Save(e.to_string()))?;
    Ok(out)
}

/// `discharge_summary_<last name>.pdf`, restricted to characters safe in a header.
pub fn document_filename(record: &PatientRecord) -> String {
    let last_name: String = record
        .patient_info
        .last_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if last_name.is_empty() {
        "discharge_summary.pdf".to_string()
    } else {
        format!("discharge_summary_{}.pdf", last_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::PatientGenerator;
    use crate::summary::FALLBACK_SUMMARY;
    use crate::vocabulary::Vocabulary;
    use chrono::NaiveDate;
    use rand::{SeedableRng, rngs::StdRng};

    fn record() -> PatientRecord {
        PatientGenerator::new(Vocabulary::default())
            .unwrap()
            .generate_with(
                &mut StdRng::seed_from_u64(5),
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            )
    }

    #[test]
    fn output_is_a_pdf() {
        let bytes = render_document(&record(), "Patient is stable.").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn identical_input_gives_identical_bytes() {
        let record = record();
        let summary = "Hospital Course\n\nUneventful.\nDischarged home.";
        let first = render_document(&record, summary).unwrap();
        let second = render_document(&record, summary).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn trailer_id_is_fixed() {
        let bytes = render_document(&record(), "Stable.").unwrap();
        let document = lopdf::Document::load_mem(&bytes).unwrap();
        let ids = document.trailer.get(b"ID").unwrap().as_array().unwrap();

        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].as_str().unwrap(), DOCUMENT_ID.as_bytes());
        assert_eq!(ids[1].as_str().unwrap(), INSTANCE_ID.as_bytes());
    }

    #[test]
    fn long_summary_renders() {
        let summary = (0..400)
            .map(|i| format!("Line {i} of a very long discharge narrative."))
            .collect::<Vec<_>>()
            .join("\n");
        let layout = layout_document(&record(), &summary);
        assert!(layout.pages.len() > 3);
        let bytes = write_pdf(&layout).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn fallback_text_still_renders() {
        let bytes = render_document(&record(), FALLBACK_SUMMARY).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn filename_uses_last_name() {
        let mut record = record();
        record.patient_info.last_name = "Rodriguez".to_string();
        assert_eq!(document_filename(&record), "discharge_summary_Rodriguez.pdf");

        record.patient_info.last_name = "O'Brien \"x\"".to_string();
        assert_eq!(document_filename(&record), "discharge_summary_OBrienx.pdf");

        record.patient_info.last_name = "\u{738b}".to_string();
        assert_eq!(document_filename(&record), "discharge_summary.pdf");
    }
}
