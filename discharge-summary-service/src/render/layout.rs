use super::metrics::{normalize_text, pt_to_mm, text_width_mm};
use super::{
    BREAK_Y, CELL_PADDING, CONTENT_WIDTH, DocumentLayout, FontStyle, MARGIN, PageLayout, TextRun,
};
use crate::models::PatientRecord;

pub const DISCLAIMER: &str =
    "This is an AI-generated discharge summary and requires physician review.";

const TITLE_SIZE: f32 = 16.0;
const HEADER_SIZE: f32 = 12.0;
const BODY_SIZE: f32 = 10.0;
const HEADER_HEIGHT: f32 = 10.0;
const FIELD_HEIGHT: f32 = 6.0;
const SUMMARY_LINE_HEIGHT: f32 = 5.0;
const SECTION_GAP: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Center,
}

/// Positions every line of the document; no PDF objects are created here.
pub fn layout_document(record: &PatientRecord, summary_text: &str) -> DocumentLayout {
    let mut cursor = Cursor::new();

    cursor.cell("DISCHARGE SUMMARY", FontStyle::Bold, TITLE_SIZE, HEADER_HEIGHT, Align::Center);

    cursor.cell("Patient Information", FontStyle::Bold, HEADER_SIZE, HEADER_HEIGHT, Align::Left);
    let patient = &record.patient_info;
    let admission = &record.admission_info;
    let fields = [
        format!("Name: {} {}", patient.first_name, patient.last_name),
        format!("DOB: {}", patient.date_of_birth),
        format!("MRN: {}", patient.mrn),
        format!("Gender: {}", patient.gender),
        format!("Admission Date: {}", admission.admission_date),
        format!("Discharge Date: {}", admission.discharge_date),
        format!("Attending Physician: {}", admission.attending_physician),
    ];
    for field in &fields {
        cursor.cell(field, FontStyle::Regular, BODY_SIZE, FIELD_HEIGHT, Align::Left);
    }

    cursor.gap(SECTION_GAP);
    cursor.cell("Discharge Summary", FontStyle::Bold, HEADER_SIZE, HEADER_HEIGHT, Align::Left);

    for line in summary_text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            cursor.gap(SUMMARY_LINE_HEIGHT);
        } else {
            cursor.wrapped(line, FontStyle::Regular, BODY_SIZE, SUMMARY_LINE_HEIGHT);
        }
    }

    cursor.gap(SECTION_GAP);
    cursor.cell(DISCLAIMER, FontStyle::Bold, BODY_SIZE, HEADER_HEIGHT, Align::Left);

    cursor.finish()
}

/// Flowing layout state: the page being filled and the top of the next line.
struct Cursor {
    finished: Vec<PageLayout>,
    current: PageLayout,
    y: f32,
}

impl Cursor {
    fn new() -> Self {
        Self {
            finished: Vec::new(),
            current: PageLayout::default(),
            y: MARGIN,
        }
    }

    /// Vertical space only; a gap never opens a page by itself.
    fn gap(&mut self, height: f32) {
        self.y += height;
    }

    fn cell(&mut self, text: &str, style: FontStyle, size_pt: f32, height: f32, align: Align) {
        if self.y + height > BREAK_Y {
            self.new_page();
        }

        let text = normalize_text(text);
        if !text.is_empty() {
            let x = match align {
                Align::Left => MARGIN + CELL_PADDING,
                Align::Center => {
                    MARGIN + (CONTENT_WIDTH - text_width_mm(&text, style, size_pt)) / 2.0
                }
            };
            // Vertically centred in the cell, as the baseline sits ~0.3 em below the midline.
            let baseline = self.y + height / 2.0 + 0.3 * pt_to_mm(size_pt);
            self.current.runs.push(TextRun {
                text,
                style,
                size_pt,
                x_mm: x,
                baseline_mm: baseline,
            });
        }

        self.y += height;
    }

    fn wrapped(&mut self, text: &str, style: FontStyle, size_pt: f32, line_height: f32) {
        let max_width = CONTENT_WIDTH - 2.0 * CELL_PADDING;
        for line in wrap_line(&normalize_text(text), style, size_pt, max_width) {
            self.cell(&line, style, size_pt, line_height, Align::Left);
        }
    }

    fn new_page(&mut self) {
        let page = std::mem::take(&mut self.current);
        self.finished.push(page);
        self.y = MARGIN;
    }

    fn finish(mut self) -> DocumentLayout {
        self.finished.push(self.current);
        DocumentLayout {
            pages: self.finished,
        }
    }
}

/// Greedy word wrap. Breaks after the last space that fits; a word wider than the
/// line is split between characters. Always yields at least one line.
pub fn wrap_line(text: &str, style: FontStyle, size_pt: f32, max_width_mm: f32) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut lines = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut width = 0.0;
        let mut last_space = None;
        let mut end = start;

        while end < chars.len() {
            let c = chars[end];
            let advance = text_width_mm(c.encode_utf8(&mut [0; 4]), style, size_pt);
            if width + advance > max_width_mm && end > start {
                break;
            }
            if c == ' ' {
                last_space = Some(end);
            }
            width += advance;
            end += 1;
        }

        if end == chars.len() {
            lines.push(chars[start..].iter().collect());
            break;
        }

        match last_space {
            Some(space) if space > start => {
                lines.push(chars[start..space].iter().collect());
                start = space + 1;
            }
            _ => {
                lines.push(chars[start..end].iter().collect());
                start = end;
            }
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
