use serde::{Deserialize, Serialize};

use crate::models::{ManualEntry, PatientRecord, UploadFormat};

/// Where the next patient record comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum RecordSource {
    Synthetic,
    Record { record: PatientRecord },
    Upload { format: UploadFormat, body: String },
    Manual { entry: ManualEntry },
}

impl RecordSource {
    pub fn label(&self) -> &'static str {
        match self {
            RecordSource::Synthetic => "synthetic generator",
            RecordSource::Record { .. } => "JSON body",
            RecordSource::Upload {
                format: UploadFormat::Json,
                ..
            } => "JSON upload",
            RecordSource::Upload {
                format: UploadFormat::Csv,
                ..
            } => "CSV upload",
            RecordSource::Manual { .. } => "manual entry",
        }
    }
}

pub mod session_keys {
    pub const RECORD_SOURCE: &str = "record_source";
    pub const PATIENT_RECORD: &str = "patient_record";
    pub const DISCHARGE_SUMMARY: &str = "discharge_summary";
    pub const SUMMARY_IS_FALLBACK: &str = "summary_is_fallback";
    pub const SUMMARY_EDIT: &str = "summary_edit";
    /// Base64 of the last rendered PDF
    pub const DOCUMENT_PDF: &str = "document_pdf";
    pub const DOCUMENT_FILENAME: &str = "document_filename";
}
