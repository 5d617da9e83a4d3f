//! Turning uploaded files and manual form input into a [`PatientRecord`].

use chrono::{Local, NaiveDate};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{
    AdmissionInfo, ClinicalInfo, ManualEntry, NO_KNOWN_ALLERGIES, NO_PROCEDURE, PatientInfo,
    PatientRecord, UploadFormat,
};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Invalid JSON patient record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid CSV patient record: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV file has no data rows")]
    EmptyCsv,

    #[error("CSV column '{0}' is missing or empty")]
    MissingColumn(&'static str),

    #[error("CSV column '{column}' has an invalid value '{value}': {reason}")]
    InvalidValue {
        column: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("Date of birth {0} is not in the past")]
    BirthDateNotInPast(NaiveDate),
}

/// Rules shared by every record source: names are non-blank and the patient
/// was born before `today`.
pub fn validate_patient_info(info: &PatientInfo, today: NaiveDate) -> Result<(), IngestError> {
    if info.first_name.trim().is_empty() {
        return Err(IngestError::EmptyField("First name"));
    }
    if info.last_name.trim().is_empty() {
        return Err(IngestError::EmptyField("Last name"));
    }
    if info.date_of_birth >= today {
        return Err(IngestError::BirthDateNotInPast(info.date_of_birth));
    }
    Ok(())
}

/// Trims and validates a record that arrived whole. A stored length of stay that
/// disagrees with the dates is kept and logged.
pub fn check_record(
    mut record: PatientRecord,
    today: NaiveDate,
) -> Result<PatientRecord, IngestError> {
    let info = &mut record.patient_info;
    info.first_name = info.first_name.trim().to_string();
    info.last_name = info.last_name.trim().to_string();
    validate_patient_info(info, today)?;

    if record.admission_info.is_length_of_stay_stale() {
        warn!(
            stored = record.admission_info.length_of_stay,
            computed = record.admission_info.computed_length_of_stay(),
            "Record has a stale length of stay"
        );
    }
    Ok(record)
}

pub fn parse_upload(format: UploadFormat, body: &[u8]) -> Result<PatientRecord, IngestError> {
    parse_upload_on(format, body, Local::now().date_naive())
}

pub fn parse_upload_on(
    format: UploadFormat,
    body: &[u8],
    today: NaiveDate,
) -> Result<PatientRecord, IngestError> {
    match format {
        UploadFormat::Json => parse_json_on(body, today),
        UploadFormat::Csv => parse_csv_on(body, today),
    }
}

pub fn parse_json_on(body: &[u8], today: NaiveDate) -> Result<PatientRecord, IngestError> {
    let record: PatientRecord = serde_json::from_slice(body)?;
    check_record(record, today)
}

/// Reads the first data row as one flattened record.
///
/// Columns are matched by leaf field name. List fields take the whole cell as a
/// single entry and the optional sections are left empty: nested structure is not
/// reconstructed from flat columns.
pub fn parse_csv_on(body: &[u8], today: NaiveDate) -> Result<PatientRecord, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body);

    let headers = reader.headers()?.clone();
    let row = reader
        .records()
        .next()
        .ok_or(IngestError::EmptyCsv)??;

    let cells: HashMap<&str, &str> = headers.iter().zip(row.iter()).collect();
    debug!(columns = cells.len(), "Parsed first CSV row");
    let row = FlatRow { cells };

    let admission_date = row.date("admission_date")?;
    let discharge_date = row.date("discharge_date")?;
    let mut admission_info =
        AdmissionInfo::new(admission_date, discharge_date, row.required("attending_physician")?);
    if let Some(stay) = row.optional("length_of_stay") {
        admission_info.length_of_stay = stay.parse().map_err(|e: std::num::ParseIntError| {
            IngestError::InvalidValue {
                column: "length_of_stay",
                value: stay.to_string(),
                reason: e.to_string(),
            }
        })?;
    }

    let gender = row.required("gender")?;
    let patient_info = PatientInfo {
        first_name: row.required("first_name")?.to_string(),
        last_name: row.required("last_name")?.to_string(),
        date_of_birth: row.date("date_of_birth")?,
        gender: gender.parse().map_err(|reason| IngestError::InvalidValue {
            column: "gender",
            value: gender.to_string(),
            reason,
        })?,
        mrn: row.required("mrn")?.to_string(),
    };
    validate_patient_info(&patient_info, today)?;

    let clinical_info = ClinicalInfo {
        diagnoses: row.optional("diagnoses").map(|d| vec![d.to_string()]).unwrap_or_default(),
        procedures: row.optional("procedures").unwrap_or(NO_PROCEDURE).to_string(),
        medications: row.optional("medications").map(|m| vec![m.to_string()]).unwrap_or_default(),
        allergies: row.optional("allergies").unwrap_or(NO_KNOWN_ALLERGIES).to_string(),
    };

    Ok(PatientRecord {
        patient_info,
        admission_info,
        clinical_info,
        vital_signs: None,
        laboratory_results: None,
        follow_up: None,
    })
}

struct FlatRow<'a> {
    cells: HashMap<&'a str, &'a str>,
}

impl<'a> FlatRow<'a> {
    fn optional(&self, column: &str) -> Option<&'a str> {
        self.cells.get(column).copied().filter(|v| !v.is_empty())
    }

    fn required(&self, column: &'static str) -> Result<&'a str, IngestError> {
        self.optional(column).ok_or(IngestError::MissingColumn(column))
    }

    fn date(&self, column: &'static str) -> Result<NaiveDate, IngestError> {
        let value = self.required(column)?;
        NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| IngestError::InvalidValue {
            column,
            value: value.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Builds a record from the manual form. Admission/discharge order is not checked.
pub fn from_manual_entry(entry: ManualEntry) -> Result<PatientRecord, IngestError> {
    from_manual_entry_on(entry, Local::now().date_naive())
}

pub fn from_manual_entry_on(
    entry: ManualEntry,
    today: NaiveDate,
) -> Result<PatientRecord, IngestError> {
    let patient_info = PatientInfo {
        first_name: entry.first_name.trim().to_string(),
        last_name: entry.last_name.trim().to_string(),
        date_of_birth: entry.date_of_birth,
        gender: entry.gender,
        mrn: entry.mrn,
    };
    validate_patient_info(&patient_info, today)?;

    let diagnoses = entry
        .diagnoses
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    Ok(PatientRecord {
        patient_info,
        admission_info: AdmissionInfo::new(
            entry.admission_date,
            entry.discharge_date,
            entry.attending_physician,
        ),
        clinical_info: ClinicalInfo {
            diagnoses,
            procedures: NO_PROCEDURE.to_string(),
            medications: vec![NO_PROCEDURE.to_string()],
            allergies: NO_KNOWN_ALLERGIES.to_string(),
        },
        vital_signs: None,
        laboratory_results: None,
        follow_up: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Gender;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2024, 6, 1)
    }

    const CSV: &str = "\
first_name,last_name,date_of_birth,gender,mrn,admission_date,discharge_date,attending_physician,diagnoses,medications
Maria, Garcia ,1960-02-29,female,MRN654321,2024-01-01,2024-01-08,Dr. Jones,Asthma; COPD,Albuterol inhaler
John,Smith,1950-01-01,Male,MRN000001,2024-02-01,2024-02-02,Dr. Davis,Hypertension,
";

    #[test]
    fn csv_uses_only_the_first_row() {
        let record = parse_csv_on(CSV.as_bytes(), today()).unwrap();
        assert_eq!(record.patient_info.first_name, "Maria");
        assert_eq!(record.patient_info.last_name, "Garcia");
        assert_eq!(record.patient_info.gender, Gender::Female);
        assert_eq!(record.admission_info.length_of_stay, 7);
        assert!(record.vital_signs.is_none());
        assert!(record.follow_up.is_none());
    }

    #[test]
    fn csv_list_cells_are_not_split() {
        let record = parse_csv_on(CSV.as_bytes(), today()).unwrap();
        assert_eq!(record.clinical_info.diagnoses, vec!["Asthma; COPD"]);
        assert_eq!(record.clinical_info.medications, vec!["Albuterol inhaler"]);
        assert_eq!(record.clinical_info.procedures, "None");
        assert_eq!(record.clinical_info.allergies, "No known allergies");
    }

    #[test]
    fn csv_keeps_an_explicit_length_of_stay() {
        let csv = "first_name,last_name,date_of_birth,gender,mrn,admission_date,discharge_date,length_of_stay,attending_physician\n\
                   Emma,Brown,1980-03-03,Other,X1,2024-01-01,2024-01-08,5,Dr. Miller\n";
        let record = parse_csv_on(csv.as_bytes(), today()).unwrap();
        assert_eq!(record.admission_info.length_of_stay, 5);
        assert!(record.admission_info.is_length_of_stay_stale());
    }

    #[test]
    fn csv_without_rows_or_columns_is_rejected() {
        let header_only = "first_name,last_name\n";
        assert!(matches!(
            parse_csv_on(header_only.as_bytes(), today()),
            Err(IngestError::EmptyCsv)
        ));

        let missing = "first_name,last_name\nJohn,Smith\n";
        assert!(matches!(
            parse_csv_on(missing.as_bytes(), today()),
            Err(IngestError::MissingColumn("admission_date"))
        ));
    }

    #[test]
    fn csv_bad_date_names_the_column() {
        let csv = "first_name,last_name,date_of_birth,gender,mrn,admission_date,discharge_date,attending_physician\n\
                   Emma,Brown,1980-03-03,Other,X1,01/01/2024,2024-01-08,Dr. Miller\n";
        let err = parse_csv_on(csv.as_bytes(), today()).unwrap_err();
        assert!(matches!(
            err,
            IngestError::InvalidValue { column: "admission_date", .. }
        ));
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(
            parse_upload(UploadFormat::Json, b"{\"patient_info\": 3}"),
            Err(IngestError::Json(_))
        ));
    }

    fn json_record(first_name: &str, date_of_birth: &str) -> String {
        serde_json::json!({
            "patient_info": {
                "first_name": first_name,
                "last_name": "Doe",
                "date_of_birth": date_of_birth,
                "gender": "Male",
                "mrn": "MRN123456"
            },
            "admission_info": {
                "admission_date": "2024-01-01",
                "discharge_date": "2024-01-08",
                "attending_physician": "Dr. Smith"
            },
            "clinical_info": {
                "diagnoses": ["Hypertension"],
                "procedures": "None",
                "medications": [],
                "allergies": "None"
            }
        })
        .to_string()
    }

    #[test]
    fn json_upload_without_length_of_stay_computes_it() {
        let body = json_record(" John ", "1974-06-01");
        let record = parse_upload_on(UploadFormat::Json, body.as_bytes(), today()).unwrap();
        assert_eq!(record.patient_info.first_name, "John");
        assert_eq!(record.admission_info.length_of_stay, 7);
        assert!(!record.admission_info.is_length_of_stay_stale());
    }

    #[test]
    fn json_upload_rejects_blank_name_and_future_birth() {
        let blank = json_record("   ", "1974-06-01");
        assert!(matches!(
            parse_json_on(blank.as_bytes(), today()),
            Err(IngestError::EmptyField("First name"))
        ));

        let unborn = json_record("John", "2999-01-01");
        assert!(matches!(
            parse_json_on(unborn.as_bytes(), today()),
            Err(IngestError::BirthDateNotInPast(_))
        ));
    }

    #[test]
    fn csv_upload_rejects_future_birth() {
        let csv = "first_name,last_name,date_of_birth,gender,mrn,admission_date,discharge_date,attending_physician\n\
                   Emma,Brown,2999-03-03,Other,X1,2024-01-01,2024-01-08,Dr. Miller\n";
        assert!(matches!(
            parse_upload_on(UploadFormat::Csv, csv.as_bytes(), today()),
            Err(IngestError::BirthDateNotInPast(_))
        ));
    }

    fn entry() -> ManualEntry {
        ManualEntry {
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            date_of_birth: date(1974, 6, 1),
            gender: Gender::Male,
            mrn: "MRN123456".to_string(),
            admission_date: date(2024, 1, 1),
            discharge_date: date(2024, 1, 8),
            attending_physician: "Dr. Smith".to_string(),
            diagnoses: "Hypertension\nType 2 Diabetes\n".to_string(),
        }
    }

    #[test]
    fn manual_entry_fills_sentinels() {
        let record = from_manual_entry_on(entry(), date(2024, 6, 1)).unwrap();
        assert_eq!(record.admission_info.length_of_stay, 7);
        assert_eq!(
            record.clinical_info.diagnoses,
            vec!["Hypertension", "Type 2 Diabetes"]
        );
        assert_eq!(record.clinical_info.procedures, "None");
        assert_eq!(record.clinical_info.medications, vec!["None"]);
        assert_eq!(record.clinical_info.allergies, "No known allergies");
        assert!(record.vital_signs.is_none());
        assert!(record.laboratory_results.is_none());
        assert!(record.follow_up.is_none());
    }

    #[test]
    fn manual_entry_allows_discharge_before_admission() {
        let mut entry = entry();
        entry.discharge_date = date(2023, 12, 30);
        let record = from_manual_entry_on(entry, date(2024, 6, 1)).unwrap();
        assert_eq!(record.admission_info.length_of_stay, -2);
    }

    #[test]
    fn manual_entry_rejects_blank_names_and_future_birth() {
        let mut blank = entry();
        blank.last_name = "  ".to_string();
        assert!(matches!(
            from_manual_entry_on(blank, date(2024, 6, 1)),
            Err(IngestError::EmptyField("Last name"))
        ));

        let mut unborn = entry();
        unborn.date_of_birth = date(2024, 6, 1);
        assert!(matches!(
            from_manual_entry_on(unborn, date(2024, 6, 1)),
            Err(IngestError::BirthDateNotInPast(_))
        ));
    }
}
