use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub const NO_PROCEDURE: &str = "None";
pub const NO_KNOWN_ALLERGIES: &str = "No known allergies";

/// A full synthetic or uploaded patient record. Field names match the JSON upload format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub patient_info: PatientInfo,
    pub admission_info: AdmissionInfo,
    pub clinical_info: ClinicalInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vital_signs: Option<VitalSigns>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub laboratory_results: Option<LaboratoryResults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<FollowUp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub mrn: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            other => Err(format!("unknown gender '{}'", other)),
        }
    }
}

/// Same casing rules as `FromStr`, so JSON uploads accept `"male"` like the CSV path does.
impl<'de> Deserialize<'de> for Gender {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "AdmissionInfoFields")]
pub struct AdmissionInfo {
    pub admission_date: NaiveDate,
    pub discharge_date: NaiveDate,
    /// Days between admission and discharge. Uploaded records may carry a stale value.
    pub length_of_stay: i64,
    pub attending_physician: String,
}

impl AdmissionInfo {
    pub fn new(
        admission_date: NaiveDate,
        discharge_date: NaiveDate,
        attending_physician: impl Into<String>,
    ) -> Self {
        Self {
            admission_date,
            discharge_date,
            length_of_stay: stay_in_days(admission_date, discharge_date),
            attending_physician: attending_physician.into(),
        }
    }

    /// The length of stay implied by the two dates.
    pub fn computed_length_of_stay(&self) -> i64 {
        stay_in_days(self.admission_date, self.discharge_date)
    }

    pub fn is_length_of_stay_stale(&self) -> bool {
        self.length_of_stay != self.computed_length_of_stay()
    }
}

/// Wire form of [`AdmissionInfo`]; a missing length of stay is derived from the dates.
#[derive(Deserialize)]
struct AdmissionInfoFields {
    admission_date: NaiveDate,
    discharge_date: NaiveDate,
    #[serde(default)]
    length_of_stay: Option<i64>,
    attending_physician: String,
}

impl From<AdmissionInfoFields> for AdmissionInfo {
    fn from(fields: AdmissionInfoFields) -> Self {
        let mut info = AdmissionInfo::new(
            fields.admission_date,
            fields.discharge_date,
            fields.attending_physician,
        );
        if let Some(stored) = fields.length_of_stay {
            info.length_of_stay = stored;
        }
        info
    }
}

pub fn stay_in_days(admission_date: NaiveDate, discharge_date: NaiveDate) -> i64 {
    (discharge_date - admission_date).num_days()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalInfo {
    pub diagnoses: Vec<String>,
    /// A single procedure, or [`NO_PROCEDURE`].
    pub procedures: String,
    pub medications: Vec<String>,
    /// A single allergy, or [`NO_KNOWN_ALLERGIES`].
    pub allergies: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalSigns {
    /// Degrees Fahrenheit
    pub temperature: f64,
    pub heart_rate: u32,
    pub blood_pressure_systolic: u32,
    pub blood_pressure_diastolic: u32,
    pub respiratory_rate: u32,
    pub oxygen_saturation: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaboratoryResults {
    pub hemoglobin: f64,
    pub white_blood_cells: f64,
    pub platelets: u32,
    pub sodium: u32,
    pub potassium: f64,
    pub creatinine: f64,
    pub glucose: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUp {
    pub appointment: NaiveDate,
    pub care_instructions: String,
}

/// Field-by-field entry covering the reduced subset the manual form offers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualEntry {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub mrn: String,
    pub admission_date: NaiveDate,
    pub discharge_date: NaiveDate,
    pub attending_physician: String,
    /// One diagnosis per line
    pub diagnoses: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryEditRequest {
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadFormat {
    Json,
    Csv,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub format: UploadFormat,
}

/// Session preview returned to the client after every action.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub current_task: String,
    pub status_message: Option<String>,
    pub record: Option<PatientRecord>,
    pub length_of_stay_stale: bool,
    pub summary: Option<String>,
    pub summary_is_fallback: bool,
}
