//! Word lists the synthetic generator draws from.
//!
//! The built-in lists are the defaults; a YAML file with the same field names can
//! replace any of them (missing fields keep their defaults).

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::generator::{MAX_DIAGNOSES, MAX_MEDICATIONS};

#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("Failed to read vocabulary file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse vocabulary file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Vocabulary list '{list}' needs at least {required} entries, found {found}")]
    TooFewEntries {
        list: &'static str,
        required: usize,
        found: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    pub first_names: Vec<String>,
    pub last_names: Vec<String>,
    pub diagnoses: Vec<String>,
    pub medications: Vec<String>,
    /// Should include the "None" sentinel so that no procedure is a possible draw.
    pub procedures: Vec<String>,
    pub allergies: Vec<String>,
    pub care_instructions: String,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            first_names: strings(&[
                "John", "Jane", "Robert", "Maria", "David", "Sarah", "Michael", "Emma", "James",
                "Lisa",
            ]),
            last_names: strings(&[
                "Smith",
                "Johnson",
                "Williams",
                "Brown",
                "Jones",
                "Garcia",
                "Miller",
                "Davis",
                "Rodriguez",
                "Martinez",
            ]),
            diagnoses: strings(&[
                "Type 2 Diabetes",
                "Hypertension",
                "Hyperlipidemia",
                "Asthma",
                "COPD",
                "Coronary Artery Disease",
                "Heart Failure",
                "Atrial Fibrillation",
                "Osteoarthritis",
                "Chronic Kidney Disease",
            ]),
            medications: strings(&[
                "Lisinopril 10mg",
                "Atorvastatin 20mg",
                "Metformin 500mg",
                "Levothyroxine 50mcg",
                "Amlodipine 5mg",
                "Metoprolol 25mg",
                "Omeprazole 20mg",
                "Albuterol inhaler",
                "Hydrochlorothiazide 12.5mg",
                "Gabapentin 300mg",
            ]),
            procedures: strings(&[
                "Coronary Angiography",
                "Appendectomy",
                "Cholecystectomy",
                "Total Knee Replacement",
                "Hip Replacement",
                "Colonoscopy",
                "CABG",
                "Hernia Repair",
                "Cataract Surgery",
                crate::models::NO_PROCEDURE,
            ]),
            allergies: strings(&[
                crate::models::NO_KNOWN_ALLERGIES,
                "Penicillin",
                "Sulfa drugs",
                "Shellfish",
                "Latex",
            ]),
            care_instructions: "Standard follow-up care".to_string(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Vocabulary {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, VocabularyError> {
        let vocabulary: Vocabulary = serde_yaml::from_str(yaml)?;
        vocabulary.validate()?;
        Ok(vocabulary)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, VocabularyError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| VocabularyError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Sampling without replacement needs as many entries as the largest draw.
    pub fn validate(&self) -> Result<(), VocabularyError> {
        let checks: [(&'static str, usize, usize); 6] = [
            ("first_names", self.first_names.len(), 1),
            ("last_names", self.last_names.len(), 1),
            ("diagnoses", self.diagnoses.len(), MAX_DIAGNOSES),
            ("medications", self.medications.len(), MAX_MEDICATIONS),
            ("procedures", self.procedures.len(), 1),
            ("allergies", self.allergies.len(), 1),
        ];

        for (list, found, required) in checks {
            if found < required {
                return Err(VocabularyError::TooFewEntries {
                    list,
                    required,
                    found,
                });
            }
        }
        Ok(())
    }
}
