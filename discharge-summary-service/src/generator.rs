use chrono::{Days, Local, NaiveDate};
use rand::{Rng, seq::IndexedRandom, seq::index};
use std::ops::RangeInclusive;

use crate::models::{
    AdmissionInfo, ClinicalInfo, FollowUp, Gender, LaboratoryResults, PatientInfo, PatientRecord,
    VitalSigns,
};
use crate::vocabulary::{Vocabulary, VocabularyError};

pub const MAX_DIAGNOSES: usize = 3;
pub const MAX_MEDICATIONS: usize = 4;

/// Age in days, 18 to 90 "years" of 365 days.
pub const AGE_DAYS: RangeInclusive<u64> = 18 * 365..=90 * 365;
pub const STAY_DAYS: RangeInclusive<u64> = 3..=14;
pub const FOLLOW_UP_DAYS: RangeInclusive<u64> = 7..=21;
pub const MRN_NUMBER: RangeInclusive<u32> = 100_000..=999_999;

pub const TEMPERATURE: RangeInclusive<f64> = 97.0..=99.5;
pub const HEART_RATE: RangeInclusive<u32> = 60..=100;
pub const SYSTOLIC: RangeInclusive<u32> = 110..=140;
pub const DIASTOLIC: RangeInclusive<u32> = 60..=90;
pub const RESPIRATORY_RATE: RangeInclusive<u32> = 12..=20;
pub const OXYGEN_SATURATION: RangeInclusive<u32> = 95..=100;

pub const HEMOGLOBIN: RangeInclusive<f64> = 12.0..=17.0;
pub const WHITE_BLOOD_CELLS: RangeInclusive<f64> = 4.0..=11.0;
pub const PLATELETS: RangeInclusive<u32> = 150..=450;
pub const SODIUM: RangeInclusive<u32> = 135..=145;
pub const POTASSIUM: RangeInclusive<f64> = 3.5..=5.0;
pub const CREATININE: RangeInclusive<f64> = 0.6..=1.2;
pub const GLUCOSE: RangeInclusive<u32> = 70..=110;

const GENDERS: [Gender; 2] = [Gender::Male, Gender::Female];

/// Builds synthetic patient records from a validated [`Vocabulary`].
#[derive(Debug, Clone)]
pub struct PatientGenerator {
    vocabulary: Vocabulary,
}

impl PatientGenerator {
    pub fn new(vocabulary: Vocabulary) -> Result<Self, VocabularyError> {
        vocabulary.validate()?;
        Ok(Self { vocabulary })
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// A fresh record using the thread RNG and today's local date.
    pub fn generate(&self) -> PatientRecord {
        self.generate_with(&mut rand::rng(), Local::now().date_naive())
    }

    /// Every field is drawn independently; only `length_of_stay` is derived.
    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R, today: NaiveDate) -> PatientRecord {
        let vocabulary = &self.vocabulary;

        let date_of_birth = today - Days::new(rng.random_range(AGE_DAYS));
        let admission_date = today - Days::new(rng.random_range(STAY_DAYS));
        let discharge_date = today;

        let diagnosis_count = rng.random_range(1..=MAX_DIAGNOSES);
        let diagnoses = sample_distinct(rng, &vocabulary.diagnoses, diagnosis_count);
        let medication_count = rng.random_range(1..=MAX_MEDICATIONS);
        let medications = sample_distinct(rng, &vocabulary.medications, medication_count);
        let procedure = pick(rng, &vocabulary.procedures);

        let vital_signs = VitalSigns {
            temperature: round_tenth(rng.random_range(TEMPERATURE)),
            heart_rate: rng.random_range(HEART_RATE),
            blood_pressure_systolic: rng.random_range(SYSTOLIC),
            blood_pressure_diastolic: rng.random_range(DIASTOLIC),
            respiratory_rate: rng.random_range(RESPIRATORY_RATE),
            oxygen_saturation: rng.random_range(OXYGEN_SATURATION),
        };

        let laboratory_results = LaboratoryResults {
            hemoglobin: round_tenth(rng.random_range(HEMOGLOBIN)),
            white_blood_cells: round_tenth(rng.random_range(WHITE_BLOOD_CELLS)),
            platelets: rng.random_range(PLATELETS),
            sodium: rng.random_range(SODIUM),
            potassium: round_tenth(rng.random_range(POTASSIUM)),
            creatinine: round_tenth(rng.random_range(CREATININE)),
            glucose: rng.random_range(GLUCOSE),
        };

        let patient_info = PatientInfo {
            first_name: pick(rng, &vocabulary.first_names),
            last_name: pick(rng, &vocabulary.last_names),
            date_of_birth,
            gender: GENDERS.choose(rng).copied().unwrap_or(Gender::Other),
            mrn: format!("MRN{}", rng.random_range(MRN_NUMBER)),
        };

        let attending_physician = format!("Dr. {}", pick(rng, &vocabulary.last_names));
        let admission_info = AdmissionInfo::new(admission_date, discharge_date, attending_physician);

        let clinical_info = ClinicalInfo {
            diagnoses,
            procedures: procedure,
            medications,
            allergies: pick(rng, &vocabulary.allergies),
        };

        let follow_up = FollowUp {
            appointment: discharge_date + Days::new(rng.random_range(FOLLOW_UP_DAYS)),
            care_instructions: vocabulary.care_instructions.clone(),
        };

        PatientRecord {
            patient_info,
            admission_info,
            clinical_info,
            vital_signs: Some(vital_signs),
            laboratory_results: Some(laboratory_results),
            follow_up: Some(follow_up),
        }
    }
}

fn pick<R: Rng + ?Sized>(rng: &mut R, items: &[String]) -> String {
    items.choose(rng).cloned().unwrap_or_default()
}

/// Without replacement, in the order drawn.
fn sample_distinct<R: Rng + ?Sized>(rng: &mut R, items: &[String], count: usize) -> Vec<String> {
    let count = count.min(items.len());
    index::sample(rng, items.len(), count)
        .iter()
        .map(|i| items[i].clone())
        .collect()
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::HashSet;

    fn generator() -> PatientGenerator {
        PatientGenerator::new(Vocabulary::default()).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn records(n: u64) -> Vec<PatientRecord> {
        let generator = generator();
        (0..n)
            .map(|seed| generator.generate_with(&mut StdRng::seed_from_u64(seed), today()))
            .collect()
    }

    #[test]
    fn stay_is_consistent_with_dates() {
        for record in records(200) {
            let admission = &record.admission_info;
            assert_eq!(admission.discharge_date, today());
            assert_eq!(
                admission.admission_date + Days::new(admission.length_of_stay as u64),
                admission.discharge_date
            );
            assert!((3..=14).contains(&admission.length_of_stay));
            assert!(!admission.is_length_of_stay_stale());
        }
    }

    #[test]
    fn diagnoses_and_medications_are_distinct_and_bounded() {
        for record in records(200) {
            let clinical = &record.clinical_info;
            assert!((1..=3).contains(&clinical.diagnoses.len()));
            assert!((1..=4).contains(&clinical.medications.len()));

            let unique: HashSet<_> = clinical.diagnoses.iter().collect();
            assert_eq!(unique.len(), clinical.diagnoses.len());
            let unique: HashSet<_> = clinical.medications.iter().collect();
            assert_eq!(unique.len(), clinical.medications.len());
        }
    }

    #[test]
    fn vitals_and_labs_stay_in_range() {
        for record in records(300) {
            let vitals = record.vital_signs.unwrap();
            assert!(TEMPERATURE.contains(&vitals.temperature));
            assert!(HEART_RATE.contains(&vitals.heart_rate));
            assert!(SYSTOLIC.contains(&vitals.blood_pressure_systolic));
            assert!(DIASTOLIC.contains(&vitals.blood_pressure_diastolic));
            assert!(RESPIRATORY_RATE.contains(&vitals.respiratory_rate));
            assert!(OXYGEN_SATURATION.contains(&vitals.oxygen_saturation));

            let labs = record.laboratory_results.unwrap();
            assert!(HEMOGLOBIN.contains(&labs.hemoglobin));
            assert!(WHITE_BLOOD_CELLS.contains(&labs.white_blood_cells));
            assert!(PLATELETS.contains(&labs.platelets));
            assert!(SODIUM.contains(&labs.sodium));
            assert!(POTASSIUM.contains(&labs.potassium));
            assert!(CREATININE.contains(&labs.creatinine));
            assert!(GLUCOSE.contains(&labs.glucose));
        }
    }

    #[test]
    fn demographics_follow_the_vocabulary() {
        let vocabulary = Vocabulary::default();
        for record in records(100) {
            let info = &record.patient_info;
            assert!(vocabulary.first_names.contains(&info.first_name));
            assert!(vocabulary.last_names.contains(&info.last_name));
            assert!(matches!(info.gender, Gender::Male | Gender::Female));
            assert_eq!(info.mrn.len(), 9);
            assert!(info.mrn.starts_with("MRN"));
            assert!(info.mrn[3..].chars().all(|c| c.is_ascii_digit()));

            let age_days = (today() - info.date_of_birth).num_days() as u64;
            assert!(AGE_DAYS.contains(&age_days));

            let physician = record.admission_info.attending_physician.as_str();
            let surname = physician.strip_prefix("Dr. ").unwrap();
            assert!(vocabulary.last_names.iter().any(|n| n == surname));

            assert!(vocabulary.procedures.contains(&record.clinical_info.procedures));
            assert!(vocabulary.allergies.contains(&record.clinical_info.allergies));
        }
    }

    #[test]
    fn follow_up_is_one_to_three_weeks_after_discharge() {
        for record in records(100) {
            let follow_up = record.follow_up.unwrap();
            let gap = (follow_up.appointment - record.admission_info.discharge_date).num_days();
            assert!((7..=21).contains(&gap));
            assert_eq!(follow_up.care_instructions, "Standard follow-up care");
        }
    }

    #[test]
    fn same_seed_gives_same_record() {
        let generator = generator();
        let a = generator.generate_with(&mut StdRng::seed_from_u64(7), today());
        let b = generator.generate_with(&mut StdRng::seed_from_u64(7), today());
        assert_eq!(a, b);
    }

    #[test]
    fn controlled_vocabulary_drives_output() {
        let vocabulary = Vocabulary {
            first_names: vec!["Ada".into()],
            last_names: vec!["Lovelace".into()],
            procedures: vec!["None".into()],
            ..Vocabulary::default()
        };
        let generator = PatientGenerator::new(vocabulary).unwrap();
        let record = generator.generate_with(&mut StdRng::seed_from_u64(1), today());

        assert_eq!(record.patient_info.first_name, "Ada");
        assert_eq!(record.patient_info.last_name, "Lovelace");
        assert_eq!(record.admission_info.attending_physician, "Dr. Lovelace");
        assert_eq!(record.clinical_info.procedures, "None");
    }
}
