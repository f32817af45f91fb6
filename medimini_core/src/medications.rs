//! Medication entry, removal and per-user listing.

use crate::time::Timestamp;
use crate::{Error, Medication, Result, StoreDocument};
use chrono::NaiveDate;
use uuid::Uuid;

/// User input for a new medication, before validation
#[derive(Clone, Debug, Default)]
pub struct NewMedication {
    pub name: String,
    pub dose: Option<String>,
    pub times: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl NewMedication {
    /// Reject input that must never reach the store
    ///
    /// Name and at least one time are required; every time must parse.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("medication name is required".into()));
        }

        if self.times.iter().all(|t| t.trim().is_empty()) {
            return Err(Error::Validation(
                "at least one administration time is required".into(),
            ));
        }

        for time in &self.times {
            Timestamp::parse(time)?;
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(Error::Validation(format!(
                    "end date {} is before start date {}",
                    end, start
                )));
            }
        }

        Ok(())
    }
}

/// Validate `input` and append it to `document` under `user_id`
pub fn add_medication(
    document: &mut StoreDocument,
    user_id: &str,
    input: NewMedication,
) -> Result<Medication> {
    input.validate()?;

    let dose = input
        .dose
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let medication = Medication {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        name: input.name.trim().to_string(),
        dose,
        times: input.times.iter().map(|t| t.trim().to_string()).collect(),
        start_date: input.start_date,
        end_date: input.end_date,
    };

    document.medications.push(medication.clone());
    tracing::info!("Added medication {} ({})", medication.name, medication.id);
    Ok(medication)
}

/// Remove a medication by id; returns whether one was removed
pub fn delete_medication(document: &mut StoreDocument, id: &str) -> bool {
    let before = document.medications.len();
    document.medications.retain(|m| m.id != id);
    let removed = document.medications.len() != before;

    if removed {
        tracing::info!("Deleted medication {}", id);
    } else {
        tracing::warn!("No medication {} to delete", id);
    }
    removed
}

/// Medications owned by `user_id`, in stored order
pub fn medications_for_user(document: &StoreDocument, user_id: &str) -> Vec<Medication> {
    document
        .medications
        .iter()
        .filter(|m| m.user_id == user_id)
        .cloned()
        .collect()
}
