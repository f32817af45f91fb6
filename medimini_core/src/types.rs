//! Core domain types for MediMini.
//!
//! This module defines the records that live in the store and the values
//! derived from them:
//! - Users and their medications
//! - Pairwise timing rules
//! - Conflicts and rescheduling suggestions
//! - The append-only change log

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Stored Records
// ============================================================================

/// Owner of a set of medications
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A prescribed drug with one or more scheduled administration times
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Medication {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dose: Option<String>,
    /// ISO-8601 administration times, in the order they were entered
    pub times: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

/// Minimum separation required between two named medications
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    pub id: String,
    pub med_a: String,
    pub med_b: String,
    pub min_time_diff_minutes: u32,
}

/// Audit record of one applied rescheduling
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeLogEntry {
    pub timestamp: DateTime<Utc>,
    pub medication_id: String,
    pub old_time: String,
    pub new_time: String,
}

/// The whole persisted data document
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct StoreDocument {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub changes_log: Vec<ChangeLogEntry>,
}

impl StoreDocument {
    /// Demo document written when no store exists yet
    pub fn seed() -> Self {
        Self {
            users: vec![User {
                id: "u1".into(),
                email: Some("demo@example.com".into()),
            }],
            medications: vec![
                Medication {
                    id: "m1".into(),
                    user_id: "u1".into(),
                    name: "MedA".into(),
                    dose: Some("10mg".into()),
                    times: vec!["2025-12-11T08:00:00".into()],
                    start_date: None,
                    end_date: None,
                },
                Medication {
                    id: "m2".into(),
                    user_id: "u1".into(),
                    name: "MedB".into(),
                    dose: Some("5mg".into()),
                    times: vec!["2025-12-11T09:00:00".into()],
                    start_date: None,
                    end_date: None,
                },
            ],
            changes_log: Vec::new(),
        }
    }
}

/// The separately stored rules document
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RuleSet {
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Demo rules written when no rules file exists yet
    pub fn seed() -> Self {
        Self {
            rules: vec![Rule {
                id: "R-001".into(),
                med_a: "MedA".into(),
                med_b: "MedB".into(),
                min_time_diff_minutes: 120,
            }],
        }
    }
}

// ============================================================================
// Derived Values
// ============================================================================

/// A rule violation between two specific administration times.
///
/// Older documents name the sides only by medication name, so the id fields
/// default to empty when absent.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conflict {
    pub rule_id: String,
    #[serde(default)]
    pub med_a_id: String,
    pub med_a: String,
    #[serde(default)]
    pub med_b_id: String,
    pub med_b: String,
    pub time_a: String,
    pub time_b: String,
    #[serde(default)]
    pub minutes_apart: i64,
}

/// A proposed new time for one medication
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Suggestion {
    #[serde(alias = "medication_id")]
    pub med_id: String,
    pub old_time: String,
    pub new_time: String,
}

/// All candidates for one detection run, one per conflict
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Suggestions {
    pub candidates: Vec<Suggestion>,
}

/// Result tag of an apply attempt
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStatus {
    Applied,
    MedicationNotFound,
    /// The medication no longer has the candidate's old time
    TimeNotFound,
}

/// Outcome of applying one suggestion
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub applied: bool,
    pub status: ApplyStatus,
    /// Number of times entries rewritten
    pub replaced: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_accepts_minimal_layout() {
        let json = r#"{
            "users": [{"id": "u1", "email": "demo@example.com"}],
            "medications": [
                {"id": "m1", "user_id": "u1", "name": "MedA", "dose": "10mg",
                 "times": ["2025-12-11T08:00:00"]}
            ],
            "changes_log": []
        }"#;
        let doc: StoreDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.medications[0].dose.as_deref(), Some("10mg"));
        assert!(doc.medications[0].start_date.is_none());
    }

    #[test]
    fn test_conflict_without_ids() {
        let json = r#"{"rule_id": "R-001", "med_a": "MedA", "med_b": "MedB",
                       "time_a": "2025-12-11T08:00:00", "time_b": "2025-12-11T09:00:00"}"#;
        let conflict: Conflict = serde_json::from_str(json).unwrap();
        assert!(conflict.med_a_id.is_empty());
        assert_eq!(conflict.med_b, "MedB");
    }

    #[test]
    fn test_apply_status_wire_name() {
        let json = serde_json::to_string(&ApplyStatus::MedicationNotFound).unwrap();
        assert_eq!(json, "\"medication_not_found\"");
        let json = serde_json::to_string(&ApplyStatus::TimeNotFound).unwrap();
        assert_eq!(json, "\"time_not_found\"");
    }

    #[test]
    fn test_seed_rule_matches_seed_medications() {
        let doc = StoreDocument::seed();
        let rules = RuleSet::seed();
        let names: Vec<_> = doc.medications.iter().map(|m| m.name.as_str()).collect();
        assert!(names.contains(&rules.rules[0].med_a.as_str()));
        assert!(names.contains(&rules.rules[0].med_b.as_str()));
    }
}
