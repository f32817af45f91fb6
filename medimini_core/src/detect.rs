//! Conflict detection between medication administration times.
//!
//! Rules name medications, not records: every medication whose name equals a
//! rule's `med_a` is compared with every medication whose name equals its
//! `med_b`, across all of their times.

use crate::time::Timestamp;
use crate::{Conflict, Medication, Result, Rule};

/// A medication with its times parsed once up front
struct Parsed<'a> {
    medication: &'a Medication,
    times: Vec<Timestamp>,
}

/// Find every pair of administration times that violates a rule
///
/// Output order is rule order, then `med_a` matches, then `med_b` matches,
/// then time order within each medication. No deduplication is done.
///
/// A medication that matches both sides of a rule is never compared with the
/// same administration time; its other time pairs are reported in both orders.
///
/// Fails with [`crate::Error::Timestamp`] on the first unparseable time of a
/// medication that some rule names.
pub fn detect_conflicts(medications: &[Medication], rules: &[Rule]) -> Result<Vec<Conflict>> {
    let mut conflicts = Vec::new();

    for rule in rules {
        let side_a = parse_matching(medications, &rule.med_a)?;
        let side_b = parse_matching(medications, &rule.med_b)?;
        let threshold_millis = i64::from(rule.min_time_diff_minutes) * 60_000;

        for a in &side_a {
            for b in &side_b {
                let same_record = std::ptr::eq(a.medication, b.medication);

                for (i, ta) in a.times.iter().enumerate() {
                    for (j, tb) in b.times.iter().enumerate() {
                        if same_record && i == j {
                            continue;
                        }

                        let diff = ta.abs_diff_millis(tb);
                        if diff < threshold_millis {
                            conflicts.push(Conflict {
                                rule_id: rule.id.clone(),
                                med_a_id: a.medication.id.clone(),
                                med_a: a.medication.name.clone(),
                                med_b_id: b.medication.id.clone(),
                                med_b: b.medication.name.clone(),
                                time_a: a.medication.times[i].clone(),
                                time_b: b.medication.times[j].clone(),
                                minutes_apart: diff / 60_000,
                            });
                        }
                    }
                }
            }
        }
    }

    tracing::info!(
        "Checked {} medications against {} rules: {} conflicts",
        medications.len(),
        rules.len(),
        conflicts.len()
    );

    Ok(conflicts)
}

fn parse_matching<'a>(medications: &'a [Medication], name: &str) -> Result<Vec<Parsed<'a>>> {
    medications
        .iter()
        .filter(|m| m.name == name)
        .map(|medication| {
            let times = medication
                .times
                .iter()
                .map(|t| Timestamp::parse(t))
                .collect::<Result<Vec<_>>>()?;
            Ok(Parsed { medication, times })
        })
        .collect()
}
