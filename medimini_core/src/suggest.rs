//! Rescheduling suggestions and their application.
//!
//! Each conflict yields one candidate: move the `med_b` side's time two hours
//! later. Candidates are not re-checked against the rules.

use crate::medications::medications_for_user;
use crate::store::Store;
use crate::time::Timestamp;
use crate::{
    ApplyOutcome, ApplyStatus, ChangeLogEntry, Conflict, Error, Medication, Result, Rule,
    StoreDocument, Suggestion, Suggestions,
};
use chrono::{DateTime, Duration, Utc};

/// Offset added to the second medication's time
pub fn suggestion_offset() -> Duration {
    Duration::hours(2)
}

/// Propose a new time for the second side of `conflict`
pub fn generate_suggestion(conflict: &Conflict) -> Result<Suggestion> {
    let old = Timestamp::parse(&conflict.time_b)?;
    let new_time = old.shifted(suggestion_offset())?.to_string();

    Ok(Suggestion {
        med_id: conflict.med_b_id.clone(),
        old_time: conflict.time_b.clone(),
        new_time,
    })
}

/// One candidate per conflict, in conflict order
pub fn generate_suggestions(conflicts: &[Conflict]) -> Result<Suggestions> {
    let candidates = conflicts
        .iter()
        .map(generate_suggestion)
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!("Generated {} suggestions", candidates.len());
    Ok(Suggestions { candidates })
}

/// Detect conflicts and generate candidates in one step
pub fn suggest_for(medications: &[Medication], rules: &[Rule]) -> Result<Suggestions> {
    let conflicts = crate::detect::detect_conflicts(medications, rules)?;
    generate_suggestions(&conflicts)
}

/// Apply one candidate to an in-memory document
///
/// Every occurrence of `old_time` in the medication's schedule becomes
/// `new_time` and a change-log entry stamped `now` is appended. An unknown
/// medication id, or a schedule that no longer holds `old_time`, leaves the
/// document untouched.
pub fn apply_suggestion(
    document: &mut StoreDocument,
    candidate: &Suggestion,
    now: DateTime<Utc>,
) -> ApplyOutcome {
    let Some(medication) = document
        .medications
        .iter_mut()
        .find(|m| m.id == candidate.med_id)
    else {
        tracing::warn!("Cannot apply suggestion: medication {} not found", candidate.med_id);
        return ApplyOutcome {
            applied: false,
            status: ApplyStatus::MedicationNotFound,
            replaced: 0,
        };
    };

    let mut replaced = 0;
    for time in medication.times.iter_mut() {
        if *time == candidate.old_time {
            *time = candidate.new_time.clone();
            replaced += 1;
        }
    }

    if replaced == 0 {
        tracing::warn!(
            "Medication {} has no time {}; schedule unchanged",
            candidate.med_id,
            candidate.old_time
        );
        return ApplyOutcome {
            applied: false,
            status: ApplyStatus::TimeNotFound,
            replaced: 0,
        };
    }

    document.changes_log.push(ChangeLogEntry {
        timestamp: now,
        medication_id: candidate.med_id.clone(),
        old_time: candidate.old_time.clone(),
        new_time: candidate.new_time.clone(),
    });

    tracing::info!(
        "Rescheduled {} from {} to {}",
        medication.name,
        candidate.old_time,
        candidate.new_time
    );

    ApplyOutcome {
        applied: true,
        status: ApplyStatus::Applied,
        replaced,
    }
}

/// Apply one candidate inside a single locked read-modify-write of `store`
pub fn apply_and_persist<S: Store + ?Sized>(store: &S, candidate: &Suggestion) -> Result<ApplyOutcome> {
    let mut outcome = None;
    store.update(&mut |document| {
        let result = apply_suggestion(document, candidate, Utc::now());
        let changed = result.applied;
        outcome = Some(result);
        Ok(changed)
    })?;

    outcome.ok_or_else(|| Error::Store("update finished without running".into()))
}

/// Apply candidate number `index` (1-based) of the user's current schedule
///
/// Conflicts and suggestions are recomputed from the document read under the
/// writer lock, so the chosen candidate always refers to the stored schedule.
pub fn apply_numbered<S: Store + ?Sized>(
    store: &S,
    rules: &[Rule],
    user_id: &str,
    index: usize,
) -> Result<(Suggestion, ApplyOutcome)> {
    let mut applied = None;
    store.update(&mut |document| {
        let medications = medications_for_user(document, user_id);
        let suggestions = suggest_for(&medications, rules)?;
        let count = suggestions.candidates.len();

        let candidate = index
            .checked_sub(1)
            .and_then(|i| suggestions.candidates.into_iter().nth(i))
            .ok_or_else(|| Error::NotFound(format!("suggestion {} (there are {})", index, count)))?;

        let outcome = apply_suggestion(document, &candidate, Utc::now());
        let changed = outcome.applied;
        applied = Some((candidate, outcome));
        Ok(changed)
    })?;

    applied.ok_or_else(|| Error::Store("update finished without running".into()))
}
