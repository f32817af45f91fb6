use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use medimini_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "medimini")]
#[command(about = "Medication schedule and timing conflict assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Act as this user instead of the configured one
    #[arg(long, global = true)]
    user: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the medication schedule (default)
    List,

    /// Add a medication
    Add {
        /// Medication name (matched against rule names)
        #[arg(long)]
        name: String,

        /// Dose, free text
        #[arg(long)]
        dose: Option<String>,

        /// Administration time, ISO-8601 (repeatable)
        #[arg(long = "time", required = true)]
        times: Vec<String>,

        #[arg(long)]
        start_date: Option<NaiveDate>,

        #[arg(long)]
        end_date: Option<NaiveDate>,
    },

    /// Delete a medication by id
    Remove { id: String },

    /// Show the timing rules
    Rules,

    /// Check the schedule for rule violations
    Check {
        /// Print conflicts as JSON
        #[arg(long)]
        json: bool,
    },

    /// Propose new times for every conflict
    Suggest {
        /// Print suggestions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply the suggestion with this number from `suggest`
    Apply { index: usize },

    /// Show the rescheduling history
    Log {
        /// Export the history as CSV to this path instead
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

fn main() {
    medimini_core::logging::init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let data = match cli.data_dir {
        Some(data_dir) => config::DataConfig { data_dir },
        None => config.data.clone(),
    };
    let user_id = cli.user.unwrap_or_else(|| config.user.id.clone());

    let store = JsonFileStore::new(data.store_path());
    let rules_path = data.rules_path();
    tracing::debug!("Using data dir {:?} as user {}", data.data_dir, user_id);

    match cli.command.unwrap_or(Commands::List) {
        Commands::List => cmd_list(&store, &user_id),
        Commands::Add {
            name,
            dose,
            times,
            start_date,
            end_date,
        } => cmd_add(
            &store,
            &user_id,
            NewMedication {
                name,
                dose,
                times,
                start_date,
                end_date,
            },
        ),
        Commands::Remove { id } => cmd_remove(&store, &user_id, &id),
        Commands::Rules => cmd_rules(&rules_path),
        Commands::Check { json } => cmd_check(&store, &rules_path, &user_id, json),
        Commands::Suggest { json } => cmd_suggest(&store, &rules_path, &user_id, json),
        Commands::Apply { index } => cmd_apply(&store, &rules_path, &user_id, index),
        Commands::Log { csv } => cmd_log(&store, csv),
    }
}

fn cmd_list(store: &JsonFileStore, user_id: &str) -> Result<()> {
    let document = store.load()?;
    let medications = medications_for_user(&document, user_id);

    println!("Schedule for {}", user_id);
    if medications.is_empty() {
        println!("  (no medications)");
        return Ok(());
    }

    for m in &medications {
        let dose = m.dose.as_deref().unwrap_or("");
        println!("  {} ({}) - {} [{}]", m.name, dose, m.times.join(", "), m.id);
    }
    Ok(())
}

fn cmd_add(store: &JsonFileStore, user_id: &str, input: NewMedication) -> Result<()> {
    // Reject before taking the writer lock
    input.validate()?;

    let mut added = None;
    store.update(&mut |document| {
        added = Some(add_medication(document, user_id, input.clone())?);
        Ok(true)
    })?;

    if let Some(medication) = added {
        println!("✓ Added {} [{}]", medication.name, medication.id);
    }
    Ok(())
}

fn cmd_remove(store: &JsonFileStore, user_id: &str, id: &str) -> Result<()> {
    let mut removed = false;
    store.update(&mut |document| {
        let owned = document
            .medications
            .iter()
            .any(|m| m.id == id && m.user_id == user_id);
        removed = owned && delete_medication(document, id);
        Ok(removed)
    })?;

    if removed {
        println!("✓ Removed {}", id);
        Ok(())
    } else {
        Err(Error::NotFound(format!("medication {}", id)))
    }
}

fn cmd_rules(rules_path: &Path) -> Result<()> {
    let rules = RuleSet::load(rules_path)?;
    for r in &rules.rules {
        println!(
            "  {}: {} / {} at least {} min apart",
            r.id, r.med_a, r.med_b, r.min_time_diff_minutes
        );
    }
    Ok(())
}

/// Conflicts for the user's current schedule, recomputed on every call
fn current_conflicts(
    store: &JsonFileStore,
    rules_path: &Path,
    user_id: &str,
) -> Result<Vec<Conflict>> {
    let document = store.load()?;
    let rules = RuleSet::load(rules_path)?;
    let medications = medications_for_user(&document, user_id);
    detect_conflicts(&medications, &rules.rules)
}

fn cmd_check(store: &JsonFileStore, rules_path: &Path, user_id: &str, json: bool) -> Result<()> {
    let conflicts = current_conflicts(store, rules_path, user_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&conflicts)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("✓ No conflicts found");
        return Ok(());
    }

    println!("{} conflict(s) detected", conflicts.len());
    for c in &conflicts {
        println!(
            "  [{}] {} @ {} and {} @ {} are {} min apart",
            c.rule_id, c.med_a, c.time_a, c.med_b, c.time_b, c.minutes_apart
        );
    }
    Ok(())
}

fn cmd_suggest(
    store: &JsonFileStore,
    rules_path: &Path,
    user_id: &str,
    json: bool,
) -> Result<()> {
    let conflicts = current_conflicts(store, rules_path, user_id)?;
    let suggestions = generate_suggestions(&conflicts)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&suggestions)?);
        return Ok(());
    }

    if suggestions.candidates.is_empty() {
        println!("✓ No conflicts found");
        return Ok(());
    }

    for (i, (s, c)) in suggestions.candidates.iter().zip(&conflicts).enumerate() {
        println!("  {}. move {} from {} to {} [{}]", i + 1, c.med_b, s.old_time, s.new_time, c.rule_id);
    }
    Ok(())
}

fn cmd_apply(store: &JsonFileStore, rules_path: &Path, user_id: &str, index: usize) -> Result<()> {
    let rules = RuleSet::load(rules_path)?;
    let (candidate, outcome) = apply_numbered(store, &rules.rules, user_id, index)?;

    match outcome.status {
        ApplyStatus::Applied => {
            println!("✓ Suggestion applied: {} -> {}", candidate.old_time, candidate.new_time);
            Ok(())
        }
        ApplyStatus::MedicationNotFound => Err(Error::NotFound(format!(
            "medication {}; suggestion not applied",
            candidate.med_id
        ))),
        ApplyStatus::TimeNotFound => Err(Error::NotFound(format!(
            "time {} for medication {}; suggestion not applied",
            candidate.old_time, candidate.med_id
        ))),
    }
}

fn cmd_log(store: &JsonFileStore, csv: Option<PathBuf>) -> Result<()> {
    let document = store.load()?;

    if let Some(path) = csv {
        let count = export_change_log_csv(&document.changes_log, &path)?;
        println!("✓ Exported {} changes to {}", count, path.display());
        return Ok(());
    }

    if document.changes_log.is_empty() {
        println!("No changes recorded");
        return Ok(());
    }

    for entry in &document.changes_log {
        println!(
            "  {} {}: {} -> {}",
            entry.timestamp.to_rfc3339(),
            entry.medication_id,
            entry.old_time,
            entry.new_time
        );
    }
    Ok(())
}
