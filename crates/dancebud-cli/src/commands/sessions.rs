use clap::Subcommand;
use dancebud_core::storage::SessionRecord;
use dancebud_core::Database;

#[derive(Subcommand)]
pub enum SessionsAction {
    /// List stored sessions, newest first
    List {
        /// Only show this many sessions
        #[arg(long)]
        limit: Option<usize>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one session in full
    Show {
        id: i64,
    },
    /// Delete a session
    Delete {
        id: i64,
    },
    /// Delete every session
    Clear,
}

fn print_row(record: &SessionRecord) {
    let s = &record.summary;
    println!(
        "{:>4}  {}  {:<16}  {:>3}  {:>6}  {:>5} steps  {:>3} turns",
        record.id,
        s.date.format("%Y-%m-%d %H:%M"),
        s.routine_name,
        s.posture_score,
        s.formatted_duration,
        s.steps,
        s.turns,
    );
}

pub fn run(action: SessionsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        SessionsAction::List { limit, json } => {
            let records = match limit {
                Some(n) => db.recent_sessions(n)?,
                None => db.list_sessions()?,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No sessions yet.");
            } else {
                for record in &records {
                    print_row(record);
                }
            }
        }
        SessionsAction::Show { id } => {
            let record = db.get_session(id)?.ok_or_else(|| format!("session not found: {id}"))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        SessionsAction::Delete { id } => {
            if !db.delete_session(id)? {
                return Err(format!("session not found: {id}").into());
            }
            println!("Deleted session {id}");
        }
        SessionsAction::Clear => {
            let removed = db.clear_sessions()?;
            println!("Deleted {removed} sessions");
        }
    }
    Ok(())
}
