use std::path::PathBuf;

use clap::Subcommand;
use dancebud_core::{DataExport, Database};

#[derive(Subcommand)]
pub enum DataAction {
    /// Export sessions, settings and statistics as JSON
    Export {
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replace all stored data with an export file
    Import {
        file: PathBuf,
    },
    /// Database location and record counts
    Info,
    /// Delete every session, setting and statistic
    Clear {
        /// Required; clearing cannot be undone
        #[arg(long)]
        yes: bool,
    },
}

pub fn run(action: DataAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        DataAction::Export { out } => {
            let json = serde_json::to_string_pretty(&db.export_all()?)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    eprintln!("Exported to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        DataAction::Import { file } => {
            let content = std::fs::read_to_string(&file)?;
            let export = DataExport::from_json(&content)?;
            let imported = db.import(&export)?;
            println!("Imported {imported} sessions");
        }
        DataAction::Info => {
            println!("{}", serde_json::to_string_pretty(&db.info()?)?);
        }
        DataAction::Clear { yes } => {
            if !yes {
                return Err("refusing to clear data without --yes".into());
            }
            db.clear_all_data()?;
            println!("All data cleared");
        }
    }
    Ok(())
}
