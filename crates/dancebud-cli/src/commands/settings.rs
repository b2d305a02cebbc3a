use clap::Subcommand;
use dancebud_core::Database;
use serde_json::Value;

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print a stored setting as JSON
    Get {
        key: String,
        /// Printed when the key is absent (parsed as JSON, else a string)
        #[arg(long)]
        default: Option<String>,
    },
    /// Store a setting
    Set {
        key: String,
        /// JSON value; anything that does not parse is stored as a string
        value: String,
    },
    /// List all stored settings
    List,
    /// Remove a setting
    Delete {
        key: String,
    },
    /// Show or change the dancer's display name
    Name {
        name: Option<String>,
    },
}

/// `42`, `true` and `{"a":1}` keep their JSON type; `Salsa` becomes a string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn run(action: SettingsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        SettingsAction::Get { key, default } => {
            let fallback = default.as_deref().map(parse_value).unwrap_or(Value::Null);
            println!("{}", db.get_setting(&key, fallback));
        }
        SettingsAction::Set { key, value } => {
            db.save_setting(&key, &parse_value(&value))?;
            println!("ok");
        }
        SettingsAction::List => {
            for (key, value) in db.settings()? {
                println!("{key} = {value}");
            }
        }
        SettingsAction::Delete { key } => {
            if !db.delete_setting(&key)? {
                return Err(format!("setting not found: {key}").into());
            }
            println!("ok");
        }
        SettingsAction::Name { name: Some(name) } => {
            db.save_user_name(&name)?;
            println!("{name}");
        }
        SettingsAction::Name { name: None } => println!("{}", db.user_name()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_value_keeps_json_types() {
        assert_eq!(parse_value("42"), Value::from(42));
        assert_eq!(parse_value("true"), Value::Bool(true));
        assert_eq!(parse_value("Salsa"), Value::String("Salsa".into()));
        assert_eq!(parse_value("\"quoted\""), Value::String("quoted".into()));
    }
}
