use dancebud_core::storage::Database;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let stats = db.statistics();
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
