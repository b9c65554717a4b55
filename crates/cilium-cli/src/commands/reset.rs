use super::{open_store, EXIT_SUCCESS};

pub fn run(store: &str) -> Result<u8, String> {
    let db = open_store(store)?;
    db.clear().map_err(|e| format!("store error: {e}"))?;
    println!("store cleared");
    Ok(EXIT_SUCCESS)
}
