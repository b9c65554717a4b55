use super::{open_store, EXIT_SUCCESS};

pub fn run(store: &str) -> Result<u8, String> {
    let db = open_store(store)?;
    db.flush_config().map_err(|e| format!("store error: {e}"))?;
    println!("users, policies and service records flushed");
    Ok(EXIT_SUCCESS)
}
