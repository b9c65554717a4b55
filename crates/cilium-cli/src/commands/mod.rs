pub mod completions;
pub mod flush;
pub mod load;
pub mod man_pages;
pub mod reset;
pub mod resolve;

use cilium_store::Db;
use std::sync::Arc;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn open_store(spec: &str) -> Result<Arc<dyn Db>, String> {
    cilium_store::select_store(spec).map_err(|e| format!("store error: {e}"))
}
