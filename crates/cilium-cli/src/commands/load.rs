use super::{open_store, EXIT_FAILURE, EXIT_SUCCESS};
use cilium_core::{store_in_db, LoadedFile};
use console::style;
use std::path::PathBuf;

pub fn run(store: &str, paths: &[PathBuf], flush: bool) -> Result<u8, String> {
    let db = open_store(store)?;
    if flush {
        db.flush_config().map_err(|e| format!("store error: {e}"))?;
    }
    let mut code = EXIT_SUCCESS;
    for path in paths {
        match store_in_db(db.as_ref(), path) {
            Ok(loaded) => {
                for file in &loaded {
                    match file {
                        LoadedFile::Profile { owners, policies } => {
                            println!("{} {policies} policies of {owners} owners", style("loaded").green());
                        }
                        LoadedFile::Dns => println!("{} DNS config", style("loaded").green()),
                        LoadedFile::Haproxy => println!("{} HAProxy config", style("loaded").green()),
                    }
                }
            }
            Err(e) => {
                eprintln!("{} {}: {e}", style("failed").red(), path.display());
                code = EXIT_FAILURE;
            }
        }
    }
    Ok(code)
}
