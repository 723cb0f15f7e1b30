//! CLI smoke and demo entry point.
//!
//! # Responsibility
//! - Without arguments: print core linkage info.
//! - With a database path: seed one parent with one child, rename the
//!   child through `UpdateService`, and print what the orchestrating session
//!   returned next to what the cache holds.

use parentcache_core::{
    core_version, ping, MaterializedCache, SessionFactory, StoreConfig, UpdateService,
};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    println!("parentcache_core ping={}", ping());
    println!("parentcache_core version={}", core_version());

    let Some(db_path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };

    match run_demo(&db_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("demo failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_demo(db_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let sessions = SessionFactory::new(StoreConfig::new(db_path));
    let cache = Arc::new(MaterializedCache::new(sessions.clone()));
    let service = UpdateService::new(sessions, Arc::clone(&cache));

    let seeded = service.create_parent("P", &["old"])?;
    let Some(child) = seeded.children.first() else {
        return Err("seeded parent has no child".into());
    };

    let returned = service.update_and_refresh(child.id, "new")?;
    println!("returned={}", serde_json::to_string(&returned)?);
    println!("returned_materialized={}", returned.is_materialized());

    match cache.get(returned.id()) {
        Some(snapshot) => println!("cached={}", serde_json::to_string(snapshot.as_ref())?),
        None => println!("cached=absent"),
    }
    Ok(())
}
