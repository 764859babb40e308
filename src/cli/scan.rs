//! Scan command implementation

use anyhow::Result;
use std::sync::Arc;

use crate::config::Config;
use crate::store::ActivityStore;
use crate::watcher::Orchestrator;

/// One backfill pass over every enabled root, then exit.
pub fn run(store: Arc<ActivityStore>, config: &Config) -> Result<()> {
    let roots = config.watch_roots();
    if roots.is_empty() {
        println!("No sources enabled. Check your configuration.");
        return Ok(());
    }

    for root in &roots {
        if !root.projects_dir.is_dir() {
            println!("⏭  {} ({} not found)", root.vendor.as_str(), root.projects_dir.display());
        }
    }

    let orchestrator = Orchestrator::new(Arc::clone(&store), roots, config.watch_options());
    let files = orchestrator.scan();
    let stats = store.stats(None)?;

    println!(
        "\n✅ Scanned {} transcripts: {} sessions, {} messages, {} projects",
        files, stats.total_sessions, stats.total_messages, stats.total_projects
    );
    Ok(())
}
