//! Sessions command implementation

use anyhow::Result;

use crate::store::{ActivityStore, SessionFilter};
use crate::timestamps;

pub fn run(store: &ActivityStore, limit: usize, pending_max_age_days: i64) -> Result<()> {
    let sessions = store.list_sessions(&SessionFilter {
        limit,
        pending_max_age_days,
        ..SessionFilter::default()
    })?;

    if sessions.is_empty() {
        println!("No sessions found. Run 'activity-log scan' first.");
        return Ok(());
    }

    println!(
        "{:<12} {:<10} {:<16} {:<12} {:>5}  {}",
        "Started", "ID", "Project", "Source", "Msgs", "Waiting on"
    );
    println!("{}", "-".repeat(80));

    for session in sessions {
        // Local time for display
        let started = session
            .started_at
            .map(|ts| timestamps::utc_to_local(ts).format("%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());

        let project = session.project_name.as_deref().unwrap_or("-");

        let waiting = match (&session.pending, session.active_pending) {
            (Some(p), true) => match p.question.as_deref() {
                Some(q) => format!("⏳ {}", truncate(q, 40)),
                None => format!("⏳ {}", p.tool_name),
            },
            _ => String::new(),
        };

        println!(
            "{:<12} {:<10} {:<16} {:<12} {:>5}  {}",
            started,
            truncate(&session.session_id, 8),
            truncate(project, 16),
            session.source,
            session.message_count,
            waiting,
        );
    }

    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or(text);
    if line.chars().count() > max {
        let cut: String = line.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}
