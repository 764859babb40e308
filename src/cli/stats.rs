//! Stats command implementation

use anyhow::Result;

use crate::store::ActivityStore;
use crate::timestamps;

pub fn run(store: &ActivityStore, pending_max_age_days: i64) -> Result<()> {
    let total = store.stats(None)?;
    let (today_start, _) = timestamps::today_utc_range();
    let today = store.stats(Some(today_start))?;
    let pending = store.pending_sessions(timestamps::utc_now(), pending_max_age_days)?;

    println!("{:<20} {:>8} {:>8}", "", "Total", "Today");
    println!("{}", "-".repeat(38));
    println!("{:<20} {:>8} {:>8}", "Sessions", total.total_sessions, today.total_sessions);
    println!("{:<20} {:>8} {:>8}", "Messages", total.total_messages, today.total_messages);
    println!("{:<20} {:>8}", "Projects", total.total_projects);
    println!("{:<20} {:>8}", "Awaiting input", pending.len());

    Ok(())
}
