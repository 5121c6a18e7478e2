//! Cull command - drop old versions of a chart

use chrono::Utc;
use console::style;

use chartkeeper_core::Paths;
use chartkeeper_repo::maintain;

use crate::error::Result;

pub fn run(paths: &Paths, chart: &str, days: u32) -> Result<()> {
    let culled = maintain::cull(paths, chart, days, Utc::now())?;
    if culled.is_empty() {
        println!("{} No versions of {} older than {} days", style("→").blue(), chart, days);
        return Ok(());
    }
    for entry in &culled {
        println!("{} Removed {} {}", style("✓").green(), chart, entry.version());
    }
    Ok(())
}
