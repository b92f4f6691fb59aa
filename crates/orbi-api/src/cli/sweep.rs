//! `orbi sweep`: run one retention pass.

use anyhow::Result;
use console::style;

use crate::state::AppState;

pub async fn sweep(state: &AppState, json: bool) -> Result<()> {
    let removed = state.sweeper().sweep_once().await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "removed": removed,
                "retention_days": state.config.retention_days,
            })
        );
    } else {
        println!();
        println!(
            "  {} Removed {} message bod{} older than {} days",
            style("✓").green().bold(),
            style(removed).bold(),
            if removed == 1 { "y" } else { "ies" },
            state.config.retention_days
        );
        println!();
    }

    Ok(())
}
