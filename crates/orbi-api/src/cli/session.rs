//! `orbi sessions list <user_id>`: tabular view of a user's sessions.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use orbi_core::chat::repository::MessageStore;

use crate::state::AppState;

pub async fn list_sessions(state: &AppState, user_id: i64, json: bool) -> Result<()> {
    let sessions = state.store.list_sessions_for_user(user_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!();
        println!(
            "  {} No sessions found for user {}.",
            style("i").blue().bold(),
            style(user_id).cyan()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Preview").fg(Color::White),
        Cell::new("Started").fg(Color::White),
        Cell::new("Last activity").fg(Color::White),
        Cell::new("Status").fg(Color::White),
    ]);

    for session in &sessions {
        let preview = session.preview_text.as_deref().unwrap_or("(empty)");
        let status = if session.is_active {
            Cell::new("active").fg(Color::Green)
        } else {
            Cell::new("closed").fg(Color::DarkGrey)
        };

        table.add_row(vec![
            Cell::new(session.id).fg(Color::White),
            Cell::new(preview).fg(Color::Cyan),
            Cell::new(session.created_at.format("%Y-%m-%d %H:%M")).fg(Color::White),
            Cell::new(session.updated_at.format("%Y-%m-%d %H:%M")).fg(Color::DarkGrey),
            status,
        ]);
    }

    println!();
    println!("  Sessions for user {}", style(user_id).cyan().bold());
    println!();
    println!("{table}");
    println!();
    println!(
        "  {} session{}",
        style(sessions.len()).bold(),
        if sessions.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}
