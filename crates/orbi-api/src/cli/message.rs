//! `orbi message show <hash>`: print one stored body.

use anyhow::{Result, bail};
use console::style;

use orbi_core::chat::repository::MessageStore;
use orbi_core::dispatch::ReplyFormatter;
use orbi_types::message::is_valid_hash;

use crate::state::AppState;

pub async fn show_message(state: &AppState, hash: &str, json: bool) -> Result<()> {
    if !is_valid_hash(hash) {
        bail!("'{hash}' is not a message hash (expected 8 hex characters)");
    }

    let Some(body) = state.store.get_body(hash).await? else {
        if json {
            println!("null");
        } else {
            println!();
            println!(
                "  {} Message '{}' not found (it may have expired).",
                style("i").blue().bold(),
                style(hash).yellow()
            );
            println!();
        }
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style(&body.hash).cyan().bold(),
        style(body.created_at.format("%Y-%m-%d %H:%M:%S UTC")).dim()
    );
    if !state.config.webapp_url.is_empty() {
        let link = ReplyFormatter::new(state.config.webapp_url.as_str(), "").message_url(&body.hash);
        println!("  {}", style(link).dim());
    }
    println!();
    for line in body.content.lines() {
        println!("  {line}");
    }
    println!();

    Ok(())
}
