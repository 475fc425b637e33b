//! Search command implementation

use anyhow::Result;

use crate::store::SessionStore;

pub fn run(store: &SessionStore, query: &str, prompts: bool) -> Result<()> {
    if prompts {
        let hits = store.search_prompts(query, 20)?;
        if hits.is_empty() {
            println!("No prompts match '{}'.", query);
            return Ok(());
        }
        for hit in hits {
            println!(
                "{:<20} {:<24} {}",
                hit.timestamp.as_deref().unwrap_or("-"),
                hit.project_path.as_deref().unwrap_or("-"),
                hit.snippet
            );
        }
        return Ok(());
    }

    let hits = store.search_messages(query, 20)?;
    if hits.is_empty() {
        println!("No messages match '{}'.", query);
        return Ok(());
    }

    for hit in hits {
        println!("{:<14} #{:<4} {}", hit.session_id, hit.sequence, hit.snippet);
    }

    Ok(())
}
