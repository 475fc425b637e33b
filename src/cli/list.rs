//! List command implementation

use anyhow::Result;

use crate::store::SessionStore;

pub fn run(store: &SessionStore, project: Option<&str>) -> Result<()> {
    let sessions = store.list_sessions(project)?;

    if sessions.is_empty() {
        println!("No sessions found. Run 'logbook scan' first.");
        return Ok(());
    }

    println!(
        "{:<12} {:<14} {:<20} {:<18} {:>5} {:>14}",
        "Started", "Session", "Project", "Model", "Msgs", "Tokens in/out"
    );
    println!("{}", "-".repeat(90));

    for session in sessions {
        let started = session
            .started_at
            .as_ref()
            .map(|ts| {
                if ts.len() >= 16 {
                    format!("{} {}", &ts[5..10], &ts[11..16])
                } else {
                    ts.clone()
                }
            })
            .unwrap_or_else(|| "-".to_string());

        let project = session
            .project_path
            .as_deref()
            .map(|p| {
                let name = p.rsplit('/').next().unwrap_or(p);
                truncate(name, 20)
            })
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<12} {:<14} {:<20} {:<18} {:>5} {:>14}",
            started,
            truncate(&session.id, 14),
            project,
            truncate(session.model.as_deref().unwrap_or("-"), 18),
            session.total_messages,
            format!("{}/{}", session.total_tokens_in, session.total_tokens_out),
        );
    }

    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() > max {
        format!("{}...", &text[..max.saturating_sub(3)])
    } else {
        text.to_string()
    }
}
