//! Read command implementation

use anyhow::Result;

use crate::store::SessionStore;

pub fn run(store: &SessionStore, session_id: &str, tools: bool) -> Result<()> {
    let session = match store.get_session(session_id)? {
        Some(s) => s,
        None => {
            println!("Session '{}' not found.", session_id);
            return Ok(());
        }
    };

    println!("\n{}", "=".repeat(80));
    println!("Session: {}", session.id);
    if let Some(project) = &session.project_path {
        println!("Project: {}", project);
    }
    if let Some(model) = &session.model {
        println!("Model: {}", model);
    }
    println!(
        "Messages: {} | Tokens: {} in / {} out",
        session.total_messages, session.total_tokens_in, session.total_tokens_out
    );

    let tags = store.get_tags(&session.id)?;
    if !tags.is_empty() {
        let labels: Vec<String> = tags
            .iter()
            .map(|t| {
                if t.auto_generated {
                    t.tag.clone()
                } else {
                    format!("{}*", t.tag)
                }
            })
            .collect();
        println!("Tags: {}", labels.join(", "));
    }
    println!("{}", "=".repeat(80));

    let messages = store.get_messages(&session.id)?;
    if messages.is_empty() {
        println!("\nNo messages found (this may be an empty session).");
        return Ok(());
    }

    let tool_calls = if tools {
        store.get_tool_calls(&session.id)?
    } else {
        vec![]
    };

    for msg in messages {
        println!(
            "\n[{} {}] ({})",
            msg.sequence,
            msg.role.to_uppercase(),
            msg.timestamp.as_deref().unwrap_or("?")
        );
        if let Some(content) = &msg.content {
            println!("{}", content);
        }

        if tools {
            for call in tool_calls
                .iter()
                .filter(|c| c.message_sequence == msg.sequence)
            {
                let status = if call.success { "ok" } else { "failed" };
                println!(
                    "  -> {} [{}] {}",
                    call.tool_name,
                    status,
                    call.tool_input.as_deref().unwrap_or("{}")
                );
            }
        }

        println!("{}", "-".repeat(40));
    }

    let todos = store.get_todos(&session.id)?;
    if !todos.is_empty() {
        println!("\nTodos:");
        for todo in todos {
            println!(
                "  [{}] {}",
                todo.status.as_deref().unwrap_or("unknown"),
                todo.content.as_deref().unwrap_or("")
            );
        }
    }

    Ok(())
}
