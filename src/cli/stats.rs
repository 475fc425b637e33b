//! Stats command implementation

use anyhow::Result;

use crate::store::SessionStore;

pub fn run(store: &SessionStore) -> Result<()> {
    let stats = store.stats()?;

    println!("Sessions:      {}", stats.sessions);
    println!("Messages:      {}", stats.messages);
    println!("Tool calls:    {}", stats.tool_calls);
    println!("File changes:  {}", stats.file_changes);
    println!("Prompts:       {}", stats.prompts);
    println!("Plans:         {}", stats.plans);
    println!("Todos:         {}", stats.todos);
    println!("Tokens:        {} in / {} out", stats.tokens_in, stats.tokens_out);

    Ok(())
}
