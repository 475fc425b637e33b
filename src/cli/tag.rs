//! Tag command implementation

use anyhow::Result;

use crate::store::SessionStore;

/// Assign a manual tag. Manual tags are never removed by reimports.
pub fn run(store: &SessionStore, session_id: &str, label: &str) -> Result<()> {
    let session = match store.get_session(session_id)? {
        Some(s) => s,
        None => {
            println!("Session '{}' not found.", session_id);
            return Ok(());
        }
    };

    store.add_tag(&session.id, label, false)?;
    println!("Tagged {} with '{}'", session.id, label);

    Ok(())
}
