//! Keyword-based session tagging.
//!
//! The recognized tags come from configuration as a `{label: [keywords]}`
//! map; a tag fires when any of its keywords appears in the session's
//! concatenated message content. Tool usage contributes `tool:{name}`
//! tags. All tags produced here are auto-generated; manually assigned
//! tags live only in the store and are never touched by a reimport.

use std::collections::{BTreeMap, BTreeSet};

use crate::normalize::SessionDraft;

pub fn tags_for(
    draft: &SessionDraft,
    keyword_map: &BTreeMap<String, Vec<String>>,
) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();

    let content = draft
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    for (label, keywords) in keyword_map {
        if keywords
            .iter()
            .any(|keyword| content.contains(&keyword.to_lowercase()))
        {
            tags.insert(label.clone());
        }
    }

    for message in &draft.messages {
        for call in &message.tool_calls {
            tags.insert(format!("tool:{}", call.name));
        }
    }

    tags
}
