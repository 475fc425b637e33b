//! Content fingerprints for change detection.
//!
//! Artifacts are fingerprinted over their full byte content; the stored
//! digest gates reprocessing. For append-only formats the previous digest
//! doubles as a prefix check: if the first `byte_len` bytes still hash to
//! it, only the tail needs parsing.

use sha2::{Digest, Sha256};

pub fn digest_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn digest_str(text: &str) -> String {
    digest_bytes(text.as_bytes())
}

/// Fingerprint state recorded after the last successful import of a path.
#[derive(Debug, Clone)]
pub struct StoredFingerprint {
    pub digest: String,
    pub byte_len: u64,
}

/// Decision for an artifact given its current bytes and previous state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeStatus {
    /// Bytes identical to last import; skip the artifact entirely.
    Unchanged,
    /// Append-only file grew and its prefix is intact; parse from `offset`.
    Appended { offset: u64 },
    /// New, rewritten, or truncated content; full reprocess.
    Changed,
}

pub fn classify(
    bytes: &[u8],
    previous: Option<&StoredFingerprint>,
    append_capable: bool,
) -> ChangeStatus {
    let Some(prev) = previous else {
        return ChangeStatus::Changed;
    };

    if digest_bytes(bytes) == prev.digest {
        return ChangeStatus::Unchanged;
    }

    if append_capable {
        let prefix_len = prev.byte_len as usize;
        // A shrunken or rewritten file fails the prefix check and falls
        // back to a full reparse. The prefix must also end at a line
        // boundary: a torn final line at the previous import would put the
        // tail mid-record, so that case rereads the whole file too.
        if bytes.len() > prefix_len
            && prefix_len > 0
            && bytes[prefix_len - 1] == b'\n'
            && digest_bytes(&bytes[..prefix_len]) == prev.digest
        {
            return ChangeStatus::Appended {
                offset: prev.byte_len,
            };
        }
    }

    ChangeStatus::Changed
}
