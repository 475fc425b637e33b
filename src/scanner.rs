//! Directory scanner and pipeline orchestrator.
//!
//! One pass walks the watched root, classifies candidate artifacts by the
//! configured layout patterns, and drives each through change detection,
//! parsing, normalization, tagging and storage. Artifacts are independent,
//! so a pass fans them out to a bounded pool of blocking workers; one
//! artifact failing is logged and the rest of the pass continues.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::PipelineError;
use crate::fingerprint::{self, ChangeStatus};
use crate::normalize::{self, Normalized};
use crate::parser::{self, Artifact, ArtifactKind};
use crate::store::{NewFingerprint, SessionStore};
use crate::tagger;

/// Where a scan pass currently is. Transitions are sequential per
/// artifact; with parallel workers the tracked value is the most recent
/// transition, which is enough for status display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassState {
    Idle,
    Scanning,
    Processing(PathBuf),
    Committing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactOutcome {
    /// Fingerprint matched; nothing touched the store.
    Unchanged,
    /// Artifact was (re)processed and committed.
    Imported,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PassSummary {
    pub imported: usize,
    pub unchanged: usize,
    pub errors: usize,
}

pub struct Scanner {
    config: Config,
    store: Arc<SessionStore>,
    matchers: Vec<(ArtifactKind, glob::Pattern)>,
    state: Mutex<PassState>,
}

impl Scanner {
    /// Build a scanner, validating the configuration up front: a missing
    /// root or an unparsable layout pattern refuses to run rather than
    /// silently scanning nothing.
    pub fn new(config: Config, store: Arc<SessionStore>) -> Result<Self, PipelineError> {
        let root = config.root_path();
        if !root.is_dir() {
            return Err(PipelineError::Config(format!(
                "log root {} is not a readable directory",
                root.display()
            )));
        }

        // Most specific pattern first: the history file would otherwise
        // also match a loose "**/*.jsonl" transcript pattern.
        let patterns = [
            (ArtifactKind::PromptHistory, &config.layout.history),
            (ArtifactKind::Transcript, &config.layout.transcripts),
            (ArtifactKind::Plan, &config.layout.plans),
            (ArtifactKind::TodoList, &config.layout.todos),
        ];
        let mut matchers = Vec::with_capacity(patterns.len());
        for (kind, raw) in patterns {
            let pattern = glob::Pattern::new(raw).map_err(|err| {
                PipelineError::Config(format!("bad {} pattern {raw:?}: {err}", kind.as_str()))
            })?;
            matchers.push((kind, pattern));
        }

        Ok(Self {
            config,
            store,
            matchers,
            state: Mutex::new(PassState::Idle),
        })
    }

    pub fn state(&self) -> PassState {
        self.state.lock().expect("state lock poisoned").clone()
    }

    fn set_state(&self, state: PassState) {
        *self.state.lock().expect("state lock poisoned") = state;
    }

    /// Enumerate candidate artifacts under the root.
    pub fn discover(&self) -> Vec<Artifact> {
        let root = self.config.root_path();
        let mut artifacts = vec![];

        for entry in WalkDir::new(&root)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&root) else {
                continue;
            };
            for (kind, pattern) in &self.matchers {
                if pattern.matches_path(rel) {
                    artifacts.push(Artifact::new(*kind, entry.path().to_path_buf()));
                    break;
                }
            }
        }

        artifacts
    }

    /// Run one full scan pass with bounded parallelism across artifacts.
    pub async fn run_pass(self: Arc<Self>) -> PassSummary {
        self.set_state(PassState::Scanning);
        let artifacts = self.discover();
        debug!(count = artifacts.len(), "enumerated artifacts");

        let semaphore = Arc::new(Semaphore::new(self.config.scan.workers.max(1)));
        let mut tasks = JoinSet::new();
        for artifact in artifacts {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .expect("semaphore closed");
            let scanner = Arc::clone(&self);
            tasks.spawn_blocking(move || {
                let outcome = scanner.process_artifact(&artifact);
                drop(permit);
                (artifact, outcome)
            });
        }

        let mut summary = PassSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(ArtifactOutcome::Unchanged))) => summary.unchanged += 1,
                Ok((_, Ok(ArtifactOutcome::Imported))) => summary.imported += 1,
                Ok((artifact, Err(err))) => {
                    summary.errors += 1;
                    error!(
                        path = %artifact.path.display(),
                        %err,
                        "artifact failed, will retry next pass"
                    );
                }
                Err(join_err) => {
                    summary.errors += 1;
                    error!(%join_err, "artifact worker panicked");
                }
            }
        }

        self.set_state(PassState::Idle);
        summary
    }

    /// Long-lived worker loop: one pass per interval tick.
    pub async fn watch(self: Arc<Self>) -> Result<(), PipelineError> {
        let interval_secs = self.config.scan.interval_secs.max(1);
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            root = %self.config.root_path().display(),
            interval_secs,
            "watching for session artifacts"
        );

        loop {
            ticker.tick().await;
            let summary = Arc::clone(&self).run_pass().await;
            info!(
                imported = summary.imported,
                unchanged = summary.unchanged,
                errors = summary.errors,
                "scan pass complete"
            );
        }
    }

    /// Drive one artifact through the pipeline. The fingerprint is written
    /// in the same transaction as the import, so a crash anywhere in here
    /// leaves the artifact eligible for retry.
    pub fn process_artifact(
        &self,
        artifact: &Artifact,
    ) -> Result<ArtifactOutcome, PipelineError> {
        self.set_state(PassState::Processing(artifact.path.clone()));

        let bytes = std::fs::read(&artifact.path).map_err(|source| PipelineError::Artifact {
            path: artifact.path.clone(),
            source,
        })?;
        let path_key = artifact.path.to_string_lossy().into_owned();

        let previous = self.store.fingerprint(&path_key)?;
        let status =
            fingerprint::classify(&bytes, previous.as_ref(), artifact.kind.is_append_only());
        if status == ChangeStatus::Unchanged {
            debug!(path = %artifact.path.display(), "fingerprint unchanged, skipping");
            return Ok(ArtifactOutcome::Unchanged);
        }

        let digest = fingerprint::digest_bytes(&bytes);
        let fp = NewFingerprint {
            path: &path_key,
            digest: &digest,
            byte_len: bytes.len() as u64,
        };

        // For an intact append-only prefix only the tail needs parsing.
        let slice: &[u8] = match status {
            ChangeStatus::Appended { offset } => {
                debug!(path = %artifact.path.display(), offset, "append detected, parsing tail");
                &bytes[offset as usize..]
            }
            _ => &bytes,
        };

        let outcomes = parser::parse(artifact.kind, slice);
        let mtime = std::fs::metadata(&artifact.path)
            .ok()
            .and_then(|meta| meta.modified().ok())
            .map(DateTime::<Utc>::from);
        let normalized = normalize::normalize(artifact, outcomes, mtime);

        self.set_state(PassState::Committing);
        match normalized {
            Normalized::Session(draft) => {
                if draft.messages.is_empty() {
                    self.store.record_fingerprint(&fp)?;
                    debug!(path = %artifact.path.display(), "no messages, fingerprint only");
                    return Ok(ArtifactOutcome::Imported);
                }
                let tags = tagger::tags_for(&draft, &self.config.tags);
                let inserted = self.store.upsert_session(&draft, &tags, Some(&fp))?;
                info!(
                    session = %draft.id,
                    messages = draft.messages.len(),
                    inserted,
                    tokens_in = draft.total_tokens_in,
                    tokens_out = draft.total_tokens_out,
                    "imported session"
                );
            }
            Normalized::Prompts(prompts) => {
                let imported = self.store.append_prompts(&prompts, &fp)?;
                if imported > 0 {
                    info!(imported, "imported prompt history entries");
                }
            }
            Normalized::Todos { session_id, items } => {
                let imported = self.store.replace_todos(&session_id, &items, &fp)?;
                debug!(session = %session_id, imported, "imported todos");
            }
            Normalized::Plan(plan) => {
                if plan.content.is_empty() {
                    self.store.record_fingerprint(&fp)?;
                    return Ok(ArtifactOutcome::Imported);
                }
                self.store.upsert_plan(&plan, &fp)?;
                debug!(plan = %plan.name, "imported plan");
            }
        }

        Ok(ArtifactOutcome::Imported)
    }
}
