//! The engine's single output type: one prioritized finding per feature.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Feature tags as handed to the engine. Keys are unique, order is not
/// significant; a sorted map keeps serialized output stable.
pub type Tags = BTreeMap<String, String>;

/// A partial tag state. `None` means "tag absent", which matters both for
/// staleness prerequisites and for proposed edits that add or remove tags.
pub type TagState = BTreeMap<String, Option<String>>;

/// One suggested edit: the tags as they must currently be, and the tags as
/// they should become.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDelta {
    pub from: TagState,
    pub to: TagState,
}

/// Immutable result record for one audited feature. Holds only resolved
/// values, never live gateway handles, so it can be serialized and stored
/// long after the engine that produced it is gone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Stable classification tag, e.g. "malformed wikidata tag".
    pub problem_id: String,
    pub message: String,
    /// Tag values that were true when the finding was raised. A fixer
    /// must re-check these before applying any proposed change.
    #[serde(default)]
    pub prerequisite: TagState,
    /// Replacement article reference, serialized as `language:title`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desired_wikipedia_target: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proposed_tagging_changes: Vec<TagDelta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_log: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<String>,
}

impl Finding {
    pub fn new(problem_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            problem_id: problem_id.into(),
            message: message.into(),
            prerequisite: TagState::new(),
            desired_wikipedia_target: None,
            proposed_tagging_changes: Vec::new(),
            debug_log: None,
            extra_data: None,
        }
    }

    pub fn with_prerequisite(mut self, key: &str, value: Option<&str>) -> Self {
        self.prerequisite
            .insert(key.to_string(), value.map(ToString::to_string));
        self
    }

    pub fn with_desired_target(mut self, target: Option<String>) -> Self {
        self.desired_wikipedia_target = target;
        self
    }

    pub fn with_proposed_change(mut self, delta: TagDelta) -> Self {
        self.proposed_tagging_changes.push(delta);
        self
    }

    pub fn with_extra_data(mut self, extra: impl Into<String>) -> Self {
        self.extra_data = Some(extra.into());
        self
    }

    pub fn with_debug_log(mut self, log: Option<String>) -> Self {
        self.debug_log = log;
        self
    }

    /// Append this finding to a YAML report file as a one-element list,
    /// so consecutive runs build up a single valid YAML document stream.
    pub fn append_yaml(&self, filepath: &Path) -> Result<()> {
        let rendered = serde_yaml::to_string(&[self])
            .context("failed to serialize finding to YAML")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(filepath)
            .with_context(|| format!("failed to open {}", filepath.display()))?;
        file.write_all(rendered.as_bytes())
            .with_context(|| format!("failed to write {}", filepath.display()))?;
        Ok(())
    }
}

/// Build a one-key tag state.
pub fn tag_state(key: &str, value: Option<&str>) -> TagState {
    let mut state = TagState::new();
    state.insert(key.to_string(), value.map(ToString::to_string));
    state
}

/// Apply a proposed delta to a tag set, for callers that act on findings.
/// Keys mapped to `None` on the `to` side are removed.
pub fn apply_delta(tags: &Tags, delta: &TagDelta) -> Tags {
    let mut updated = tags.clone();
    for key in delta.from.keys() {
        if !delta.to.contains_key(key) {
            updated.remove(key);
        }
    }
    for (key, value) in &delta.to {
        match value {
            Some(value) => {
                updated.insert(key.clone(), value.clone());
            }
            None => {
                updated.remove(key);
            }
        }
    }
    updated
}
