//! Engine configuration. Everything the pipeline needs is carried
//! explicitly here; there are no hidden globals.

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::languages::{countries_for_language, is_known_language_code};

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct AuditConfigFile {
    #[serde(default)]
    pub audit: AuditSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct AuditSection {
    pub expected_language_code: Option<String>,
    #[serde(default)]
    pub languages_ordered_by_preference: Vec<String>,
    #[serde(default)]
    pub allow_requesting_edits_outside_osm: bool,
    #[serde(default)]
    pub allow_false_positives: bool,
}

/// Validated per-run configuration of the audit engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditConfig {
    /// Bypass the gateway response cache.
    pub forced_refresh: bool,
    /// Language the wikipedia tag is expected to use, if any.
    pub expected_language_code: Option<String>,
    /// Languages to prefer, in order, when picking a replacement article.
    pub languages_ordered_by_preference: Vec<String>,
    /// Attach extra diagnostics to findings. Never changes which finding
    /// is returned.
    pub additional_debug: bool,
    /// Raise findings whose fix would be an edit outside the record store.
    pub allow_requesting_edits_outside_osm: bool,
    /// Raise speculative, false-positive-prone findings.
    pub allow_false_positives: bool,
}

impl AuditConfig {
    /// A config with an expected language the audit has no country mapping
    /// for cannot produce meaningful language findings; that is a setup
    /// mistake and fails here, never per record.
    pub fn validate(&self) -> Result<()> {
        if let Some(code) = &self.expected_language_code {
            if !is_known_language_code(code) {
                bail!("expected language code {code} is not a known wikipedia edition");
            }
            if countries_for_language(code).is_none() {
                bail!("expected language code {code} has no known country mapping");
            }
        }
        for code in &self.languages_ordered_by_preference {
            if !is_known_language_code(code) {
                bail!("preferred language code {code} is not a known wikipedia edition");
            }
        }
        Ok(())
    }
}

/// Load the `[audit]` section from a TOML file, then apply env overrides
/// (`WIKIAUDIT_EXPECTED_LANGUAGE`, `WIKIAUDIT_PREFERRED_LANGUAGES` as a
/// comma-separated list). A missing file yields the defaults.
pub fn load_config(config_path: &Path) -> Result<AuditConfig> {
    let section = if config_path.exists() {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let parsed: AuditConfigFile = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;
        parsed.audit
    } else {
        AuditSection::default()
    };

    let expected_language_code =
        env_override("WIKIAUDIT_EXPECTED_LANGUAGE").or(section.expected_language_code);
    let languages_ordered_by_preference = match env_override("WIKIAUDIT_PREFERRED_LANGUAGES") {
        Some(value) => value
            .split(',')
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty())
            .collect(),
        None => section.languages_ordered_by_preference,
    };

    let config = AuditConfig {
        forced_refresh: false,
        expected_language_code,
        languages_ordered_by_preference,
        additional_debug: false,
        allow_requesting_edits_outside_osm: section.allow_requesting_edits_outside_osm,
        allow_false_positives: section.allow_false_positives,
    };
    config.validate()?;
    Ok(config)
}

fn env_override(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
