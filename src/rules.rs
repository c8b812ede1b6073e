//! # Severity Rules
//!
//! Configurable, deterministic ruleset for classifying detected changes:
//!
//! - any high-priority keyword in the added/modified lines → `high`
//! - change magnitude above thresholds (line count or fraction) → `medium`
//! - everything else → `low`
//!
//! Loads from TOML or JSON (`SEVERITY_RULES_PATH`, then
//! `config/severity_rules.toml`, then `config/severity_rules.json`), with a
//! built-in seed so the service works with no config file at all.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_RULES_PATH: &str = "SEVERITY_RULES_PATH";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeverityRules {
    /// Keywords that make a change `high` regardless of magnitude.
    /// Matched case-insensitively against added and modified lines.
    #[serde(default = "default_high_keywords")]
    pub high_keywords: Vec<String>,
    /// Changed-line count at or above which a change is `medium`.
    #[serde(default = "default_medium_line_threshold")]
    pub medium_line_threshold: usize,
    /// Changed fraction of the page at or above which a change is `medium`.
    #[serde(default = "default_medium_changed_fraction")]
    pub medium_changed_fraction: f32,
}

fn default_high_keywords() -> Vec<String> {
    [
        "suspended",
        "suspension",
        "cancelled",
        "canceled",
        "prohibited",
        "banned",
        "emergency",
        "mandatory",
        "effective immediately",
        "no longer permitted",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_medium_line_threshold() -> usize {
    10
}

fn default_medium_changed_fraction() -> f32 {
    0.30
}

impl Default for SeverityRules {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl SeverityRules {
    /// Built-in seed used when no config file is present.
    pub fn default_seed() -> Self {
        Self {
            high_keywords: default_high_keywords(),
            medium_line_threshold: default_medium_line_threshold(),
            medium_changed_fraction: default_medium_changed_fraction(),
        }
    }

    /// Load rules from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading severity rules from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_rules(&content, ext.as_str())
    }

    /// Load rules using env var + fallbacks:
    /// 1) $SEVERITY_RULES_PATH
    /// 2) config/severity_rules.toml
    /// 3) config/severity_rules.json
    /// 4) built-in seed
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_RULES_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            } else {
                return Err(anyhow!("SEVERITY_RULES_PATH points to non-existent path"));
            }
        }
        let toml_p = PathBuf::from("config/severity_rules.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from("config/severity_rules.json");
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        Ok(Self::default_seed())
    }

    /// Which high-priority keywords appear in `text` (case-insensitive).
    pub fn matched_keywords(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        self.high_keywords
            .iter()
            .filter(|k| !k.is_empty() && lower.contains(&k.to_lowercase()))
            .cloned()
            .collect()
    }
}

fn parse_rules(s: &str, hint_ext: &str) -> Result<SeverityRules> {
    if hint_ext == "json" {
        if let Ok(v) = serde_json::from_str(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = toml::from_str(s) {
        return Ok(v);
    }
    if let Ok(v) = serde_json::from_str(s) {
        return Ok(v);
    }
    Err(anyhow!("unsupported severity rules format"))
}
