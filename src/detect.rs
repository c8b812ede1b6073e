//! # Change Detector
//!
//! Compares freshly fetched content against the stored snapshot and decides
//! whether a change is material and how severe it is.
//!
//! Pure logic, no I/O:
//! - fingerprint equality is the cheap fast path (no diff),
//! - first-ever check never emits a change (the fetch becomes the baseline),
//! - otherwise a line-level diff produces the human-readable delta and a
//!   deterministic severity per the configured [`SeverityRules`].

use once_cell::sync::OnceCell;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::DetectorError;
use crate::fetch::FetchedPage;
use crate::model::{Severity, Snapshot};
use crate::rules::SeverityRules;

/// Detail output is capped so a full page rewrite doesn't flood the digest.
const MAX_DETAIL_LINES: usize = 60;
const MAX_DETAIL_CHARS: usize = 4000;

/// Similarity at or above which a removed/added line pair is reported as a
/// modification rather than two independent edits.
const PAIRING_SIMILARITY: f64 = 0.5;

/// Outcome of comparing a fetched page against the stored snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    NoChange,
    Changed {
        summary: String,
        details: String,
        severity: Severity,
    },
}

/// Normalize an HTML (or plain text) body into diffable text: one line per
/// text block, entities decoded, whitespace collapsed.
pub fn normalize_page(s: &str) -> String {
    // 1) Drop script/style blocks wholesale
    static RE_SKIP: OnceCell<Regex> = OnceCell::new();
    let re_skip = RE_SKIP.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)[^>]*>.*?</\s*(script|style)\s*>").unwrap()
    });
    let mut out = re_skip.replace_all(s, "\n").to_string();

    // 2) Tags become line breaks so block structure survives stripping
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "\n").to_string();

    // 3) HTML entity decode
    out = html_escape::decode_html_entities(&out).to_string();

    // 4) Normalize typographic quotes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 5) Per line: collapse inner whitespace, trim, drop empties
    out.lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// SHA-256 hex fingerprint of normalized content.
pub fn fingerprint(content: &str) -> String {
    let mut h = Sha256::new();
    h.update(content.as_bytes());
    format!("{:x}", h.finalize())
}

/// Line-level delta between two normalized contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineDiff {
    /// `(old, new)` pairs judged to be modifications of the same line.
    pub modified: Vec<(String, String)>,
    pub removed: Vec<String>,
    pub added: Vec<String>,
    pub old_total: usize,
    pub new_total: usize,
}

impl LineDiff {
    pub fn changed_lines(&self) -> usize {
        self.modified.len() + self.removed.len() + self.added.len()
    }

    pub fn changed_fraction(&self) -> f32 {
        let base = self.old_total.max(self.new_total).max(1);
        self.changed_lines() as f32 / base as f32
    }
}

/// Multiset line diff: lines present in only one side are removed/added;
/// similar removed/added lines are paired up as modifications.
pub fn diff_lines(old: &str, new: &str) -> LineDiff {
    use std::collections::HashMap;

    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();

    let mut new_counts: HashMap<&str, usize> = HashMap::new();
    for l in &new_lines {
        *new_counts.entry(*l).or_default() += 1;
    }
    let mut old_counts: HashMap<&str, usize> = HashMap::new();
    for l in &old_lines {
        *old_counts.entry(*l).or_default() += 1;
    }

    let mut removed: Vec<String> = Vec::new();
    for l in &old_lines {
        match new_counts.get_mut(*l) {
            Some(c) if *c > 0 => *c -= 1,
            _ => removed.push((*l).to_string()),
        }
    }
    let mut added: Vec<String> = Vec::new();
    for l in &new_lines {
        match old_counts.get_mut(*l) {
            Some(c) if *c > 0 => *c -= 1,
            _ => added.push((*l).to_string()),
        }
    }

    // Greedy pairing: each removed line takes its most similar added line,
    // if the similarity clears the bar.
    let mut modified: Vec<(String, String)> = Vec::new();
    let mut leftover_removed: Vec<String> = Vec::new();
    let mut used = vec![false; added.len()];
    for r in removed {
        let mut best: Option<(usize, f64)> = None;
        for (i, a) in added.iter().enumerate() {
            if used[i] {
                continue;
            }
            let sim = strsim::normalized_levenshtein(&r, a);
            if sim >= PAIRING_SIMILARITY && best.map_or(true, |(_, b)| sim > b) {
                best = Some((i, sim));
            }
        }
        match best {
            Some((i, _)) => {
                used[i] = true;
                modified.push((r, added[i].clone()));
            }
            None => leftover_removed.push(r),
        }
    }
    let added: Vec<String> = added
        .into_iter()
        .zip(used)
        .filter(|(_, u)| !u)
        .map(|(a, _)| a)
        .collect();

    LineDiff {
        modified,
        removed: leftover_removed,
        added,
        old_total: old_lines.len(),
        new_total: new_lines.len(),
    }
}

fn render_details(diff: &LineDiff) -> String {
    let mut lines: Vec<String> = Vec::new();
    for (o, n) in &diff.modified {
        lines.push(format!("- {o}"));
        lines.push(format!("+ {n}"));
    }
    for r in &diff.removed {
        lines.push(format!("- {r}"));
    }
    for a in &diff.added {
        lines.push(format!("+ {a}"));
    }

    let total = lines.len();
    if total > MAX_DETAIL_LINES {
        lines.truncate(MAX_DETAIL_LINES);
        lines.push(format!("... ({} more lines)", total - MAX_DETAIL_LINES));
    }
    let mut out = lines.join("\n");
    if out.chars().count() > MAX_DETAIL_CHARS {
        out = out.chars().take(MAX_DETAIL_CHARS).collect();
        out.push_str("\n... (truncated)");
    }
    out
}

/// Text the keyword rules look at: everything that is new or rewritten.
fn incoming_text(diff: &LineDiff) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for (_, n) in &diff.modified {
        parts.push(n);
    }
    for a in &diff.added {
        parts.push(a);
    }
    parts.join("\n")
}

fn classify(diff: &LineDiff, keywords: &[String], rules: &SeverityRules) -> Severity {
    if !keywords.is_empty() {
        return Severity::High;
    }
    if diff.changed_lines() >= rules.medium_line_threshold
        || diff.changed_fraction() >= rules.medium_changed_fraction
    {
        return Severity::Medium;
    }
    Severity::Low
}

/// Compare the stored snapshot against a freshly fetched page.
///
/// `prev = None` is the first-ever check: the caller stores the page as the
/// baseline and no change is reported.
pub fn detect(
    prev: Option<&Snapshot>,
    page: &FetchedPage,
    rules: &SeverityRules,
) -> Result<Detection, DetectorError> {
    let Some(prev) = prev else {
        return Ok(Detection::NoChange);
    };

    // Fast path: identical fingerprints, no diff needed.
    if prev.fingerprint == page.fingerprint {
        return Ok(Detection::NoChange);
    }

    if prev.content.is_empty() {
        return Err(DetectorError::UnreadableContent);
    }

    let diff = diff_lines(&prev.content, &page.content);
    if diff.changed_lines() == 0 {
        // Fingerprint moved but line multiset is identical: reordering only.
        return Ok(Detection::Changed {
            summary: "content reordered".to_string(),
            details: String::new(),
            severity: Severity::Low,
        });
    }

    let keywords = rules.matched_keywords(&incoming_text(&diff));
    let severity = classify(&diff, &keywords, rules);

    let summary = if keywords.is_empty() {
        format!("{} line(s) changed", diff.changed_lines())
    } else {
        format!(
            "{} line(s) changed; keywords: {}",
            diff.changed_lines(),
            keywords.join(", ")
        )
    };

    Ok(Detection::Changed {
        summary,
        details: render_details(&diff),
        severity,
    })
}
