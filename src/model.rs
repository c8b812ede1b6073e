//! model.rs — shared data model for sources, snapshots, changes and cycles.
//!
//! Everything here is plain data: serde-serializable, no I/O. The monitor
//! orchestrator is the only writer of `Source.status` / `last_checked` /
//! `last_snapshot`; admin handlers only create and delete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Lifecycle status of a monitored source, as shown to the admin UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceStatus {
    Unknown,
    UpToDate,
    ChangesFound,
    FetchError,
}

/// Last-observed content for a source; the diff baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// SHA-256 hex of the normalized content.
    pub fingerprint: String,
    /// Normalized text content (one line per text block).
    pub content: String,
    pub taken_at: DateTime<Utc>,
}

/// A configured external location to be periodically checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub name: String,
    pub url: String,
    pub category: String,
    pub status: SourceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_snapshot: Option<Snapshot>,
}

/// How significant a detected change is; drives digest ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    /// Sort key: lower ranks first in notifications.
    pub fn rank(self) -> u8 {
        match self {
            Severity::High => 0,
            Severity::Medium => 1,
            Severity::Low => 2,
        }
    }
}

/// Durable record of one detected material change of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: String,
    /// Reference, not ownership: the source may be deleted independently.
    pub source_id: String,
    pub source_name: String,
    pub url: String,
    pub categories: Vec<String>,
    pub summary: String,
    pub details: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub reviewed: bool,
}

impl ChangeRecord {
    /// Dedup fingerprint over `(source, summary, details, day bucket)`.
    ///
    /// Two records of the same underlying change hash identically within a
    /// UTC calendar day, which is what lets the change store reject the
    /// second submission.
    pub fn dedup_fingerprint(&self) -> String {
        let mut h = Sha256::new();
        h.update(self.source_id.as_bytes());
        h.update(b"\n");
        h.update(self.summary.as_bytes());
        h.update(b"\n");
        h.update(self.details.as_bytes());
        h.update(b"\n");
        h.update(self.timestamp.date_naive().to_string().as_bytes());
        format!("{:x}", h.finalize())
    }
}

/// Registered notification recipient. Membership-only, no ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRecipient {
    pub id: String,
    pub email: String,
}

/// Terminal state of one source within one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckOutcome {
    Unchanged,
    Changed,
    FetchError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub source_id: String,
    pub name: String,
    pub outcome: CheckOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What happened to the digest for one cycle. A `Failed` outcome is a
/// warning attached to an otherwise-successful cycle, never a cycle failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum NotifyOutcome {
    Skipped,
    Sent { recipients: usize },
    Failed { reason: String },
}

/// Transient result of one orchestration pass. Not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorCycleResult {
    pub started_at: DateTime<Utc>,
    pub sources: Vec<SourceOutcome>,
    pub changes: Vec<ChangeRecord>,
    pub notification: NotifyOutcome,
}
