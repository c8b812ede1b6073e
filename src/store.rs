//! store.rs — collaborator boundary for sources, changes and recipients.
//!
//! The pipeline only sees the traits; `MemoryStore` is the in-process
//! implementation behind them. Durability mechanics are the store's problem,
//! idempotent change submission is guaranteed here via dedup fingerprints.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::model::{ChangeRecord, EmailRecipient, Snapshot, Source, SourceStatus};

/// Result of an idempotent change submission. `Duplicate` is a no-op signal,
/// not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Inserted(ChangeRecord),
    Duplicate,
}

#[async_trait::async_trait]
pub trait SourceStore: Send + Sync {
    async fn list_sources(&self) -> Vec<Source>;
    async fn get_snapshot(&self, source_id: &str) -> Option<Snapshot>;
    /// Cycle write: status + last_checked, optionally replacing the
    /// snapshot. Returns false (and does nothing) when the source was
    /// deleted mid-cycle.
    async fn update_source(
        &self,
        id: &str,
        status: SourceStatus,
        last_checked: DateTime<Utc>,
        snapshot: Option<Snapshot>,
    ) -> bool;
}

#[async_trait::async_trait]
pub trait ChangeStore: Send + Sync {
    /// Insert unless a record with the same dedup fingerprint exists.
    async fn record_if_absent(&self, change: ChangeRecord) -> RecordOutcome;
    /// All changes, newest first.
    async fn list_changes(&self) -> Vec<ChangeRecord>;
}

#[async_trait::async_trait]
pub trait RecipientStore: Send + Sync {
    async fn list_recipients(&self) -> Vec<EmailRecipient>;
    async fn addresses(&self) -> Vec<String>;
}

/// In-memory store backing all three collaborator traits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sources: RwLock<Vec<Source>>,
    changes: RwLock<Vec<ChangeRecord>>,
    change_fingerprints: RwLock<HashSet<String>>,
    recipients: RwLock<Vec<EmailRecipient>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}-{n:06}")
    }

    // ---- admin CRUD (outside the pipeline traits) ----

    pub fn insert_source(&self, name: &str, url: &str, category: &str) -> Source {
        let source = Source {
            id: self.next_id("src"),
            name: name.to_string(),
            url: url.to_string(),
            category: category.to_string(),
            status: SourceStatus::Unknown,
            last_checked: None,
            last_snapshot: None,
        };
        self.sources
            .write()
            .expect("sources lock poisoned")
            .push(source.clone());
        source
    }

    pub fn delete_source(&self, id: &str) -> bool {
        let mut v = self.sources.write().expect("sources lock poisoned");
        let before = v.len();
        v.retain(|s| s.id != id);
        v.len() != before
    }

    pub fn insert_recipient(&self, email: &str) -> EmailRecipient {
        let r = EmailRecipient {
            id: self.next_id("rcpt"),
            email: email.to_string(),
        };
        self.recipients
            .write()
            .expect("recipients lock poisoned")
            .push(r.clone());
        r
    }

    pub fn delete_recipient(&self, id: &str) -> bool {
        let mut v = self.recipients.write().expect("recipients lock poisoned");
        let before = v.len();
        v.retain(|r| r.id != id);
        v.len() != before
    }
}

#[async_trait::async_trait]
impl SourceStore for MemoryStore {
    async fn list_sources(&self) -> Vec<Source> {
        self.sources.read().expect("sources lock poisoned").clone()
    }

    async fn get_snapshot(&self, source_id: &str) -> Option<Snapshot> {
        self.sources
            .read()
            .expect("sources lock poisoned")
            .iter()
            .find(|s| s.id == source_id)
            .and_then(|s| s.last_snapshot.clone())
    }

    async fn update_source(
        &self,
        id: &str,
        status: SourceStatus,
        last_checked: DateTime<Utc>,
        snapshot: Option<Snapshot>,
    ) -> bool {
        let mut v = self.sources.write().expect("sources lock poisoned");
        match v.iter_mut().find(|s| s.id == id) {
            Some(s) => {
                s.status = status;
                s.last_checked = Some(last_checked);
                if let Some(snap) = snapshot {
                    s.last_snapshot = Some(snap);
                }
                true
            }
            None => false,
        }
    }
}

#[async_trait::async_trait]
impl ChangeStore for MemoryStore {
    async fn record_if_absent(&self, mut change: ChangeRecord) -> RecordOutcome {
        let fp = change.dedup_fingerprint();
        {
            let mut seen = self
                .change_fingerprints
                .write()
                .expect("fingerprints lock poisoned");
            if !seen.insert(fp) {
                return RecordOutcome::Duplicate;
            }
        }
        if change.id.is_empty() {
            change.id = self.next_id("chg");
        }
        self.changes
            .write()
            .expect("changes lock poisoned")
            .push(change.clone());
        RecordOutcome::Inserted(change)
    }

    async fn list_changes(&self) -> Vec<ChangeRecord> {
        let mut v = self.changes.read().expect("changes lock poisoned").clone();
        v.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        v
    }
}

#[async_trait::async_trait]
impl RecipientStore for MemoryStore {
    async fn list_recipients(&self) -> Vec<EmailRecipient> {
        self.recipients
            .read()
            .expect("recipients lock poisoned")
            .clone()
    }

    async fn addresses(&self) -> Vec<String> {
        self.recipients
            .read()
            .expect("recipients lock poisoned")
            .iter()
            .map(|r| r.email.clone())
            .collect()
    }
}
