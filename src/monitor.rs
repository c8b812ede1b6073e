//! # Monitor Orchestrator
//!
//! Drives the end-to-end cycle across all sources: fetch → detect →
//! record → aggregate → notify. One cycle in flight at a time; failure of
//! one source never aborts the cycle for the others.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::detect::{self, Detection};
use crate::fetch::{ContentFetcher, FetchedPage};
use crate::model::{
    ChangeRecord, CheckOutcome, MonitorCycleResult, NotifyOutcome, Snapshot, Source,
    SourceOutcome, SourceStatus,
};
use crate::notify::Notifier;
use crate::rules::SeverityRules;
use crate::store::{ChangeStore, RecipientStore, RecordOutcome, SourceStore};

pub struct Monitor {
    fetcher: Arc<dyn ContentFetcher>,
    sources: Arc<dyn SourceStore>,
    changes: Arc<dyn ChangeStore>,
    recipients: Arc<dyn RecipientStore>,
    notifier: Notifier,
    rules: Arc<SeverityRules>,
    max_concurrency: usize,
    /// Serializes cycles: scheduled and manual triggers share this lock, so
    /// two cycles can never race on the same source's snapshot.
    cycle_lock: Mutex<()>,
}

impl Monitor {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        sources: Arc<dyn SourceStore>,
        changes: Arc<dyn ChangeStore>,
        recipients: Arc<dyn RecipientStore>,
        notifier: Notifier,
        rules: SeverityRules,
        max_concurrency: usize,
    ) -> Self {
        Self {
            fetcher,
            sources,
            changes,
            recipients,
            notifier,
            rules: Arc::new(rules),
            max_concurrency: max_concurrency.max(1),
            cycle_lock: Mutex::new(()),
        }
    }

    /// One full pass over all configured sources. Both the scheduler and the
    /// manual trigger endpoint call exactly this.
    pub async fn run_cycle(&self) -> MonitorCycleResult {
        let _cycle = self.cycle_lock.lock().await;
        crate::metrics::ensure_metrics_described();

        // Every source gets the cycle's start timestamp as last_checked,
        // not its own fetch completion time.
        let started_at = Utc::now();
        counter!("monitor_cycles_total").increment(1);
        gauge!("monitor_last_cycle_ts").set(started_at.timestamp() as f64);

        let source_list = self.sources.list_sources().await;
        tracing::info!(sources = source_list.len(), "monitor cycle starting");

        let sem = Arc::new(Semaphore::new(self.max_concurrency));
        // Dropping the JoinSet aborts in-flight checks; records already
        // committed by finished checks stay committed.
        let mut set: JoinSet<(usize, SourceOutcome, Option<ChangeRecord>)> = JoinSet::new();

        for (idx, src) in source_list.into_iter().enumerate() {
            let sem = sem.clone();
            let fetcher = self.fetcher.clone();
            let sources = self.sources.clone();
            let changes = self.changes.clone();
            let rules = self.rules.clone();
            set.spawn(async move {
                let _permit = sem.acquire_owned().await.expect("semaphore closed");
                let (outcome, record) =
                    check_source(&*fetcher, &*sources, &*changes, &rules, &src, started_at).await;
                (idx, outcome, record)
            });
        }

        let mut indexed: Vec<(usize, SourceOutcome)> = Vec::new();
        let mut found: Vec<ChangeRecord> = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, outcome, record)) => {
                    counter!("monitor_sources_checked_total").increment(1);
                    if let Some(r) = record {
                        found.push(r);
                    }
                    indexed.push((idx, outcome));
                }
                Err(e) => tracing::error!(error = %e, "source check task failed"),
            }
        }
        indexed.sort_by_key(|(i, _)| *i);
        let outcomes: Vec<SourceOutcome> = indexed.into_iter().map(|(_, o)| o).collect();

        found.sort_by_key(|c| (c.severity.rank(), c.source_name.clone()));

        let notification = if found.is_empty() {
            NotifyOutcome::Skipped
        } else {
            let recipients = self.recipients.addresses().await;
            match self.notifier.notify(&recipients, &found).await {
                Ok(n) => {
                    counter!("monitor_notifications_sent_total").increment(1);
                    NotifyOutcome::Sent { recipients: n }
                }
                Err(e) => {
                    // Detection is durable; notification is best-effort.
                    counter!("monitor_notify_failures_total").increment(1);
                    tracing::warn!(error = %e, "digest dispatch failed");
                    NotifyOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            }
        };

        tracing::info!(
            changes = found.len(),
            sources = outcomes.len(),
            "monitor cycle finished"
        );

        MonitorCycleResult {
            started_at,
            sources: outcomes,
            changes: found,
            notification,
        }
    }
}

fn snapshot_from(page: &FetchedPage, taken_at: DateTime<Utc>) -> Snapshot {
    Snapshot {
        fingerprint: page.fingerprint.clone(),
        content: page.content.clone(),
        taken_at,
    }
}

fn outcome_for(src: &Source, outcome: CheckOutcome, error: Option<String>) -> SourceOutcome {
    SourceOutcome {
        source_id: src.id.clone(),
        name: src.name.clone(),
        outcome,
        error,
    }
}

/// Per-source state machine:
/// `Pending → Fetching → {Detecting → {Unchanged | ChangeFound} | FetchFailed}`.
async fn check_source(
    fetcher: &dyn ContentFetcher,
    sources: &dyn SourceStore,
    changes: &dyn ChangeStore,
    rules: &SeverityRules,
    src: &Source,
    started_at: DateTime<Utc>,
) -> (SourceOutcome, Option<ChangeRecord>) {
    let page = match fetcher.fetch(&src.url).await {
        Ok(p) => p,
        Err(e) => {
            counter!("monitor_fetch_errors_total").increment(1);
            tracing::warn!(source = %src.name, error = %e, "fetch failed");
            sources
                .update_source(&src.id, SourceStatus::FetchError, started_at, None)
                .await;
            return (
                outcome_for(src, CheckOutcome::FetchError, Some(e.to_string())),
                None,
            );
        }
    };

    let prev = sources.get_snapshot(&src.id).await;
    let detection = match detect::detect(prev.as_ref(), &page, rules) {
        Ok(d) => d,
        Err(e) => {
            // Unreadable baseline: re-baseline on the fresh fetch so the
            // next cycle can diff again.
            tracing::warn!(source = %src.name, error = %e, "detector failed");
            sources
                .update_source(
                    &src.id,
                    SourceStatus::FetchError,
                    started_at,
                    Some(snapshot_from(&page, started_at)),
                )
                .await;
            return (
                outcome_for(src, CheckOutcome::FetchError, Some(e.to_string())),
                None,
            );
        }
    };

    match detection {
        Detection::NoChange => {
            // First-ever check: the fetch becomes the baseline snapshot.
            let snap = if prev.is_none() {
                Some(snapshot_from(&page, started_at))
            } else {
                None
            };
            let applied = sources
                .update_source(&src.id, SourceStatus::UpToDate, started_at, snap)
                .await;
            if !applied {
                tracing::debug!(source = %src.name, "source deleted mid-cycle, update dropped");
            }
            (outcome_for(src, CheckOutcome::Unchanged, None), None)
        }
        Detection::Changed {
            summary,
            details,
            severity,
        } => {
            let record = ChangeRecord {
                id: String::new(),
                source_id: src.id.clone(),
                source_name: src.name.clone(),
                url: src.url.clone(),
                categories: vec![src.category.clone()],
                summary,
                details,
                severity,
                timestamp: started_at,
                reviewed: false,
            };
            let stored = match changes.record_if_absent(record).await {
                RecordOutcome::Inserted(r) => {
                    counter!("monitor_changes_found_total").increment(1);
                    tracing::info!(source = %src.name, severity = ?r.severity, "change recorded");
                    Some(r)
                }
                RecordOutcome::Duplicate => {
                    tracing::debug!(source = %src.name, "duplicate change fingerprint, skipped");
                    None
                }
            };
            sources
                .update_source(
                    &src.id,
                    SourceStatus::ChangesFound,
                    started_at,
                    Some(snapshot_from(&page, started_at)),
                )
                .await;
            (outcome_for(src, CheckOutcome::Changed, None), stored)
        }
    }
}
