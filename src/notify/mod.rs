//! Notification dispatch: one digest per cycle, grouped by source and
//! ordered by severity. Best-effort: a transport failure is reported to
//! the caller, never retried here, and never rolls back recorded changes.

pub mod email;

use std::sync::Arc;

use crate::error::NotifyError;
use crate::model::ChangeRecord;

/// Delivery collaborator: `send(subject, body, recipients)`.
#[async_trait::async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send(
        &self,
        subject: &str,
        body: &str,
        recipients: &[String],
    ) -> Result<(), NotifyError>;
}

/// Compose the digest for a set of changes: subject plus a body grouped by
/// source, with `high` entries before `medium` before `low`.
pub fn compose_digest(changes: &[ChangeRecord]) -> (String, String) {
    let subject = format!("{} policy change(s) detected", changes.len());

    // Group by source, keeping the most severe group first.
    let mut groups: Vec<(String, String, Vec<&ChangeRecord>)> = Vec::new();
    for c in changes {
        match groups.iter_mut().find(|(id, _, _)| *id == c.source_id) {
            Some((_, _, list)) => list.push(c),
            None => groups.push((c.source_id.clone(), c.source_name.clone(), vec![c])),
        }
    }
    for (_, _, list) in &mut groups {
        list.sort_by_key(|c| (c.severity.rank(), c.timestamp));
    }
    groups.sort_by_key(|(_, name, list)| {
        let best = list.iter().map(|c| c.severity.rank()).min().unwrap_or(u8::MAX);
        (best, name.clone())
    });

    let mut body = String::new();
    for (_, name, list) in &groups {
        body.push_str(&format!("== {} ({}) ==\n", name, list[0].url));
        for c in list {
            body.push_str(&format!(
                "[{}] {}\n",
                format!("{:?}", c.severity).to_uppercase(),
                c.summary
            ));
            if !c.details.is_empty() {
                body.push_str(&c.details);
                body.push('\n');
            }
            body.push('\n');
        }
    }

    (subject, body.trim_end().to_string() + "\n")
}

/// Formats and dispatches the cycle digest through a transport.
#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn NotificationTransport>,
}

impl Notifier {
    pub fn new(transport: Arc<dyn NotificationTransport>) -> Self {
        Self { transport }
    }

    /// Dispatch one digest for `changes` to all `recipients`.
    ///
    /// The caller gates on zero changes; this gates on zero recipients.
    /// Returns the recipient count on success.
    pub async fn notify(
        &self,
        recipients: &[String],
        changes: &[ChangeRecord],
    ) -> Result<usize, NotifyError> {
        if recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }
        let (subject, body) = compose_digest(changes);
        self.transport.send(&subject, &body, recipients).await?;
        tracing::info!(
            recipients = recipients.len(),
            changes = changes.len(),
            "change digest dispatched"
        );
        Ok(recipients.len())
    }
}
