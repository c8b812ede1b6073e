//! Demo that composes a sample change digest and, when SMTP is configured,
//! sends it through the real transport (stdout only otherwise).

use chrono::Utc;
use policy_change_monitor::model::{ChangeRecord, Severity};
use policy_change_monitor::notify::email::EmailTransport;
use policy_change_monitor::notify::{compose_digest, NotificationTransport};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let now = Utc::now();
    let changes = vec![
        ChangeRecord {
            id: "chg-000001".into(),
            source_id: "src-000001".into(),
            source_name: "Port Authority".into(),
            url: "https://example.org/policy".into(),
            categories: vec!["ports".into()],
            summary: "1 line(s) changed; keywords: suspended".into(),
            details: "- Departures operate daily\n+ All departures suspended".into(),
            severity: Severity::High,
            timestamp: now,
            reviewed: false,
        },
        ChangeRecord {
            id: "chg-000002".into(),
            source_id: "src-000002".into(),
            source_name: "Harbor Master".into(),
            url: "https://example.org/berthing".into(),
            categories: vec!["ports".into()],
            summary: "2 line(s) changed".into(),
            details: "- Berthing fee: 120 EUR\n+ Berthing fee: 135 EUR".into(),
            severity: Severity::Low,
            timestamp: now,
            reviewed: false,
        },
    ];

    let (subject, body) = compose_digest(&changes);
    println!("Subject: {subject}\n\n{body}");

    let transport = EmailTransport::from_env();
    let recipients = vec![std::env::var("NOTIFY_EMAIL_TO").unwrap_or_default()]
        .into_iter()
        .filter(|r| !r.is_empty())
        .collect::<Vec<_>>();
    if recipients.is_empty() {
        println!("(NOTIFY_EMAIL_TO not set, skipping send)");
        return;
    }
    match transport.send(&subject, &body, &recipients).await {
        Ok(()) => println!("digest-demo sent"),
        Err(e) => println!("digest-demo send failed: {e}"),
    }
}
