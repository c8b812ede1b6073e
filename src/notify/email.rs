use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::NotificationTransport;
use crate::error::NotifyError;

/// SMTP transport for the cycle digest. One message per dispatch with all
/// recipients in `To:`; retry policy belongs to the SMTP relay, not here.
pub struct EmailTransport {
    inner: Option<Smtp>,
}

struct Smtp {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailTransport {
    /// Build from `SMTP_HOST` / `SMTP_USER` / `SMTP_PASS` /
    /// `NOTIFY_EMAIL_FROM`. With `SMTP_HOST` unset the transport is
    /// disabled; dispatch attempts then report a transport error so the
    /// cycle result carries the warning.
    pub fn from_env() -> Self {
        let Ok(host) = std::env::var("SMTP_HOST") else {
            tracing::debug!("email disabled (no SMTP_HOST)");
            return Self { inner: None };
        };
        match Self::connect(&host) {
            Ok(smtp) => Self { inner: Some(smtp) },
            Err(e) => {
                tracing::warn!(error = %e, "email transport misconfigured, disabling");
                Self { inner: None }
            }
        }
    }

    fn connect(host: &str) -> Result<Smtp> {
        let user = std::env::var("SMTP_USER").context("SMTP_USER missing")?;
        let pass = std::env::var("SMTP_PASS").context("SMTP_PASS missing")?;
        let from_addr = std::env::var("NOTIFY_EMAIL_FROM").context("NOTIFY_EMAIL_FROM missing")?;

        let creds = Credentials::new(user, pass);
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .context("invalid SMTP_HOST")?
            .credentials(creds)
            .build();
        let from = from_addr.parse().context("invalid NOTIFY_EMAIL_FROM")?;

        Ok(Smtp { mailer, from })
    }
}

#[async_trait::async_trait]
impl NotificationTransport for EmailTransport {
    async fn send(
        &self,
        subject: &str,
        body: &str,
        recipients: &[String],
    ) -> Result<(), NotifyError> {
        let Some(smtp) = &self.inner else {
            return Err(NotifyError::Transport(
                "smtp transport disabled (SMTP_HOST not set)".to_string(),
            ));
        };

        let mut builder = Message::builder()
            .from(smtp.from.clone())
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN);
        for addr in recipients {
            let mb: Mailbox = addr
                .parse()
                .map_err(|_| NotifyError::Transport(format!("invalid recipient: {addr}")))?;
            builder = builder.to(mb);
        }

        let msg = builder
            .body(body.to_string())
            .map_err(|e| NotifyError::Transport(format!("build email: {e}")))?;

        smtp.mailer
            .send(msg)
            .await
            .map_err(|e| NotifyError::Transport(format!("send email: {e}")))?;
        Ok(())
    }
}
