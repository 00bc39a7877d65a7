//! SMTP delivery via lettre, with the log sender as a fallback.

use anyhow::Context;
use clientele_auth::{EmailSender, LogEmailSender};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::EmailConfig;

#[derive(Clone)]
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    pub fn new(host: &str, config: &EmailConfig) -> anyhow::Result<Self> {
        let address: Address = config
            .from_address
            .parse()
            .with_context(|| format!("invalid from_address {:?}", config.from_address))?;
        let from = Mailbox::new(Some(config.from_name.clone()), address);

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .with_context(|| format!("invalid SMTP relay {host}"))?
            .port(config.smtp_port);
        if let Some(username) = &config.smtp_username {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                config.smtp_password.clone().unwrap_or_default(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

impl EmailSender for SmtpEmailSender {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> bool {
        let to: Mailbox = match to.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                tracing::warn!(error = %e, "invalid recipient address");
                return false;
            }
        };

        let message = match Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
        {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "could not build email");
                return false;
            }
        };

        match self.transport.send(message).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "SMTP delivery failed");
                false
            }
        }
    }
}

/// The sender the server runs with, chosen from configuration.
#[derive(Clone)]
pub enum Mailer {
    Smtp(SmtpEmailSender),
    Log(LogEmailSender),
}

impl Mailer {
    pub fn from_config(config: &EmailConfig) -> anyhow::Result<Self> {
        match &config.smtp_host {
            Some(host) => {
                tracing::info!(%host, port = config.smtp_port, "using SMTP email sender");
                Ok(Self::Smtp(SmtpEmailSender::new(host, config)?))
            }
            None => {
                tracing::warn!("no smtp_host configured; emails will only be logged");
                Ok(Self::Log(LogEmailSender))
            }
        }
    }
}

impl EmailSender for Mailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> bool {
        match self {
            Self::Smtp(s) => s.send(to, subject, html_body).await,
            Self::Log(s) => s.send(to, subject, html_body).await,
        }
    }
}
