use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid address {0:?}: {1}")]
    Address(String, String),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),
}

/// A rendered email. `action_link` is kept alongside the HTML so that
/// non-delivering mailers can surface it.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub action_link: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

pub fn activation_email(to: &str, link: &str) -> OutgoingEmail {
    let subject = "Activate your SocioFeed Account";
    let html = format!(
        r#"<div style="font-family: sans-serif; line-height: 1.6;">
  <h2>{subject}</h2>
  <p>Thank you for registering on SocioFeed.</p>
  <p>Please verify your email by clicking the button below:</p>
  <a href="{link}" target="_blank" style="display: inline-block; padding: 10px 20px; background-color: #1976d2; color: #fff; text-decoration: none; border-radius: 5px;">Verify Email</a>
  <p>If the button doesn't work, copy and paste this link into your browser:</p>
  <p>{link}</p>
  <p>SocioFeed Team</p>
</div>"#
    );
    OutgoingEmail {
        to: to.to_string(),
        subject: subject.to_string(),
        html,
        action_link: link.to_string(),
    }
}

pub fn reset_email(to: &str, link: &str) -> OutgoingEmail {
    let html = format!(
        r#"<div style="font-family: sans-serif; line-height: 1.6;">
  <h2>Password Reset Request</h2>
  <p>We received a request to reset your password. Click the button below to proceed:</p>
  <a href="{link}" target="_blank" style="display: inline-block; padding: 10px 20px; background-color: #e53935; color: #fff; text-decoration: none; border-radius: 5px;">Reset Password</a>
  <p>If the button doesn't work, copy and paste this link into your browser:</p>
  <p>{link}</p>
  <p>If you didn't request this, you can safely ignore this email.</p>
  <p>SocioFeed Team</p>
</div>"#
    );
    OutgoingEmail {
        to: to.to_string(),
        subject: "Reset Your SocioFeed Password".to_string(),
        html,
        action_link: link.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// STARTTLS when true; plain connection otherwise (local mail catchers).
    pub tls: bool,
    pub from: String,
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let mut builder = if settings.tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                .map_err(|e| MailError::Transport(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
        };
        builder = builder.port(settings.port);

        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        info!(
            "SMTP mailer configured for {}:{} (tls: {})",
            settings.host, settings.port, settings.tls
        );

        Ok(Self {
            transport: builder.build(),
            from: settings.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let from = self
            .from
            .parse::<Mailbox>()
            .map_err(|e| MailError::Address(self.from.clone(), e.to_string()))?;
        let to = email
            .to
            .parse::<Mailbox>()
            .map_err(|e| MailError::Address(email.to.clone(), e.to_string()))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html)
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| MailError::Transport(e.to_string()))
    }
}

/// Development mailer: writes the message summary and link to the log.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        warn!(
            "Mail delivery disabled; to={} subject={:?} link={}",
            email.to, email.subject, email.action_link
        );
        Ok(())
    }
}
