//! Verification-email delivery.
//!
//! The session issuer only needs to know whether a message went out; a
//! `false` return makes it roll back the pending sign-up.

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::SmtpConfig;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver the verification link for `reference` to `email`.
    async fn send_verification(&self, reference: &str, email: &str) -> bool;
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid mailbox: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp failure: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

pub fn verification_link(public_url: &str, reference: &str) -> String {
    format!(
        "{}/verify/{}",
        public_url.trim_end_matches('/'),
        urlencoding::encode(reference)
    )
}

/// Sends verification mail over SMTP.
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    public_url: String,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig, public_url: &str) -> Result<Self, NotifyError> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.server)?
            .port(config.port)
            .credentials(creds)
            .build();
        Ok(Self {
            mailer,
            from: config.from.parse()?,
            public_url: public_url.to_string(),
        })
    }

    async fn deliver(&self, reference: &str, email: &str) -> Result<(), NotifyError> {
        let link = verification_link(&self.public_url, reference);
        let text_body = format!(
            "Confirm your email address by opening the link below.\n\n{link}\n\n\
             If you did not sign up, ignore this message; the link expires on its own."
        );
        let html_body = format!(
            "<p>Confirm your email address by opening the link below.</p>\
             <p><a href=\"{link}\">{link}</a></p>\
             <p>If you did not sign up, ignore this message; the link expires on its own.</p>"
        );

        let message = Message::builder()
            .from(self.from.clone())
            .to(email.parse()?)
            .subject("Confirm your email address")
            .header(lettre::message::header::MIME_VERSION_1_0)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )?;

        self.mailer.send(message).await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    #[tracing::instrument(skip(self, reference))]
    async fn send_verification(&self, reference: &str, email: &str) -> bool {
        match self.deliver(reference, email).await {
            Ok(()) => {
                tracing::info!("verification email sent");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to send verification email");
                false
            }
        }
    }
}

/// Logs the verification link instead of mailing it. Used when no `smtp`
/// section is configured.
pub struct LogNotifier {
    public_url: String,
}

impl LogNotifier {
    pub fn new(public_url: &str) -> Self {
        Self {
            public_url: public_url.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_verification(&self, reference: &str, email: &str) -> bool {
        tracing::info!(
            %email,
            link = %verification_link(&self.public_url, reference),
            "verification email (not sent, smtp disabled)"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_joins_base_and_reference() {
        assert_eq!(
            verification_link("https://auth.example.org/", "abc-_1"),
            "https://auth.example.org/verify/abc-_1"
        );
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let notifier = LogNotifier::new("http://localhost:8080");
        assert!(notifier.send_verification("ref", "ada@example.org").await);
    }

    #[tokio::test]
    async fn smtp_notifier_rejects_bad_sender() {
        let config = SmtpConfig {
            server: "localhost".into(),
            port: 2525,
            username: "u".into(),
            password: "p".into(),
            from: "not a mailbox".into(),
        };
        assert!(matches!(
            SmtpNotifier::new(&config, "https://auth.example.org"),
            Err(NotifyError::Address(_))
        ));
    }
}
