//! services/email_transport.rs
//! The outbound send seam. The engine only sees the `EmailTransport`
//! trait; SMTP delivery via lettre is one implementation, tests plug in
//! a mock.

use async_trait::async_trait;
use lettre::{
    message::{
        header::{ContentDisposition, ContentType},
        Body, Mailbox, MultiPart, SinglePart,
    },
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::engine_config::EngineConfig;
use crate::errors::EngineError;
use crate::models::email_model::{OutboundEmail, SendReceipt};

#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> Result<SendReceipt, EngineError>;
}

#[derive(Clone)]
pub struct SmtpEmailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpEmailTransport {
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let tls_params = TlsParameters::new(config.smtp_host.clone())
            .map_err(|e| EngineError::Configuration(format!("invalid TLS parameters: {e}")))?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| EngineError::Configuration(format!("invalid SMTP relay: {e}")))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.smtp_user.clone(),
                config.smtp_pass.clone(),
            ))
            .tls(Tls::Required(tls_params))
            .build();

        Ok(SmtpEmailTransport { mailer })
    }
}

#[async_trait]
impl EmailTransport for SmtpEmailTransport {
    async fn send(&self, email: OutboundEmail) -> Result<SendReceipt, EngineError> {
        let from: Mailbox = email
            .from
            .parse()
            .map_err(|e| EngineError::Transport(format!("invalid from address: {e}")))?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| EngineError::Transport(format!("invalid recipient address: {e}")))?;

        let html_part = SinglePart::builder()
            .header(
                ContentType::parse("text/html; charset=utf-8")
                    .map_err(|e| EngineError::Transport(e.to_string()))?,
            )
            .body(email.html_body.clone());

        let mut multipart = MultiPart::mixed().singlepart(html_part);
        for attach in &email.attachments {
            let part = SinglePart::builder()
                .header(
                    ContentType::parse(attach.content_type.as_str())
                        .map_err(|e| EngineError::Transport(e.to_string()))?,
                )
                .header(ContentDisposition::attachment(&attach.filename))
                .body(Body::new(attach.data.clone()));
            multipart = multipart.singlepart(part);
        }

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.clone())
            .multipart(multipart)
            .map_err(|e| EngineError::Transport(format!("message build failed: {e}")))?;

        let response = self
            .mailer
            .send(message)
            .await
            .map_err(|e| EngineError::Transport(format!("SMTP send failed: {e}")))?;

        Ok(SendReceipt {
            message_id: response
                .message()
                .collect::<Vec<_>>()
                .join(" "),
        })
    }
}
