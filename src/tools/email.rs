//! Send email over SMTP.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use regex::Regex;
use serde_json::Value;
use tracing::info;

use super::{optional_text, Tool, ToolArg, ToolArgs};

const EMAIL_PATTERN: &str = r"[\w\.-]+@[\w\.-]+\.\w+";

/// SMTP account and the recipients copied on every mail.
#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub user: String,
    pub password: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub recipients: Vec<String>,
}

pub struct EmailTool {
    settings: EmailSettings,
}

impl EmailTool {
    pub fn new(settings: EmailSettings) -> Self {
        Self { settings }
    }

    /// Addresses named by the `email` argument plus the configured
    /// recipients and the sender, without duplicates.
    fn recipients(&self, email: Option<&Value>) -> anyhow::Result<Vec<String>> {
        let mut addresses = match email {
            Some(Value::String(s)) => extract_addresses(s)?,
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .filter(|s| !s.is_empty())
                .collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => extract_addresses(&other.to_string())?,
        };

        addresses.extend(self.settings.recipients.iter().cloned());
        addresses.push(self.settings.user.clone());

        let mut unique = Vec::with_capacity(addresses.len());
        for address in addresses {
            if !unique.contains(&address) {
                unique.push(address);
            }
        }
        Ok(unique)
    }

    async fn send(&self, to: &[String], subject: &str, contents: &str) -> anyhow::Result<()> {
        let from: Mailbox = self
            .settings
            .user
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid from address '{}': {}", self.settings.user, e))?;

        let mut builder = Message::builder().from(from).subject(subject);
        for recipient in to {
            let mailbox: Mailbox = recipient
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid to address '{}': {}", recipient, e))?;
            builder = builder.to(mailbox);
        }

        let email = builder
            .body(contents.to_string())
            .map_err(|e| anyhow::anyhow!("Failed to build email: {}", e))?;

        let creds = Credentials::new(self.settings.user.clone(), self.settings.password.clone());

        // Port 465 = implicit TLS, anything else = STARTTLS.
        let mailer = if self.settings.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.settings.smtp_host)?
                .port(self.settings.smtp_port)
                .credentials(creds)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.settings.smtp_host)?
                .port(self.settings.smtp_port)
                .credentials(creds)
                .build()
        };

        mailer.send(email).await?;
        Ok(())
    }
}

#[async_trait]
impl Tool for EmailTool {
    fn name(&self) -> &str {
        "EmailTool"
    }

    fn description(&self) -> &str {
        "This tool is useful when you want to send an email to someone."
    }

    fn arguments(&self) -> &[ToolArg] {
        const ARGS: &[ToolArg] = &[
            ToolArg::new("email", "The email address of the recipient, it's a list"),
            ToolArg::new("subject", "The subject of the email"),
            ToolArg::new("contents", "The contents of the email"),
        ];
        ARGS
    }

    async fn invoke(&self, args: &ToolArgs) -> anyhow::Result<String> {
        let to = self.recipients(args.get("email"))?;
        let subject = optional_text(args, "subject").unwrap_or_default();
        let contents = optional_text(args, "contents").unwrap_or_default();

        self.send(&to, &subject, &contents).await?;
        info!("Send email to {:?}", to);
        Ok("The email has been sent. You can execute the next step.".to_string())
    }
}

/// Every address-looking substring of `text`.
fn extract_addresses(text: &str) -> anyhow::Result<Vec<String>> {
    let re = Regex::new(EMAIL_PATTERN)?;
    Ok(re.find_iter(text).map(|m| m.as_str().to_string()).collect())
}
