use crate::{
    config::{AlertConfig, SmtpConfig},
    error::{AppError, Result},
};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertOutcome {
    pub sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AlertOutcome {
    pub fn sent() -> Self {
        Self { sent: true, reason: None }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            sent: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &AlertEmail) -> Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(smtp: &SmtpConfig) -> Result<Self> {
        let (Some(host), Some(port), Some(user), Some(pass)) =
            (&smtp.host, smtp.port, &smtp.user, &smtp.pass)
        else {
            return Err(AppError::Email("SMTP settings are incomplete".to_string()));
        };

        // Port 465 speaks TLS from the first byte; anything else upgrades.
        let builder = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        }
        .map_err(|e| AppError::Email(format!("SMTP relay setup failed: {}", e)))?;

        let transport = builder
            .port(port)
            .credentials(Credentials::new(user.clone(), pass.clone()))
            .build();

        Ok(Self { transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &AlertEmail) -> Result<()> {
        let message = Message::builder()
            .from(email.from.parse().map_err(|e| AppError::Email(format!("Invalid sender: {}", e)))?)
            .to(email.to.parse().map_err(|e| AppError::Email(format!("Invalid recipient: {}", e)))?)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(|e| AppError::Email(format!("Message build failed: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Email(format!("SMTP send failed: {}", e)))?;

        Ok(())
    }
}

/// Who a triggered alert is about.
pub struct AlertRecipient<'a> {
    pub name: &'a str,
    pub email: &'a str,
}

pub struct AlertService {
    threshold: f64,
    to_override: Option<String>,
    from: Option<String>,
    mailer: Option<Arc<dyn Mailer>>,
}

impl AlertService {
    pub fn from_config(config: &AlertConfig) -> Result<Self> {
        let mailer: Option<Arc<dyn Mailer>> = if config.smtp_enabled() {
            Some(Arc::new(SmtpMailer::new(&config.smtp)?))
        } else {
            None
        };

        Ok(Self::new(config, mailer))
    }

    pub fn new(config: &AlertConfig, mailer: Option<Arc<dyn Mailer>>) -> Self {
        Self {
            threshold: config.threshold,
            to_override: non_blank(&config.to_email),
            from: non_blank(&config.from_email).or_else(|| non_blank(&config.smtp.user)),
            mailer,
        }
    }

    pub fn enabled(&self) -> bool {
        self.mailer.is_some()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// The "not triggered" outcome, if `score` is under the threshold.
    pub fn below_threshold(&self, score: f64) -> Option<AlertOutcome> {
        (score < self.threshold).then(|| {
            AlertOutcome::skipped(format!(
                "No alert triggered. Score {} is below threshold {}.",
                score, self.threshold
            ))
        })
    }

    pub async fn dispatch(
        &self,
        recipient: &AlertRecipient<'_>,
        risk_level: &str,
        risk_score: f64,
        explanation: Option<&str>,
    ) -> Result<AlertOutcome> {
        let (Some(mailer), Some(from)) = (&self.mailer, &self.from) else {
            debug!("SMTP not configured, alert not sent");
            return Ok(AlertOutcome::skipped("SMTP is not configured on backend."));
        };

        let to = self
            .to_override
            .clone()
            .unwrap_or_else(|| recipient.email.to_string());

        let email = compose(from, &to, recipient.name, risk_level, risk_score, explanation);
        mailer.send(&email).await?;

        info!(to = %to, risk_level, risk_score, "Risk alert email sent");
        Ok(AlertOutcome::sent())
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.trim().is_empty())
}

fn compose(
    from: &str,
    to: &str,
    user_name: &str,
    risk_level: &str,
    risk_score: f64,
    explanation: Option<&str>,
) -> AlertEmail {
    let greeting_name = if user_name.trim().is_empty() { "User" } else { user_name };
    let explanation = explanation
        .filter(|e| !e.trim().is_empty())
        .unwrap_or("No explanation provided.");

    let body = [
        format!("Hello {},", greeting_name),
        String::new(),
        "A risk alert has been triggered.".to_string(),
        format!("Risk Level: {}", risk_level),
        format!("Risk Score: {}", risk_score),
        String::new(),
        "AI Explanation:".to_string(),
        explanation.to_string(),
        String::new(),
        "Please review the dashboard and take required action.".to_string(),
    ]
    .join("\n");

    AlertEmail {
        from: from.to_string(),
        to: to.to_string(),
        subject: format!("[InnoVest Alert] {} risk detected", risk_level),
        body,
    }
}
