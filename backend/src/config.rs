use crate::error::{AppError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Flat environment variables honoured on top of the structured
/// `INNOVEST__SECTION__KEY` form, mapped to their config key.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("PORT", "server.port"),
    ("FRONTEND_URL", "server.frontend_url"),
    ("DATABASE_URL", "database.url"),
    ("JWT_SECRET", "jwt.secret"),
    ("AI_PROVIDER_ORDER", "ai.provider_order"),
    ("AI_MODEL", "ai.openai.model"),
    ("OPENAI_API_KEY", "ai.openai.api_key"),
    ("GROQ_API_KEY", "ai.groq.api_key"),
    ("GROQ_MODEL", "ai.groq.model"),
    ("HUGGINGFACE_API_KEY", "ai.huggingface.api_key"),
    ("HF_MODEL", "ai.huggingface.model"),
    ("ALERT_THRESHOLD", "alerts.threshold"),
    ("ALERT_TO_EMAIL", "alerts.to_email"),
    ("ALERT_FROM_EMAIL", "alerts.from_email"),
    ("SMTP_HOST", "alerts.smtp.host"),
    ("SMTP_PORT", "alerts.smtp.port"),
    ("SMTP_USER", "alerts.smtp.user"),
    ("SMTP_PASS", "alerts.smtp.pass"),
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub ai: AiConfig,
    pub alerts: AlertConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub frontend_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            frontend_url: "http://localhost:5173".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://innovest.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
    pub bcrypt_cost: u32,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            expiration_hours: 24,
            bcrypt_cost: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub provider_order: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Serve the local heuristic engine when the provider chain is down.
    pub demo_fallback: bool,
    pub openai: ProviderConfig,
    pub groq: ProviderConfig,
    pub huggingface: ProviderConfig,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider_order: "openai,groq,huggingface".to_string(),
            temperature: 0.2,
            timeout_secs: 30,
            demo_fallback: true,
            openai: ProviderConfig::new("gpt-4o-mini", "https://api.openai.com/v1"),
            groq: ProviderConfig::new("llama-3.1-8b-instant", "https://api.groq.com/openai/v1"),
            huggingface: ProviderConfig::new(
                "google/flan-t5-large",
                "https://api-inference.huggingface.co",
            ),
        }
    }
}

impl AiConfig {
    pub fn provider_order(&self) -> Vec<String> {
        self.provider_order
            .split(',')
            .map(|item| item.trim().to_lowercase())
            .filter(|item| !item.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl ProviderConfig {
    fn new(model: &str, base_url: &str) -> Self {
        Self {
            api_key: None,
            model: model.to_string(),
            base_url: base_url.to_string(),
        }
    }

    /// The API key, treating a blank value as unset.
    pub fn key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub threshold: f64,
    pub to_email: Option<String>,
    pub from_email: Option<String>,
    pub smtp: SmtpConfig,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            threshold: 70.0,
            to_email: None,
            from_email: None,
            smtp: SmtpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub pass: Option<String>,
}

impl AlertConfig {
    pub fn smtp_enabled(&self) -> bool {
        let filled = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        filled(&self.smtp.host)
            && self.smtp.port.is_some()
            && filled(&self.smtp.user)
            && filled(&self.smtp.pass)
    }
}

impl AppConfig {
    pub fn new() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(Environment::with_prefix("INNOVEST").separator("__"));

        for (var, key) in LEGACY_ENV {
            let value = env::var(var).ok().filter(|v| !v.trim().is_empty());
            builder = builder.set_override_option(*key, value)?;
        }

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.jwt.secret.trim().is_empty() {
            return Err(AppError::Config(ConfigError::Message(
                "JWT_SECRET must be set".to_string(),
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.jwt.expiration_hours, 24);
        assert_eq!(config.ai.openai.model, "gpt-4o-mini");
        assert_eq!(config.ai.groq.model, "llama-3.1-8b-instant");
        assert_eq!(config.ai.huggingface.model, "google/flan-t5-large");
        assert_eq!(config.alerts.threshold, 70.0);
        assert!(config.ai.demo_fallback);
    }

    #[test]
    fn provider_order_is_trimmed_and_lowercased() {
        let ai = AiConfig {
            provider_order: " Groq, ,OPENAI ,huggingface,".to_string(),
            ..AiConfig::default()
        };
        assert_eq!(ai.provider_order(), vec!["groq", "openai", "huggingface"]);
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let provider = ProviderConfig {
            api_key: Some("   ".to_string()),
            ..ProviderConfig::default()
        };
        assert_eq!(provider.key(), None);
    }

    #[test]
    fn smtp_requires_every_field() {
        let mut alerts = AlertConfig::default();
        assert!(!alerts.smtp_enabled());

        alerts.smtp = SmtpConfig {
            host: Some("smtp.example.com".into()),
            port: Some(587),
            user: Some("alerts@example.com".into()),
            pass: None,
        };
        assert!(!alerts.smtp_enabled());

        alerts.smtp.pass = Some("secret".into());
        assert!(alerts.smtp_enabled());
    }

    // The only test touching process environment; keep it that way.
    #[test]
    fn flat_env_vars_override_defaults() {
        let vars = [
            ("JWT_SECRET", "env-secret"),
            ("PORT", "8081"),
            ("SMTP_PORT", "465"),
            ("ALERT_THRESHOLD", "55"),
            ("GROQ_MODEL", "   "),
        ];
        for (key, value) in vars {
            env::set_var(key, value);
        }

        let config = AppConfig::new();
        for (key, _) in vars {
            env::remove_var(key);
        }
        let config = config.unwrap();

        assert_eq!(config.jwt.secret, "env-secret");
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.alerts.smtp.port, Some(465));
        assert_eq!(config.alerts.threshold, 55.0);
        // Blank values leave the default alone.
        assert_eq!(config.ai.groq.model, "llama-3.1-8b-instant");
    }

    #[test]
    fn missing_jwt_secret_is_rejected() {
        let config = AppConfig::default();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }
}
