use crate::{
    ai::AiGateway,
    alerts::AlertService,
    auth::AuthService,
    config::AppConfig,
    error::Result,
};

pub struct AppServices {
    pub auth: AuthService,
    pub ai: AiGateway,
    pub alerts: AlertService,
}

impl AppServices {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let ai = AiGateway::from_config(&config.ai)?;
        let alerts = AlertService::from_config(&config.alerts)?;

        tracing::info!(
            providers = ?ai.provider_names(),
            alerts_enabled = alerts.enabled(),
            "Services initialised"
        );

        Ok(Self {
            auth: AuthService::new(&config.jwt),
            ai,
            alerts,
        })
    }
}
