use crate::config::AppConfig;
use crate::flows::gemini::GeminiFlows;
use crate::flows::tool::StubBarcodeTool;
use crate::flows::NutritionFlows;
use crate::session::SessionStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub flows: Arc<dyn NutritionFlows>,
    pub sessions: SessionStore,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let flows = Arc::new(GeminiFlows::new(&config.gemini, Arc::new(StubBarcodeTool))?)
            as Arc<dyn NutritionFlows>;
        tracing::info!(model = flows.model_name(), "model flows ready");

        Ok(Self::from_parts(config, flows))
    }

    pub fn from_parts(config: Arc<AppConfig>, flows: Arc<dyn NutritionFlows>) -> Self {
        let sessions = SessionStore::new(time::Duration::minutes(config.session_ttl_minutes));
        Self {
            config,
            flows,
            sessions,
        }
    }

    #[cfg(test)]
    pub fn fake(flows: Arc<dyn NutritionFlows>) -> Self {
        Self::fake_with_deadline(flows, 5)
    }

    #[cfg(test)]
    pub fn fake_with_deadline(flows: Arc<dyn NutritionFlows>, timeout_secs: u64) -> Self {
        let config = Arc::new(AppConfig {
            gemini: crate::config::GeminiConfig {
                api_key: "test".into(),
                model: "fake".into(),
                base_url: "http://fake.local".into(),
                timeout_secs,
            },
            session_ttl_minutes: 30,
        });
        Self::from_parts(config, flows)
    }
}
