use domain::models::{Answer, Prompt};
use domain::services::GenerationService;
use domain::Result;
use shared::telemetry::Telemetry;
use std::sync::Arc;
use tracing::{debug, info};

/// Sends assembled prompts to the generation service. Failures are returned untouched.
#[derive(Clone)]
pub struct Generator {
    service: Arc<dyn GenerationService>,
}

impl Generator {
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self { service }
    }

    pub fn model(&self) -> &str {
        self.service.generation_model()
    }

    pub async fn generate(&self, prompt: &Prompt) -> Result<Answer> {
        let telemetry = Telemetry::new();
        debug!(chars = prompt.text.chars().count(), "sending prompt");
        let text = self.service.complete(&prompt.text).await?;
        info!(model = self.model(), elapsed_ms = telemetry.elapsed_ms() as u64, "generated answer");
        Ok(Answer { text })
    }
}
