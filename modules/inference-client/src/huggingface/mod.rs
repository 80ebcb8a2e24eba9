mod client;
pub(crate) mod types;

use crate::traits::{ClassScore, TextClassifier};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::info;

use client::HuggingFaceClient;

// =============================================================================
// HuggingFace Classifier
// =============================================================================

/// Text classification through the Hugging Face inference API (or any
/// self-hosted endpoint speaking the same protocol).
#[derive(Clone)]
pub struct HuggingFace {
    api_token: Option<String>,
    pub(crate) model: String,
    base_url: Option<String>,
}

impl HuggingFace {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            api_token: None,
            model: model.into(),
            base_url: None,
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_token = std::env::var("HF_API_TOKEN")
            .map_err(|_| anyhow!("HF_API_TOKEN environment variable not set"))?;
        Ok(Self::new(model).with_api_token(api_token))
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub(crate) fn client(&self) -> HuggingFaceClient {
        let client = HuggingFaceClient::new(self.api_token.as_deref());
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }
}

#[async_trait]
impl TextClassifier for HuggingFace {
    async fn warm_up(&self) -> Result<()> {
        let probe = vec!["warm up".to_string()];
        let out = self.client().classify(&self.model, &probe, true).await?;
        if out.len() != 1 || out[0].is_empty() {
            return Err(anyhow!(
                "Model {} returned an empty distribution during warm-up",
                self.model
            ));
        }
        info!(model = %self.model, "Sentiment model ready");
        Ok(())
    }

    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<Vec<ClassScore>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.client().classify(&self.model, texts, true).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
