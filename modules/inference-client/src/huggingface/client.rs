use anyhow::{anyhow, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use super::types::*;
use crate::traits::ClassScore;

pub(crate) const HF_INFERENCE_URL: &str = "https://api-inference.huggingface.co";

pub(crate) struct HuggingFaceClient {
    api_token: Option<String>,
    http: reqwest::Client,
    base_url: String,
}

impl HuggingFaceClient {
    pub fn new(api_token: Option<&str>) -> Self {
        Self {
            api_token: api_token.map(str::to_string),
            http: reqwest::Client::new(),
            base_url: HF_INFERENCE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(ref token) = self.api_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    pub async fn classify(
        &self,
        model: &str,
        inputs: &[String],
        wait_for_model: bool,
    ) -> Result<Vec<Vec<ClassScore>>> {
        let url = format!("{}/models/{}", self.base_url, model);

        debug!(model, inputs = inputs.len(), "Hugging Face classify request");

        let request = ClassifyRequest {
            inputs,
            parameters: ClassifyParameters {
                top_k: None,
                truncation: true,
            },
            options: RequestOptions {
                wait_for_model,
                use_cache: true,
            },
        };

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|e| e.error)
                .unwrap_or(error_text);
            return Err(anyhow!("Hugging Face API error ({}): {}", status, message));
        }

        let parsed: ClassifyResponse = response.json().await?;
        Ok(parsed.into_batch())
    }
}
