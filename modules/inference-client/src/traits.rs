use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// Class Scores
// =============================================================================

/// One class of a classifier's output distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScore {
    pub label: String,
    pub score: f32,
}

impl ClassScore {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

// =============================================================================
// TextClassifier Trait
// =============================================================================

#[async_trait]
pub trait TextClassifier: Send + Sync {
    /// Make sure the model is loaded and reachable. Called once before the
    /// first classification; an error marks the model unavailable.
    async fn warm_up(&self) -> Result<()> {
        Ok(())
    }

    /// Classify a batch of texts. Returns one distribution per input, in order.
    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<Vec<ClassScore>>>;

    /// Model identifier (for logging).
    fn model_name(&self) -> &str;
}
