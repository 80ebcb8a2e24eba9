use serde::{Deserialize, Serialize};

use crate::traits::ClassScore;

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyRequest<'a> {
    pub inputs: &'a [String],
    pub parameters: ClassifyParameters,
    pub options: RequestOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyParameters {
    /// Unset returns the full distribution instead of only the arg-max class.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    pub truncation: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestOptions {
    pub wait_for_model: bool,
    pub use_cache: bool,
}

/// The endpoint answers a batch with a list of distributions, but a
/// single-input request may come back flat.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ClassifyResponse {
    Batch(Vec<Vec<ClassScore>>),
    Single(Vec<ClassScore>),
}

impl ClassifyResponse {
    pub fn into_batch(self) -> Vec<Vec<ClassScore>> {
        match self {
            ClassifyResponse::Batch(batch) => batch,
            ClassifyResponse::Single(single) => vec![single],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub estimated_time: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_batch_response() {
        let json = r#"[[{"label":"POS","score":0.9},{"label":"NEG","score":0.1}],
                       [{"label":"NEU","score":0.7},{"label":"POS","score":0.3}]]"#;
        let parsed: ClassifyResponse = serde_json::from_str(json).unwrap();
        let batch = parsed.into_batch();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1][0].label, "NEU");
    }

    #[test]
    fn parses_flat_single_response() {
        let json = r#"[{"label":"NEG","score":0.8},{"label":"POS","score":0.2}]"#;
        let parsed: ClassifyResponse = serde_json::from_str(json).unwrap();
        let batch = parsed.into_batch();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].len(), 2);
    }

    #[test]
    fn parses_loading_error() {
        let json = r#"{"error":"Model is currently loading","estimated_time":20.0}"#;
        let parsed: ErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.estimated_time, Some(20.0));
    }
}
