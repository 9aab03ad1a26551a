//! Entailment classification: score a (premise, hypothesis) pair as
//! entailment, contradiction, or neutral.
//!
//! The classifier is a black box reached through [`EntailmentClassifier`].
//! [`HttpEntailmentClassifier`] talks to a hosted text-classification endpoint
//! (Hugging Face Inference API compatible); [`MockEntailmentClassifier`] is a
//! scripted stand-in for tests and offline runs.

use crate::error::ClassifierError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// One entry of a classifier's label distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    /// Raw label as reported by the model, e.g. `ENTAILMENT` or `neutral`.
    pub label: String,
    pub score: f32,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Trait for entailment classifiers.
#[async_trait]
pub trait EntailmentClassifier: Send + Sync {
    /// Classify whether `premise` entails `hypothesis`.
    ///
    /// Returns the full label distribution in the model's own order.
    async fn classify(
        &self,
        premise: &str,
        hypothesis: &str,
    ) -> Result<Vec<LabelScore>, ClassifierError>;

    /// Return the model name.
    fn model_name(&self) -> &str;

    /// Classify a fixed probe pair to confirm the model is reachable.
    async fn health_check(&self) -> Result<(), ClassifierError> {
        self.classify(
            "Large language models sometimes generate false statements.",
            "Language models can produce false statements.",
        )
        .await
        .map(|_| ())
    }
}

/// Configuration for the entailment classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Provider name: "http" (default) or "mock".
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Base URL of the inference endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model identifier appended to the endpoint path.
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the bearer token, if any.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "http".into()
}

fn default_endpoint() -> String {
    "https://api-inference.huggingface.co".into()
}

fn default_model() -> String {
    "facebook/bart-large-mnli".into()
}

fn default_api_key_env() -> String {
    "HF_API_TOKEN".into()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Classifier backed by a hosted text-classification endpoint.
///
/// Sends `POST {endpoint}/models/{model}` with
/// `{"inputs": {"text": premise, "text_pair": hypothesis}}` and accepts either
/// a flat `[{label, score}, ...]` response or one nested one level deep.
pub struct HttpEntailmentClassifier {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEntailmentClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClassifierError::Unavailable {
                provider: "http".into(),
                message: format!("failed to build HTTP client: {}", e),
            })?;
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        Ok(Self {
            client,
            url: format!(
                "{}/models/{}",
                config.endpoint.trim_end_matches('/'),
                config.model
            ),
            model: config.model.clone(),
            api_key,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn unavailable(&self, message: impl Into<String>) -> ClassifierError {
        ClassifierError::Unavailable {
            provider: format!("http:{}", self.model),
            message: message.into(),
        }
    }
}

#[async_trait]
impl EntailmentClassifier for HttpEntailmentClassifier {
    async fn classify(
        &self,
        premise: &str,
        hypothesis: &str,
    ) -> Result<Vec<LabelScore>, ClassifierError> {
        let body = serde_json::json!({
            "inputs": { "text": premise, "text_pair": hypothesis },
            "parameters": { "top_k": 3 },
        });

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED
                | StatusCode::FORBIDDEN
                | StatusCode::NOT_FOUND
                | StatusCode::SERVICE_UNAVAILABLE => {
                    self.unavailable(format!("HTTP {}: {}", status, detail))
                }
                _ => ClassifierError::Inference {
                    message: format!("HTTP {}: {}", status, detail),
                },
            });
        }

        let json: serde_json::Value =
            resp.json()
                .await
                .map_err(|e| ClassifierError::ResponseParse {
                    message: e.to_string(),
                })?;
        parse_distribution(&json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Parse `[{label, score}, ...]` or `[[{label, score}, ...]]`.
pub fn parse_distribution(json: &serde_json::Value) -> Result<Vec<LabelScore>, ClassifierError> {
    let outer = json.as_array().ok_or_else(|| ClassifierError::ResponseParse {
        message: "expected a JSON array".into(),
    })?;

    let entries = match outer.first() {
        Some(serde_json::Value::Array(inner)) => inner,
        _ => outer,
    };

    let scores: Vec<LabelScore> = entries
        .iter()
        .map(|e| serde_json::from_value::<LabelScore>(e.clone()))
        .collect::<Result<_, _>>()
        .map_err(|e| ClassifierError::ResponseParse {
            message: e.to_string(),
        })?;

    if scores.is_empty() {
        return Err(ClassifierError::ResponseParse {
            message: "empty label distribution".into(),
        });
    }
    Ok(scores)
}

/// Scripted classifier for tests and offline runs.
///
/// Distributions are keyed by premise; unknown premises receive the default
/// distribution. Premises registered with [`fail_on`](Self::fail_on) yield an
/// inference error, and an unavailable mock fails every call.
pub struct MockEntailmentClassifier {
    responses: HashMap<String, Vec<LabelScore>>,
    failing: Vec<String>,
    default: Vec<LabelScore>,
    available: bool,
    calls: Mutex<Vec<(String, String)>>,
}

impl Default for MockEntailmentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEntailmentClassifier {
    /// A mock that answers "mostly neutral" for every pair.
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            failing: Vec::new(),
            default: vec![
                LabelScore::new("NEUTRAL", 0.8),
                LabelScore::new("ENTAILMENT", 0.1),
                LabelScore::new("CONTRADICTION", 0.1),
            ],
            available: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A mock whose model can never be reached.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn with_default(mut self, scores: Vec<LabelScore>) -> Self {
        self.default = scores;
        self
    }

    pub fn with_response(mut self, premise: impl Into<String>, scores: Vec<LabelScore>) -> Self {
        self.responses.insert(premise.into(), scores);
        self
    }

    pub fn fail_on(mut self, premise: impl Into<String>) -> Self {
        self.failing.push(premise.into());
        self
    }

    /// Every (premise, hypothesis) pair classified so far, in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EntailmentClassifier for MockEntailmentClassifier {
    async fn classify(
        &self,
        premise: &str,
        hypothesis: &str,
    ) -> Result<Vec<LabelScore>, ClassifierError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((premise.to_string(), hypothesis.to_string()));
        }
        if !self.available {
            return Err(ClassifierError::Unavailable {
                provider: "mock".into(),
                message: "model not loaded".into(),
            });
        }
        if self.failing.iter().any(|p| p == premise) {
            return Err(ClassifierError::Inference {
                message: format!("scripted failure for premise '{}'", premise),
            });
        }
        Ok(self
            .responses
            .get(premise)
            .cloned()
            .unwrap_or_else(|| self.default.clone()))
    }

    fn model_name(&self) -> &str {
        "mock-nli"
    }
}

/// Factory function to create a classifier based on configuration.
pub fn create_classifier(
    config: &ClassifierConfig,
) -> Result<std::sync::Arc<dyn EntailmentClassifier>, ClassifierError> {
    match config.provider.as_str() {
        "http" => Ok(std::sync::Arc::new(HttpEntailmentClassifier::new(config)?)),
        "mock" => {
            tracing::warn!("Using the mock entailment classifier; verdicts are not meaningful");
            Ok(std::sync::Arc::new(MockEntailmentClassifier::new()))
        }
        other => Err(ClassifierError::Unavailable {
            provider: other.to_string(),
            message: "unknown classifier provider".into(),
        }),
    }
}
