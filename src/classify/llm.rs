//! LLM-backed classifier over an OpenAI-compatible chat completions API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{ClassifyError, Classifier, HierarchyCache};
use crate::models::{document::UNKNOWN_IDENTIFIER, Identifiers};

/// Classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API.
    pub endpoint: String,
    /// API key; empty disables the Authorization header.
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    /// Hierarchy cache refresh interval in seconds.
    #[serde(default = "default_hierarchy_ttl")]
    pub hierarchy_ttl_secs: u64,
    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_hierarchy_ttl() -> u64 {
    600
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            hierarchy_ttl_secs: default_hierarchy_ttl(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Classifier backed by a chat completion model, with the hierarchy
/// cache injected as a collaborator.
pub struct LlmClassifier {
    config: LlmConfig,
    client: Client,
    hierarchy: HierarchyCache,
}

impl LlmClassifier {
    pub fn new(config: LlmConfig, hierarchy: HierarchyCache) -> Result<Self, ClassifyError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ClassifyError::Connection(e.to_string()))?;
        Ok(Self {
            config,
            client,
            hierarchy,
        })
    }

    async fn chat(&self, system: &str, user: String) -> Result<String, ClassifyError> {
        let url = format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
        };

        let mut builder = self.client.post(&url).json(&request);
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| ClassifyError::Connection(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ClassifyError::Api(format!("HTTP {}", resp.status())));
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ClassifyError::Parse(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ClassifyError::Parse("empty choices".to_string()))
    }
}

/// Strip markdown code fences some models wrap JSON in.
fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, text: &str) -> Result<Value, ClassifyError> {
        let hierarchy = self
            .hierarchy
            .prompt_lines()
            .await
            .map_err(|e| ClassifyError::Api(e.to_string()))?;

        let prompt = format!(
            "You are an insurance-document classifier. ONLY use a combination present below.\n\
             Hierarchy (do NOT invent new names):\n{hierarchy}\n\n\
             Classify the document and return valid JSON:\n\
             {{\n \"department\": \"...\",\n \"category\": \"...\",\n \"subcategory\": \"...\",\n \
             \"summary\": \"single paragraph; clauses separated by semicolons.\",\n \
             \"action_items\": [\"First item\", \"Second item\"]\n}}\n\n\
             Document Text:\n\"\"\"{text}\"\"\""
        );

        let content = self
            .chat("Return ONLY the JSON object. No markdown.", prompt)
            .await?;
        debug!(raw = %content, "classifier raw output");

        serde_json::from_str(strip_fences(&content)).map_err(|e| ClassifyError::Parse(e.to_string()))
    }

    async fn extract_metadata(
        &self,
        subject: &str,
        body: &str,
        attachment_text: &str,
    ) -> Identifiers {
        let prompt = format!(
            "You are an assistant that extracts insurance metadata from text. \
             Respond with exactly one JSON object and nothing else, using these keys: \
             \"account_number\", \"policyholder_name\", \"policy_number\", \"claim_number\". \
             Use \"{UNKNOWN_IDENTIFIER}\" if a field is missing or empty.\n\
             Labels to recognize:\n\
             - account_number: Account, Acct, Account Number, Acct No, Account#, Acct#, \
               Group Number, Group No, Group#\n\
             - policyholder_name: Policyholder, Policy Holder, Policyholder Name, Group Name\n\n\
             Subject: {subject}\nBody: {body}\nAttachment text: {attachment_text}"
        );

        let parsed = match self
            .chat("Return ONLY the JSON object. No markdown.", prompt)
            .await
        {
            Ok(content) => serde_json::from_str::<Value>(strip_fences(&content)).ok(),
            Err(e) => {
                warn!("metadata extraction failed: {e}");
                None
            }
        };

        let field = |value: &Option<Value>, key: &str| -> String {
            value
                .as_ref()
                .and_then(|v| v.get(key))
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .unwrap_or(UNKNOWN_IDENTIFIER)
                .to_string()
        };

        Identifiers {
            account_number: field(&parsed, "account_number"),
            policyholder_name: field(&parsed, "policyholder_name"),
            policy_number: field(&parsed, "policy_number"),
            claim_number: field(&parsed, "claim_number"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_fences("  {} "), "{}");
    }
}
