//! OpenAI-compatible interpreter.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM, and any endpoint exposing a
//! `/v1/chat/completions`-shaped API. Interpretation runs at temperature 0
//! and re-prompts up to twice when the model emits something that does not
//! parse; after that it degrades to an `other` intent rather than failing
//! the turn unstructured.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use innkeeper_core::{
    ConstraintDelta, Constraints, Intent, Interpretation, Reasoner, ReasonerError,
};

use crate::extract::extract_first_json_object;
use crate::prompt::{INTERPRET_SYSTEM_PROMPT, INTERPRET_TEMPLATE, RETRY_SUFFIX};

const PARSE_ATTEMPTS: usize = 3;

/// An OpenAI-compatible reasoning capability.
pub struct OpenAiCompatReasoner {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatReasoner {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        }
    }

    /// Convenience constructor for the hosted OpenAI endpoint.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key, model)
    }

    async fn complete(&self, user_prompt: &str) -> Result<String, ReasonerError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": INTERPRET_SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt},
            ],
            "temperature": 0.0,
            "stream": false,
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ReasonerError::Timeout(e.to_string())
                } else {
                    ReasonerError::Network(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ReasonerError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        let api: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ReasonerError::Network(format!("invalid response body: {e}")))?;
        api.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ReasonerError::ApiError {
                status_code: status.as_u16(),
                message: "response carried no choices".into(),
            })
    }
}

#[async_trait]
impl Reasoner for OpenAiCompatReasoner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn interpret(
        &self,
        message: &str,
        constraints: &Constraints,
    ) -> Result<Interpretation, ReasonerError> {
        let state_json = json!({
            "today_utc": Utc::now().date_naive(),
            "constraints": constraints,
        });
        let base_prompt = INTERPRET_TEMPLATE
            .replace("{user_message}", message)
            .replace("{state_json}", &state_json.to_string());

        let mut prompt = base_prompt.clone();
        for attempt in 0..PARSE_ATTEMPTS {
            let raw = self.complete(&prompt).await?;
            match parse_interpretation(&raw) {
                Some(interp) => {
                    debug!(intent = ?interp.intent, attempt, "Interpretation parsed");
                    return Ok(interp);
                }
                None => {
                    warn!(attempt, "Model output did not parse as an interpretation");
                    prompt = format!("{base_prompt}{RETRY_SUFFIX}");
                }
            }
        }

        // Total contract: degrade to `other` rather than failing unstructured.
        warn!("Interpretation unparseable after retries — degrading to `other`");
        Ok(Interpretation::other())
    }
}

/// The raw interpretation document emitted by the model.
#[derive(Debug, Deserialize)]
struct RawInterpretation {
    intent: String,
    #[serde(default)]
    constraints_update: Option<ConstraintDelta>,
    #[serde(default)]
    offer_id: Option<String>,
    #[serde(default)]
    selection_hint: Option<String>,
}

fn parse_interpretation(raw: &str) -> Option<Interpretation> {
    let obj = extract_first_json_object(raw)?;
    let parsed: RawInterpretation = serde_json::from_str(obj).ok()?;

    let intent = match parsed.intent.as_str() {
        "provide_info" => Intent::ProvideInfo,
        "select_offer" => Intent::SelectOffer,
        "cancel" => Intent::Cancel,
        "other" => Intent::Other,
        _ => return None,
    };

    // Some models emit offer_id: "" when nothing is selected; normalize.
    let selected_offer_id = parsed.offer_id.filter(|id| !id.trim().is_empty());

    Some(Interpretation {
        intent,
        delta: parsed.constraints_update.unwrap_or_default(),
        selected_offer_id,
        selection_hint: parsed.selection_hint.filter(|h| !h.trim().is_empty()),
    })
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    content: String,
}
