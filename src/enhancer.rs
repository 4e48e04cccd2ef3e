//! LLM enhancer boundary: free text in, raw plan JSON out.
//!
//! The endpoint and credential are opaque configuration; any transport,
//! status, or decode failure collapses into `ENHANCER_UNAVAILABLE`, which
//! the orchestrator absorbs by falling back. With no endpoint configured the
//! pipeline runs fully offline on templates.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde_json::json;
use url::Url;

use crate::errors::CodedError;
use crate::schema::{ActionKind, ObjectKind, RawPlan};

pub const ENV_ENDPOINT: &str = "PLANC_ENHANCER_URL";
pub const ENV_API_KEY: &str = "PLANC_ENHANCER_KEY";
pub const ENV_MODEL: &str = "PLANC_ENHANCER_MODEL";
pub const ENV_TIMEOUT_SECS: &str = "PLANC_ENHANCER_TIMEOUT_SECS";

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct EnhancerConfig {
    pub endpoint: Url,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl EnhancerConfig {
    /// Reads the externally provided endpoint configuration. `None` when no
    /// endpoint is set; an unparseable endpoint is a usage error rather
    /// than a silent offline fallback.
    pub fn from_env() -> Result<Option<Self>> {
        let Ok(raw_endpoint) = std::env::var(ENV_ENDPOINT) else {
            return Ok(None);
        };
        let endpoint = Url::parse(&raw_endpoint).map_err(|error| {
            anyhow!(CodedError::usage(format!(
                "invalid {ENV_ENDPOINT} '{raw_endpoint}': {error}"
            )))
        })?;
        let api_key = std::env::var(ENV_API_KEY).ok().filter(|key| !key.is_empty());
        let model = std::env::var(ENV_MODEL).unwrap_or_else(|_| DEFAULT_MODEL.to_owned());
        let timeout_secs = std::env::var(ENV_TIMEOUT_SECS)
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Ok(Some(Self {
            endpoint,
            api_key,
            model,
            timeout: Duration::from_secs(timeout_secs),
        }))
    }
}

#[derive(Debug)]
pub struct Enhancer {
    config: EnhancerConfig,
    http: Client,
}

impl Enhancer {
    pub fn new(config: EnhancerConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build enhancer http client")?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> Result<Option<Self>> {
        match EnhancerConfig::from_env()? {
            Some(config) => Ok(Some(Self::new(config)?)),
            None => Ok(None),
        }
    }

    /// Converts free text into a raw plan. Bounded retries; every failure
    /// mode folds into the recoverable `ENHANCER_UNAVAILABLE` code.
    pub fn enhance(&self, text: &str) -> Result<RawPlan> {
        let prompt = build_prompt(text);
        let mut last_problem = String::from("no attempts made");

        for attempt in 1..=ATTEMPTS {
            match self.call_once(&prompt) {
                Ok(plan) => return Ok(plan),
                Err(problem) => {
                    eprintln!("enhancer attempt {attempt}/{ATTEMPTS} failed: {problem}");
                    last_problem = problem;
                }
            }
        }

        Err(anyhow!(CodedError::enhancer_unavailable(format!(
            "enhancer failed after {ATTEMPTS} attempt(s): {last_problem}"
        ))))
    }

    fn call_once(&self, prompt: &str) -> std::result::Result<RawPlan, String> {
        let mut request = self
            .http
            .post(self.config.endpoint.clone())
            .json(&json!({ "model": self.config.model, "prompt": prompt }));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().map_err(|error| format!("request failed: {error}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("endpoint returned status {status}"));
        }
        let body = response
            .text()
            .map_err(|error| format!("failed to read response body: {error}"))?;

        let block = extract_json_block(&body)
            .ok_or_else(|| "response contained no JSON object".to_owned())?;
        serde_json::from_str::<RawPlan>(&block)
            .map_err(|error| format!("response JSON did not decode as a plan: {error}"))
    }
}

/// The instruction names the exact closed enum sets, so the prompt can never
/// drift from the schema the validator enforces.
fn build_prompt(text: &str) -> String {
    let object_kinds = ObjectKind::ALL
        .iter()
        .map(|kind| kind.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let action_kinds = ActionKind::ALL
        .iter()
        .map(|kind| kind.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Output ONLY valid JSON, no markdown and no surrounding text.\n\
         Schema: {{\"title\": string, \"objects\": [{{\"id\": string, \"type\": one of [{object_kinds}], \"params\": object}}], \
         \"actions\": [{{\"type\": one of [{action_kinds}], \"target\": object id, \"params\": object}}], \
         \"hints\": [string]}}\n\
         If you cannot produce valid JSON, output {{}}.\n\n\
         User request:\n{text}"
    )
}

/// Brace-depth scan that tolerates markdown fences and surrounding prose;
/// returns the first balanced object that parses as JSON.
pub fn extract_json_block(text: &str) -> Option<String> {
    let stripped = text.replace("```json", "").replace("```", "");
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        return None;
    }

    let bytes = trimmed.as_bytes();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (index, byte) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if *byte == b'\\' {
                escaped = true;
            } else if *byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = Some(index);
                }
                depth += 1;
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some(begin) = start {
                        let candidate = &trimmed[begin..=index];
                        if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
                            return Some(candidate.to_owned());
                        }
                        start = None;
                    }
                }
            }
            _ => {}
        }
    }

    None
}
