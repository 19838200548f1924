//! # Word Grouping
//!
//! Splits a vocabulary list into small study groups using a chat completion
//! model.
//!
//! ## Proxy
//! The frontend never talks to the model directly. It posts the words here,
//! we build the prompt, ask for a JSON object response and relay the parsed
//! object back as-is.
//!
//! ## Contract
//! - Groups of 4 to 6 words
//! - Every input word in exactly one group
//! - Shape `{ "groups": [["word", ...], ...] }`
//!
//! The model is asked to honour this, we only check it and log deviations.
//! No retries, no fallback: an upstream failure is an internal error.
use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{config::Config, error::AppError};

pub const MIN_GROUP: usize = 4;
pub const MAX_GROUP: usize = 6;

#[async_trait]
pub trait Completions: Send + Sync {
    /// Raw message content of a JSON-mode completion for `prompt`.
    async fn complete_json(&self, prompt: &str) -> Result<String, AppError>;
}

pub struct OpenAiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn from_config(config: &Config) -> Option<Self> {
        let api_key = config.openai_key.clone()?;

        Some(Self {
            http: Client::new(),
            base_url: config.openai_url.trim_end_matches('/').to_string(),
            model: config.openai_model.clone(),
            api_key,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl Completions for OpenAiClient {
    async fn complete_json(&self, prompt: &str) -> Result<String, AppError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        info!("Sending grouping request to {}", self.model);

        let response: ChatResponse = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::internal("completion returned no content"))
    }
}

/// `{"words": [...]}`, a missing key counts as an empty list.
pub fn parse_words(payload: &Value) -> Result<Vec<String>, AppError> {
    let invalid = || AppError::Validation("Invalid input, expected a list of words".to_string());

    let Some(object) = payload.as_object() else {
        return Err(invalid());
    };

    match object.get("words") {
        None => Ok(Vec::new()),
        Some(Value::Array(words)) => words
            .iter()
            .map(|word| word.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(invalid),
        Some(_) => Err(invalid()),
    }
}

pub fn build_prompt(words: &[String]) -> Result<String, AppError> {
    let words = serde_json::to_string(words)?;

    Ok(format!(
        "You are a JSON generator. Your task is to group all of the given words into sets of \
         {MIN_GROUP}-{MAX_GROUP} items each.
Important rules:
1. Every word must appear in exactly one group.
2. No group may have fewer than {MIN_GROUP} or more than {MAX_GROUP} items.
3. Do not add or remove words.
4. Return valid JSON only, with no commentary, in this exact format:
{{
  \"groups\": [
    [\"word1\", \"word2\", \"word3\", \"word4\"],
    [\"word5\", \"word6\", \"word7\", \"word8\"]
  ]
}}

Words to group: {words}"
    ))
}

/// Every way `result` breaks the grouping contract for `words`.
pub fn check_groups(words: &[String], result: &Value) -> Vec<String> {
    let Some(groups) = result.get("groups").and_then(Value::as_array) else {
        return vec!["missing \"groups\" array".to_string()];
    };

    let mut problems = Vec::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for (index, group) in groups.iter().enumerate() {
        let Some(group) = group.as_array() else {
            problems.push(format!("group {index} is not an array"));
            continue;
        };

        if !(MIN_GROUP..=MAX_GROUP).contains(&group.len()) {
            problems.push(format!("group {index} has {} words", group.len()));
        }

        for word in group {
            match word.as_str() {
                Some(word) => *seen.entry(word).or_default() += 1,
                None => problems.push(format!("group {index} holds a non-string")),
            }
        }
    }

    let mut expected: HashMap<&str, usize> = HashMap::new();
    for word in words {
        *expected.entry(word.as_str()).or_default() += 1;
    }

    for (word, count) in &expected {
        match seen.get(word).copied().unwrap_or(0) {
            0 => problems.push(format!("\"{word}\" is missing")),
            n if n != *count => problems.push(format!("\"{word}\" appears {n} times")),
            _ => {}
        }
    }

    for word in seen.keys() {
        if !expected.contains_key(word) {
            problems.push(format!("\"{word}\" was not in the input"));
        }
    }

    problems
}

pub async fn group_words(completions: &dyn Completions, words: &[String]) -> Result<Value, AppError> {
    debug!("Grouping {} words", words.len());

    let prompt = build_prompt(words)?;
    let content = completions.complete_json(&prompt).await?;
    let result: Value = serde_json::from_str(&content)?;

    for problem in check_groups(words, &result) {
        warn!("Grouping deviates from request: {problem}");
    }

    Ok(result)
}
