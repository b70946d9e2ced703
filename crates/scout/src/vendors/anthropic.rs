//! Anthropic messages API used as the reranking capability

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;

use super::{RerankCandidate, RerankJudgement, RerankProvider};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicReranker {
  client: Client,
  endpoint: String,
  api_key: String,
  model: String,
  max_tokens: usize,
}

impl AnthropicReranker {
  pub fn new(api_key: &str, base_url: &str, model: &str, max_tokens: usize, timeout: Duration) -> Result<Self> {
    anyhow::ensure!(!api_key.trim().is_empty(), "missing rerank API key");
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .context("failed to build rerank HTTP client")?;

    Ok(Self {
      client,
      endpoint: format!("{}/v1/messages", base_url.trim_end_matches('/')),
      api_key: api_key.trim().to_string(),
      model: model.to_string(),
      max_tokens,
    })
  }

  fn headers(&self) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert("x-api-key", HeaderValue::from_str(&self.api_key).context("invalid rerank API key")?);
    headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
  }
}

/// Prompt asking for a strict JSON ordering of every candidate
pub fn build_prompt(query: &str, candidates: &[RerankCandidate]) -> String {
  let mut prompt = String::new();
  let _ = writeln!(prompt, "You are ranking candidate profiles for a recruiting search.");
  let _ = writeln!(prompt, "Search: {}", query.trim());
  let _ = writeln!(prompt);
  let _ = writeln!(prompt, "Candidates:");
  for candidate in candidates {
    let _ = writeln!(prompt, "[{}] {}", candidate.index, candidate.summary);
  }
  let _ = writeln!(prompt);
  let _ = writeln!(
    prompt,
    "Order ALL {} candidates from most to least relevant. Reply with JSON only, in the form \
     {{\"ranking\":[{{\"index\":<candidate number>,\"score\":<0.0-1.0>,\"rationale\":\"<one sentence>\"}}]}}.",
    candidates.len()
  );
  prompt
}

#[derive(Debug, Deserialize)]
struct RankingEnvelope {
  ranking: Vec<RerankJudgement>,
}

/// Pull the ranking out of a model reply, tolerating code fences and prose
pub fn parse_ranking(reply: &str) -> Result<Vec<RerankJudgement>> {
  let start = reply.find('{').context("rerank reply contains no JSON object")?;
  let end = reply.rfind('}').context("rerank reply contains no JSON object")?;
  if end < start {
    bail!("rerank reply JSON is malformed");
  }
  let envelope: RankingEnvelope =
    serde_json::from_str(&reply[start..=end]).context("rerank reply is not a ranking object")?;
  Ok(envelope.ranking)
}

#[async_trait]
impl RerankProvider for AnthropicReranker {
  async fn rank(&self, query: &str, candidates: &[RerankCandidate]) -> Result<Vec<RerankJudgement>> {
    let prompt = build_prompt(query, candidates);
    let body = MessagesRequest {
      model: &self.model,
      max_tokens: self.max_tokens,
      temperature: 0.0,
      messages: vec![Message { role: "user", content: vec![ContentBlock { kind: "text", text: &prompt }] }],
    };

    let resp = self
      .client
      .post(&self.endpoint)
      .headers(self.headers()?)
      .json(&body)
      .send()
      .await
      .context("failed to call rerank messages API")?;

    if !resp.status().is_success() {
      let status = resp.status();
      let text = resp.text().await.unwrap_or_else(|_| "<body unavailable>".to_string());
      bail!("rerank API returned {}: {}", status, text);
    }

    let parsed: MessagesResponse = resp.json().await.context("failed to parse rerank response")?;
    let reply = parsed
      .content
      .into_iter()
      .filter_map(|block| match block {
        ResponseBlock::Text { text } => Some(text),
        ResponseBlock::Other => None,
      })
      .collect::<Vec<_>>()
      .join("\n");
    if reply.is_empty() {
      bail!("rerank response missing text content");
    }

    parse_ranking(&reply)
  }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
  model: &'a str,
  max_tokens: usize,
  temperature: f32,
  messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
  role: &'a str,
  content: Vec<ContentBlock<'a>>,
}

#[derive(Serialize)]
struct ContentBlock<'a> {
  #[serde(rename = "type")]
  kind: &'a str,
  text: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
  content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
  Text { text: String },
  #[serde(other)]
  Other,
}
