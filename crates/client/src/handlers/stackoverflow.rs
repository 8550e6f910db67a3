//! Stack Overflow question handler, backed by the Stack Exchange API.
//!
//! The API returns clean markdown for questions and answers, which beats
//! scraping the rendered page. The anonymous quota is small, so the
//! handler enforces a client-side per-minute budget and hands the request
//! back to the generic path once the budget is spent.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use readgate_core::{AppConfig, Engine, ExtractionResult, RateLimiter};
use regex::Regex;
use url::Url;
use serde::Deserialize;

use super::{DomainHandler, HandlerError};
use crate::text::truncate_code_blocks;

const STACK_EXCHANGE_API: &str = "https://api.stackexchange.com/2.3";
const RATE_LIMIT_KEY: &str = "stackoverflow";
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

static QUESTION_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/questions/(\d+)\b").expect("invalid regex"));

#[derive(Debug, Deserialize)]
struct ApiResponse {
    items: Vec<ApiItem>,
}

#[derive(Debug, Deserialize)]
struct ApiItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body_markdown: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    owner: Option<Owner>,
}

#[derive(Debug, Deserialize)]
struct Owner {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    user_id: Option<u64>,
}

impl ApiItem {
    fn author(&self) -> Option<String> {
        let owner = self.owner.as_ref()?;
        owner
            .display_name
            .clone()
            .or_else(|| owner.user_id.map(|id| id.to_string()))
    }

    /// Markdown body when available, HTML body otherwise.
    fn content(&self) -> Option<(&str, bool)> {
        if let Some(md) = self.body_markdown.as_deref() {
            return Some((md, false));
        }
        self.body.as_deref().map(|html| (html, true))
    }
}

pub struct StackOverflowHandler {
    http: reqwest::Client,
    limiter: Arc<RateLimiter>,
    timeout: Duration,
    max_rpm: usize,
    top_answers: usize,
    api_key: Option<String>,
}

impl StackOverflowHandler {
    pub fn new(config: &AppConfig, limiter: Arc<RateLimiter>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .use_rustls_tls()
            .gzip(true)
            .build()?;
        Ok(Self {
            http,
            limiter,
            timeout: config.fetch_timeout(),
            max_rpm: config.stackoverflow_max_rpm,
            top_answers: config.stackoverflow_top_answers,
            api_key: config.stackexchange_key.clone(),
        })
    }

    fn api_url(&self, question_id: &str, answers: bool) -> Result<Url, HandlerError> {
        let path = if answers {
            format!("{STACK_EXCHANGE_API}/questions/{question_id}/answers")
        } else {
            format!("{STACK_EXCHANGE_API}/questions/{question_id}")
        };
        let mut url = Url::parse(&path).map_err(|e| HandlerError::Payload(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("site", "stackoverflow").append_pair("filter", "withbody");
            if answers {
                query.append_pair("sort", "votes").append_pair("pagesize", "50");
            }
            if let Some(key) = &self.api_key {
                query.append_pair("key", key);
            }
        }
        Ok(url)
    }

    async fn fetch(&self, url: Url) -> Result<ApiResponse, HandlerError> {
        let request = self.http.get(url).send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| HandlerError::Network("stackexchange request timed out".to_string()))?
            .map_err(|e| HandlerError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HandlerError::Status(status));
        }

        tokio::time::timeout(self.timeout, response.json())
            .await
            .map_err(|_| HandlerError::Network("stackexchange body read timed out".to_string()))?
            .map_err(|e| HandlerError::Payload(e.to_string()))
    }

    fn format(&self, question: &ApiResponse, answers: &ApiResponse) -> ExtractionResult {
        let question_item = question.items.first();
        let title = question_item
            .and_then(|q| q.title.clone())
            .unwrap_or_else(|| "StackOverflow Question".to_string());

        let mut parts = Vec::new();
        if let Some((body, is_html)) = question_item.and_then(ApiItem::content) {
            let heading = if is_html { "# Question (HTML)" } else { "# Question" };
            parts.push(format!("{heading}\n{}", truncate_code_blocks(body)));
        }

        let top_answers = &answers.items[..answers.items.len().min(self.top_answers)];
        for (i, answer) in top_answers.iter().enumerate() {
            if let Some((body, is_html)) = answer.content() {
                let suffix = if is_html { " (HTML)" } else { "" };
                parts.push(format!(
                    "\n## Answer {}{suffix}\n{}",
                    i + 1,
                    truncate_code_blocks(body)
                ));
            }
        }

        let text = parts.join("\n");

        let mut authors: HashSet<String> =
            answers.items.iter().filter_map(ApiItem::author).collect();
        if let Some(author) = question_item.and_then(ApiItem::author) {
            authors.insert(author);
        }

        let question_bonus = if question.items.is_empty() { 0.0 } else { 200.0 };
        let score = question_bonus
            + top_answers.len() as f64 * 180.0
            + authors.len() as f64 * 120.0
            + text.chars().count() as f64 * 0.45;

        ExtractionResult {
            title,
            text,
            engine: Engine::StackoverflowApi,
            score,
            cached: false,
            render_ms: None,
        }
    }
}

fn question_id(url: &Url) -> Option<&str> {
    QUESTION_PATH_RE
        .captures(url.path())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[async_trait]
impl DomainHandler for StackOverflowHandler {
    fn name(&self) -> &'static str {
        "stackoverflow"
    }

    fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else { return false };
        let host_ok = host == "stackoverflow.com" || host.ends_with(".stackoverflow.com");
        host_ok && question_id(url).is_some()
    }

    async fn handle(&self, url: &Url) -> Result<ExtractionResult, HandlerError> {
        let id = question_id(url)
            .ok_or_else(|| HandlerError::Payload("no question id in path".to_string()))?;

        if !self.limiter.can_proceed(RATE_LIMIT_KEY, self.max_rpm, RATE_LIMIT_WINDOW) {
            return Err(HandlerError::RateLimited(RATE_LIMIT_KEY));
        }

        tracing::debug!(question_id = id, "fetching stackexchange question");
        let question = self.fetch(self.api_url(id, false)?).await?;
        let answers = self.fetch(self.api_url(id, true)?).await?;
        Ok(self.format(&question, &answers))
    }
}
