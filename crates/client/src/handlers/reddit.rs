//! Reddit thread handler.
//!
//! Reddit threads render poorly through generic extraction, but every
//! thread has a public JSON mirror at `<path>/.json`. The handler fetches
//! that, flattens the top comments plus their first-level replies, and
//! formats the result as Markdown.

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

const RATE_LIMIT_KEY: &str = "reddit";

static THREAD_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/comments/[A-Za-z0-9]+").expect("invalid regex"));

#[derive(Debug, Deserialize)]
struct Listing<T> {
    data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
struct ListingData<T> {
    children: Vec<Child<T>>,
}

#[derive(Debug, Deserialize)]
struct Child<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct Post {
    title: String,
    #[serde(default)]
    selftext: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    subreddit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Comment {
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    score: Option<i64>,
    #[serde(default)]
    replies: Replies,
}

/// Reddit encodes "no replies" as an empty string instead of a listing.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Replies {
    Listing(Listing<Comment>),
    Empty(String),
}

impl Default for Replies {
    fn default() -> Self {
        Replies::Empty(String::new())
    }
}

struct FlatComment {
    body: String,
    score: i64,
    author: Option<String>,
}

pub struct RedditHandler {
    http: reqwest::Client,
    limiter: Arc<RateLimiter>,
    min_interval: Duration,
    timeout: Duration,
    top_level_limit: usize,
    replies_per_top_limit: usize,
}

impl RedditHandler {
    pub fn new(config: &AppConfig, limiter: Arc<RateLimiter>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .use_rustls_tls()
            .gzip(true)
            .build()?;
        Ok(Self {
            http,
            limiter,
            min_interval: config.reddit_min_interval(),
            timeout: config.fetch_timeout(),
            top_level_limit: config.reddit_top_level_limit,
            replies_per_top_limit: config.reddit_replies_per_top_limit,
        })
    }

    /// Unauthenticated JSON access wants polite spacing rather than a
    /// request quota, so this uses the minimum-interval discipline. The
    /// reservation is atomic; a denied attempt sleeps out the returned
    /// wait and tries again, so concurrent requests queue up instead of
    /// firing together.
    async fn cooldown(&self) {
        loop {
            let wait = self.limiter.try_reserve(RATE_LIMIT_KEY, self.min_interval);
            if wait.is_zero() {
                return;
            }
            tracing::debug!(wait_ms = wait.as_millis() as u64, "reddit cooldown");
            tokio::time::sleep(wait).await;
        }
    }

    async fn fetch_thread(
        &self,
        json_url: &Url,
    ) -> Result<(Listing<Post>, Listing<Comment>), HandlerError> {
        let request = self.http.get(json_url.clone()).send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| HandlerError::Network("reddit request timed out".to_string()))?
            .map_err(|e| HandlerError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HandlerError::Status(status));
        }

        tokio::time::timeout(self.timeout, response.json())
            .await
            .map_err(|_| HandlerError::Network("reddit body read timed out".to_string()))?
            .map_err(|e| HandlerError::Payload(e.to_string()))
    }

    fn flatten(&self, comments: &Listing<Comment>) -> Vec<FlatComment> {
        let mut flat = Vec::new();
        for child in comments.data.children.iter().take(self.top_level_limit) {
            let comment = &child.data;
            let Some(body) = &comment.body else { continue };
            flat.push(FlatComment {
                body: truncate_code_blocks(body),
                score: comment.score.unwrap_or(0),
                author: comment.author.clone(),
            });
            if let Replies::Listing(replies) = &comment.replies {
                for reply in replies.data.children.iter().take(self.replies_per_top_limit) {
                    let Some(body) = &reply.data.body else { continue };
                    flat.push(FlatComment {
                        body: truncate_code_blocks(body),
                        score: reply.data.score.unwrap_or(0),
                        author: reply.data.author.clone(),
                    });
                }
            }
        }
        flat
    }

    fn format(&self, posts: &Listing<Post>, comments: &Listing<Comment>) -> ExtractionResult {
        let post = posts.data.children.first().map(|c| &c.data);
        let title = post
            .map(|p| p.title.clone())
            .unwrap_or_else(|| "Reddit Thread".to_string());

        let mut parts = vec![format!("# {title}")];
        if let Some(post) = post
            && let Some(selftext) = post.selftext.as_deref().filter(|s| !s.is_empty())
        {
            let author = post.author.as_deref().unwrap_or("[deleted]");
            let subreddit = post.subreddit.as_deref().unwrap_or("unknown");
            parts.push(format!(
                "_u/{author} in r/{subreddit}_\n\n{}",
                truncate_code_blocks(selftext)
            ));
        }

        let flat = self.flatten(comments);
        let authors: HashSet<&str> =
            flat.iter().filter_map(|c| c.author.as_deref()).collect();

        for (i, comment) in flat.iter().enumerate() {
            let author = comment.author.as_deref().unwrap_or("[deleted]");
            parts.push(format!(
                "\n## Comment {} (score:{}, by:{author})\n{}",
                i + 1,
                comment.score,
                comment.body
            ));
        }

        let text = parts.join("\n").trim().to_string();
        let vote_total: i64 = flat.iter().map(|c| c.score.max(0)).sum();
        let score = flat.len() as f64 * 100.0
            + vote_total as f64 * 2.0
            + authors.len() as f64 * 80.0
            + text.chars().count() as f64 * 0.3;

        ExtractionResult {
            title,
            text,
            engine: Engine::RedditJson,
            score,
            cached: false,
            render_ms: None,
        }
    }
}

/// `<path>/.json?raw_json=1&sort=top&limit=100&depth=2` on the canonical
/// www host, which serves threads regardless of the original subdomain.
fn json_url(url: &Url) -> Result<Url, HandlerError> {
    let mut json_url = url.clone();
    json_url
        .set_host(Some("www.reddit.com"))
        .map_err(|e| HandlerError::Payload(e.to_string()))?;

    let mut path = json_url.path().to_string();
    if !path.ends_with('/') {
        path.push('/');
    }
    path.push_str(".json");
    json_url.set_path(&path);

    json_url
        .query_pairs_mut()
        .clear()
        .append_pair("raw_json", "1")
        .append_pair("sort", "top")
        .append_pair("limit", "100")
        .append_pair("depth", "2");
    Ok(json_url)
}

#[async_trait]
impl DomainHandler for RedditHandler {
    fn name(&self) -> &'static str {
        "reddit"
    }

    fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else { return false };
        let host_ok = host == "reddit.com" || host.ends_with(".reddit.com");
        host_ok && THREAD_PATH_RE.is_match(url.path())
    }

    async fn handle(&self, url: &Url) -> Result<ExtractionResult, HandlerError> {
        let json_url = json_url(url)?;
        self.cooldown().await;
        tracing::debug!(url = %json_url, "fetching reddit thread json");
        let (posts, comments) = self.fetch_thread(&json_url).await?;
        Ok(self.format(&posts, &comments))
    }
}
