//! GitHub code-search example source
//!
//! Best-effort: research proceeds without augmentation when this fails.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{CodeExample, ExampleSource, ProviderError};

const GITHUB_API_BASE: &str = "https://api.github.com";

/// Maximum bytes of a fetched example kept per match
const MAX_EXAMPLE_BYTES: usize = 4096;

/// Code-example lookup backed by the GitHub search API
#[derive(Clone)]
pub struct GithubExamples {
    client: Arc<Client>,
    /// Optional token; unauthenticated search works with tight rate limits
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    name: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    repository: Repository,
    #[serde(default)]
    html_url: String,
}

#[derive(Debug, Default, Deserialize)]
struct Repository {
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    description: Option<String>,
}

impl GithubExamples {
    pub fn new(token: Option<String>) -> Self {
        Self {
            client: Arc::new(Client::new()),
            token,
        }
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .get(url)
            .header("User-Agent", "autodidact")
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        builder
    }
}

#[async_trait]
impl ExampleSource for GithubExamples {
    async fn search_examples(
        &self,
        technology: &str,
        limit: usize,
    ) -> Result<Vec<CodeExample>, ProviderError> {
        let url = format!(
            "{}/search/repositories?q={}+in:name,description&sort=stars&per_page={}",
            GITHUB_API_BASE,
            urlencode(technology),
            limit.min(10)
        );

        let response = self
            .request(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 403 || status.as_u16() == 429 {
            warn!(technology, "GitHub search rate limited");
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            return Err(ProviderError::Api(format!("GitHub search returned {}", status)));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let examples: Vec<CodeExample> = parsed
            .items
            .into_iter()
            .take(limit)
            .map(|item| {
                let mut content = item
                    .repository
                    .description
                    .unwrap_or_default();
                if content.is_empty() {
                    content = format!("{}/{}", item.repository.full_name, item.path);
                }
                if content.len() > MAX_EXAMPLE_BYTES {
                    let mut end = MAX_EXAMPLE_BYTES;
                    while !content.is_char_boundary(end) {
                        end -= 1;
                    }
                    content.truncate(end);
                }
                CodeExample {
                    source: if item.html_url.is_empty() {
                        format!("{} ({})", item.repository.full_name, item.name)
                    } else {
                        item.html_url
                    },
                    content,
                }
            })
            .collect();

        debug!(technology, count = examples.len(), "GitHub examples fetched");
        Ok(examples)
    }
}

/// Percent-encode the handful of characters that matter in a search query
fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => out.push(ch),
            ' ' => out.push('+'),
            other => {
                let mut buf = [0u8; 4];
                for byte in other.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("%{:02X}", byte));
                }
            }
        }
    }
    out
}
