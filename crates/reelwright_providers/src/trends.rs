//! Trend discovery and the prompts that turn trends into ideas.

use crate::http::{classify_transport, decode_json};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use regex::Regex;
use reelwright_core::{ContentIdea, TopicCategory};
use reelwright_error::StageError;
use reelwright_stages::TrendSource;
use reqwest::Client;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::{debug, instrument};

const YOUTUBE_SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";

static JSON_ARRAY: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)\[.*\]").ok());

#[derive(Debug, Deserialize)]
struct SearchSnippet {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    snippet: Option<SearchSnippet>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

/// Most viewed recent videos from the YouTube search API.
#[derive(Clone)]
pub struct YouTubeTrendSource {
    client: Client,
    name: String,
    api_key: String,
    base_url: String,
    max_results: u32,
    window_days: i64,
}

impl std::fmt::Debug for YouTubeTrendSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YouTubeTrendSource")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("max_results", &self.max_results)
            .field("window_days", &self.window_days)
            .finish_non_exhaustive()
    }
}

impl YouTubeTrendSource {
    /// Search with an API key, `max_results` titles per query, over the
    /// last `window_days` days.
    pub fn new(
        name: impl Into<String>,
        api_key: impl Into<String>,
        max_results: u32,
        window_days: u32,
    ) -> Self {
        Self {
            client: Client::new(),
            name: name.into(),
            api_key: api_key.into(),
            base_url: YOUTUBE_SEARCH_URL.to_string(),
            max_results: max_results.clamp(1, 50),
            window_days: i64::from(window_days.max(1)),
        }
    }

    /// Point at a compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl TrendSource for YouTubeTrendSource {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, queries), fields(provider = %self.name, queries = queries.len()))]
    async fn trending_titles(&self, queries: &[String]) -> Result<Vec<String>, StageError> {
        let published_after = (Utc::now() - Duration::days(self.window_days))
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string();
        let max_results = self.max_results.to_string();

        let mut titles: Vec<String> = Vec::new();
        for query in queries {
            let response = self
                .client
                .get(&self.base_url)
                .query(&[
                    ("part", "snippet"),
                    ("q", query.as_str()),
                    ("order", "viewCount"),
                    ("type", "video"),
                    ("publishedAfter", published_after.as_str()),
                    ("maxResults", max_results.as_str()),
                    ("key", self.api_key.as_str()),
                ])
                .send()
                .await
                .map_err(|e| classify_transport(&self.name, &e))?;
            let body: SearchResponse = decode_json(&self.name, response).await?;

            for title in body.items.into_iter().filter_map(|item| item.snippet).map(|s| s.title) {
                let title = title.trim().to_string();
                if !title.is_empty() && !titles.contains(&title) {
                    debug!(query = %query, title = %title, "Found trend");
                    titles.push(title);
                }
            }
        }
        Ok(titles)
    }
}

#[derive(Debug, Deserialize)]
struct IdeaPayload {
    #[serde(default)]
    topic: String,
    #[serde(default)]
    theme: String,
    #[serde(default, alias = "hook_prompt")]
    hook: Option<String>,
    #[serde(default)]
    rationale: Option<String>,
}

/// Extract the list of ideas from a model reply.
///
/// The list may be bare or wrapped in an object such as `{"ideas": [...]}`.
/// Entries without a topic or theme are dropped.
///
/// # Errors
///
/// A reply without a JSON array, or one that does not decode, is terminal.
pub fn parse_ideas(provider: &str, content: &str) -> Result<Vec<ContentIdea>, StageError> {
    let json = JSON_ARRAY
        .as_ref()
        .and_then(|re| re.find(content))
        .map(|m| m.as_str())
        .ok_or_else(|| StageError::terminal(format!("{} reply contained no idea list", provider)))?;

    let payload: Vec<IdeaPayload> = serde_json::from_str(json)
        .map_err(|e| StageError::terminal(format!("{} reply was not a valid idea list: {}", provider, e)))?;

    Ok(payload
        .into_iter()
        .filter(|p| !p.topic.trim().is_empty() && !p.theme.trim().is_empty())
        .map(|p| {
            let mut idea = ContentIdea::new(TopicCategory::new(&p.topic), &p.theme);
            if let Some(hook) = p.hook.filter(|h| !h.trim().is_empty()) {
                idea = idea.with_hook(hook.trim());
            }
            if let Some(rationale) = p.rationale.filter(|r| !r.trim().is_empty()) {
                idea = idea.with_rationale(rationale.trim());
            }
            idea
        })
        .collect())
}

/// System and user prompts asking for `count` ideas.
pub fn idea_prompts(trends: &[String], categories: &[TopicCategory], count: usize) -> (String, String) {
    let categories = categories
        .iter()
        .map(TopicCategory::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let system = format!(
        "You plan content for an Islamic storytelling channel of short vertical videos.\n\
         Read the trending video titles, find the moral or spiritual theme behind them and \
         propose {count} distinct story ideas.\n\
         Every idea must be told with symbols and scenery only: mosques, deserts, light, books, \
         nature. Reject anything that depends on showing people, acting or drama.\n\
         Each topic must be one of: {categories}.\n\
         Reply with a single JSON object: {{\"ideas\": [{{\"topic\": \"...\", \"theme\": \"a short \
         theme in English\", \"hook\": \"one opening sentence\", \"rationale\": \"the trend it \
         answers\"}}]}}",
        count = count,
        categories = categories,
    );
    let trends = serde_json::to_string(trends).unwrap_or_default();
    let user = format!(
        "Trending titles today:\n{}\n\nPropose {} safe story ideas.",
        trends, count
    );
    (system, user)
}

/// Spread trends over categories in order, one idea per trend.
pub(crate) fn ideas_from_titles(
    trends: &[String],
    categories: &[TopicCategory],
    count: usize,
) -> Vec<ContentIdea> {
    trends
        .iter()
        .zip(categories.iter().cycle())
        .take(count)
        .map(|(trend, category)| ContentIdea::new(category.clone(), trend).with_rationale(trend))
        .collect()
}
