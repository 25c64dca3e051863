//! Script and idea generators backed by chat completion APIs.

use crate::http::{classify_transport, decode_json};
use crate::trends::{idea_prompts, ideas_from_titles, parse_ideas};
use async_trait::async_trait;
use derive_getters::Getters;
use regex::Regex;
use reelwright_core::{Billed, ContentIdea, Script, ScriptBuilder, TopicCategory};
use reelwright_error::StageError;
use reelwright_stages::{IdeaGenerator, ScriptGenerator};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, instrument};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

static JSON_OBJECT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").ok());

/// Keywords arrive either as a comma separated string or as a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum KeywordList {
    Joined(String),
    List(Vec<String>),
}

impl Default for KeywordList {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl KeywordList {
    fn into_vec(self) -> Vec<String> {
        let raw = match self {
            Self::Joined(s) => s.split(',').map(str::to_string).collect(),
            Self::List(v) => v,
        };
        raw.into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct StoryPayload {
    #[serde(default)]
    title: String,
    #[serde(default)]
    story: String,
    #[serde(default)]
    visual_keywords: KeywordList,
}

/// Story fields parsed from a model reply.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct ParsedStory {
    /// Raw title (may be empty or carry a label prefix).
    title: String,
    /// Story text.
    story: String,
    /// Footage search terms.
    visual_keywords: Vec<String>,
}

impl ParsedStory {
    fn into_script(self, category: &TopicCategory, theme: &str) -> Result<Script, StageError> {
        ScriptBuilder::default()
            .title(self.title)
            .text(self.story)
            .visual_keywords(self.visual_keywords)
            .category(category.clone())
            .theme(theme)
            .build()
            .map_err(|e| StageError::terminal(e.to_string()))
    }
}

/// Extract the `{title, story, visual_keywords}` object from a reply.
///
/// Text around the object (markdown fences, preambles) is ignored.
///
/// # Errors
///
/// A reply without a JSON object, or with an empty story, is terminal:
/// retrying the same prompt is not expected to help.
pub fn parse_story(provider: &str, content: &str) -> Result<ParsedStory, StageError> {
    let json = JSON_OBJECT
        .as_ref()
        .and_then(|re| re.find(content))
        .map(|m| m.as_str())
        .ok_or_else(|| StageError::terminal(format!("{} reply contained no JSON object", provider)))?;

    let payload: StoryPayload = serde_json::from_str(json)
        .map_err(|e| StageError::terminal(format!("{} reply was not valid story JSON: {}", provider, e)))?;

    if payload.story.trim().is_empty() {
        return Err(StageError::terminal(format!("{} returned an empty story", provider)));
    }
    Ok(ParsedStory {
        title: payload.title.trim().to_string(),
        story: payload.story.trim().to_string(),
        visual_keywords: payload.visual_keywords.into_vec(),
    })
}

/// What each topic category asks the model to write about.
pub fn topic_brief(category: &TopicCategory) -> &'static str {
    match category.as_str() {
        "prophets" => "a short story about one of the prophets and the lessons of his life",
        "sahaba" => "an inspiring story about one of the noble companions and a moment from his life",
        "quran_stories" => "a story from the Quran with its meaning and lessons",
        _ => "a short Islamic story with a clear moral lesson",
    }
}

/// System and user prompts for one script.
pub fn story_prompts(category: &TopicCategory, theme: &str, target_words: u32) -> (String, String) {
    let brief = topic_brief(category);
    let system = format!(
        "You are a professional narrator of Islamic stories. Write original stories in clear \
         Modern Standard Arabic, suitable for all ages, faithful to Islamic teaching, with a clear \
         lesson, for a vertical short video.\n\
         Length: about {words} words.\n\
         Subject: {brief}.\n\
         Main theme: {theme}.\n\
         Mention women only when strictly necessary and always with full respect.\n\
         Reply with a single JSON object: \
         {{\"title\": \"...\", \"story\": \"...\", \"visual_keywords\": \"comma separated English \
         scene keywords, e.g. desert, mosque, stars\"}}",
        words = target_words,
        brief = brief,
        theme = theme,
    );
    let user = format!(
        "Write a moving short story about {} focusing on the theme '{}'.",
        brief, theme
    );
    (system, user)
}

// OpenAI wire types

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAiResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    response_format: OpenAiResponseFormat,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: OpenAiUsage,
}

/// OpenAI chat completions in JSON mode.
#[derive(Debug, Clone)]
pub struct OpenAiScriptGenerator {
    client: Client,
    name: String,
    api_key: String,
    model: String,
    base_url: String,
    target_words: u32,
    max_tokens: u32,
}

impl OpenAiScriptGenerator {
    /// Creates a new OpenAI-backed generator.
    pub fn new(
        name: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        target_words: u32,
    ) -> Self {
        Self {
            client: Client::new(),
            name: name.into(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: OPENAI_API_URL.to_string(),
            target_words,
            max_tokens: 1000,
        }
    }

    /// Point at a compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Send one system and user exchange; returns the reply and tokens used.
    async fn chat(&self, system: &str, user: &str, temperature: f32) -> Result<(String, u64), StageError> {
        let request = OpenAiRequest {
            model: &self.model,
            messages: vec![
                OpenAiMessage {
                    role: "system",
                    content: system,
                },
                OpenAiMessage {
                    role: "user",
                    content: user,
                },
            ],
            response_format: OpenAiResponseFormat { kind: "json_object" },
            temperature,
            max_tokens: self.max_tokens,
        };

        debug!("Sending chat completion request");
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(&self.name, &e))?;
        let body: OpenAiResponse = decode_json(&self.name, response).await?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| StageError::terminal(format!("{} returned no choices", self.name)))?;
        Ok((content, body.usage.total_tokens))
    }
}

#[async_trait]
impl ScriptGenerator for OpenAiScriptGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(provider = %self.name, model = %self.model))]
    async fn generate_script(
        &self,
        category: &TopicCategory,
        theme: &str,
    ) -> Result<Billed<Script>, StageError> {
        let (system, user) = story_prompts(category, theme, self.target_words);
        let (content, tokens) = self.chat(&system, &user, 0.8).await?;
        let script = parse_story(&self.name, &content)?.into_script(category, theme)?;
        Ok(Billed::new(script, tokens))
    }
}

#[async_trait]
impl IdeaGenerator for OpenAiScriptGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, trends, categories), fields(provider = %self.name, model = %self.model))]
    async fn generate_ideas(
        &self,
        trends: &[String],
        categories: &[TopicCategory],
        count: usize,
    ) -> Result<Billed<Vec<ContentIdea>>, StageError> {
        let (system, user) = idea_prompts(trends, categories, count);
        let (content, tokens) = self.chat(&system, &user, 0.7).await?;
        Ok(Billed::new(parse_ideas(&self.name, &content)?, tokens))
    }
}

// Anthropic wire types

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: AnthropicUsage,
}

/// Anthropic messages API; the JSON object is extracted from free text.
#[derive(Debug, Clone)]
pub struct AnthropicScriptGenerator {
    client: Client,
    name: String,
    api_key: String,
    model: String,
    base_url: String,
    target_words: u32,
    max_tokens: u32,
}

impl AnthropicScriptGenerator {
    /// Creates a new Anthropic-backed generator.
    pub fn new(
        name: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        target_words: u32,
    ) -> Self {
        Self {
            client: Client::new(),
            name: name.into(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
            target_words,
            max_tokens: 1000,
        }
    }

    /// Point at a compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Send one system and user exchange; returns the text and tokens used.
    async fn chat(&self, system: &str, user: &str, temperature: f32) -> Result<(String, u64), StageError> {
        let request = AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature,
            system,
            messages: vec![OpenAiMessage {
                role: "user",
                content: user,
            }],
        };

        debug!("Sending messages request");
        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(&self.name, &e))?;
        let body: AnthropicResponse = decode_json(&self.name, response).await?;

        let content: String = body.content.into_iter().map(|c| c.text).collect();
        Ok((content, body.usage.input_tokens + body.usage.output_tokens))
    }
}

#[async_trait]
impl ScriptGenerator for AnthropicScriptGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(provider = %self.name, model = %self.model))]
    async fn generate_script(
        &self,
        category: &TopicCategory,
        theme: &str,
    ) -> Result<Billed<Script>, StageError> {
        let (system, mut user) = story_prompts(category, theme, self.target_words);
        user.push_str("\n\nAnswer with JSON only, using the keys 'title', 'story' and 'visual_keywords'.");
        let (content, tokens) = self.chat(&system, &user, 0.7).await?;
        let script = parse_story(&self.name, &content)?.into_script(category, theme)?;
        Ok(Billed::new(script, tokens))
    }
}

#[async_trait]
impl IdeaGenerator for AnthropicScriptGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, trends, categories), fields(provider = %self.name, model = %self.model))]
    async fn generate_ideas(
        &self,
        trends: &[String],
        categories: &[TopicCategory],
        count: usize,
    ) -> Result<Billed<Vec<ContentIdea>>, StageError> {
        let (system, user) = idea_prompts(trends, categories, count);
        let (content, tokens) = self.chat(&system, &user, 0.7).await?;
        Ok(Billed::new(parse_ideas(&self.name, &content)?, tokens))
    }
}

/// Offline generator returning fixed text, for rehearsals without API keys.
#[derive(Debug, Clone, Getters)]
pub struct StaticScriptGenerator {
    name: String,
    title: String,
    text: String,
    visual_keywords: Vec<String>,
}

impl StaticScriptGenerator {
    /// Generator that always returns this story.
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
        visual_keywords: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            text: text.into(),
            visual_keywords,
        }
    }
}

#[async_trait]
impl ScriptGenerator for StaticScriptGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_script(
        &self,
        category: &TopicCategory,
        theme: &str,
    ) -> Result<Billed<Script>, StageError> {
        let text = self.text.replace("{theme}", theme).replace("{category}", category.as_str());
        let script = ParsedStory {
            title: self.title.replace("{theme}", theme),
            story: text,
            visual_keywords: self.visual_keywords.clone(),
        }
        .into_script(category, theme)?;
        Ok(Billed::new(script, 0))
    }
}

/// Each trend becomes an idea with the trend as its theme.
#[async_trait]
impl IdeaGenerator for StaticScriptGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_ideas(
        &self,
        trends: &[String],
        categories: &[TopicCategory],
        count: usize,
    ) -> Result<Billed<Vec<ContentIdea>>, StageError> {
        Ok(Billed::new(ideas_from_titles(trends, categories, count), 0))
    }
}
