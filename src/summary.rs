//! LLM summaries of search results and free-form answers about the video.
//!
//! The summarizer is optional. Its failures are reported on their own and
//! never touch the session or the search that produced the results.

use crate::config::{Prompts, SummarySettings};
use crate::error::{Result, SpolError};
use crate::openai::create_client;
use crate::search::QueryResult;
use crate::web_context::{self, WebContext, NO_CONTEXT};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Context prefix the web client uses when it sends transcript excerpts.
const TRANSCRIPT_CONTEXT_PREFIX: &str = "Video transcript segments:";

/// Longest transcript context forwarded to the model, in characters.
const MAX_TRANSCRIPT_CONTEXT_CHARS: usize = 500;

/// Trait for text-generation collaborators.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize ranked search results for `query`.
    async fn summarize(&self, query: &str, results: &[QueryResult]) -> Result<String>;

    /// Answer a free-form question with optional context.
    async fn answer(&self, question: &str, context: &str) -> Result<String>;
}

/// Numbered `[start - end]: text` lines describing the results.
pub fn format_results_context(results: &[QueryResult]) -> String {
    let mut context = String::from("The following segments were found in the video:\n");
    for (i, result) in results.iter().enumerate() {
        context.push_str(&format!(
            "{}. [{} - {}]: {}\n",
            i + 1,
            result.start,
            result.end,
            result.text.trim()
        ));
    }
    context
}

/// Shorten transcript excerpts sent by the client; other context passes through.
pub fn truncate_context(context: &str) -> String {
    if !context.starts_with(TRANSCRIPT_CONTEXT_PREFIX) {
        return context.to_string();
    }

    if context.chars().count() > MAX_TRANSCRIPT_CONTEXT_CHARS {
        let truncated: String = context.chars().take(MAX_TRANSCRIPT_CONTEXT_CHARS).collect();
        format!("{}...", truncated)
    } else {
        context.to_string()
    }
}

/// Context for an answer: the client's context, then web snippets if any.
pub fn answer_context(client_context: &str, web: Option<&str>) -> String {
    let mut parts = Vec::new();
    if !client_context.trim().is_empty() {
        parts.push(truncate_context(client_context));
    }
    if let Some(web) = web.filter(|w| !w.trim().is_empty() && *w != NO_CONTEXT) {
        parts.push(format!("From the web:\n{}", web));
    }

    if parts.is_empty() {
        NO_CONTEXT.to_string()
    } else {
        parts.join("\n\n")
    }
}

/// Chat-completion based summarizer.
pub struct OpenAISummarizer {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    prompts: Prompts,
    web: Option<Arc<dyn WebContext>>,
    web_results: usize,
}

impl OpenAISummarizer {
    pub fn new(settings: &SummarySettings, prompts: Prompts) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            prompts,
            web: None,
            web_results: settings.web_results,
        })
    }

    /// Look up web snippets for every question before answering it.
    pub fn with_web_context(mut self, web: Arc<dyn WebContext>) -> Self {
        self.web = Some(web);
        self
    }

    async fn complete(&self, user_prompt: String) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.prompts.summary.system.clone())
                .build()
                .map_err(|e| SpolError::Summarization(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_prompt)
                .build()
                .map_err(|e| SpolError::Summarization(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_tokens)
            .build()
            .map_err(|e| SpolError::Summarization(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            SpolError::Summarization(format!("Failed to generate response: {}", e))
        })?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| SpolError::Summarization("Empty response from LLM".to_string()))?;

        debug!("Generated {} characters", answer.len());
        Ok(answer)
    }
}

#[async_trait]
impl Summarizer for OpenAISummarizer {
    #[instrument(skip(self, results), fields(results = results.len()))]
    async fn summarize(&self, query: &str, results: &[QueryResult]) -> Result<String> {
        info!("Summarizing results for: {}", query);

        let mut vars = HashMap::new();
        vars.insert("query".to_string(), query.to_string());
        vars.insert("context".to_string(), format_results_context(results));

        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.summary.describe, &vars);
        self.complete(prompt).await
    }

    #[instrument(skip(self, context))]
    async fn answer(&self, question: &str, context: &str) -> Result<String> {
        let web = match &self.web {
            Some(provider) => {
                Some(web_context::gather(provider.as_ref(), question, self.web_results).await)
            }
            None => None,
        };

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), answer_context(context, web.as_deref()));

        let prompt = self.prompts.render_with_custom(&self.prompts.summary.ask, &vars);
        self.complete(prompt).await
    }
}
