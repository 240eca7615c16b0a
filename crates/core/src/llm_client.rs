use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse, ResponseFormat,
    },
};
use async_trait::async_trait;

/// The output shape requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    JsonObject,
}

/// Sampling parameters for a single completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub format: OutputFormat,
}

impl CompletionOptions {
    /// Options for generating the next interview question.
    pub fn interviewer() -> Self {
        Self {
            temperature: 0.5,
            max_tokens: 600,
            format: OutputFormat::JsonObject,
        }
    }

    /// Options for the post-session assessment.
    pub fn assessment() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 1500,
            format: OutputFormat::JsonObject,
        }
    }
}

/// A black-box text completion service.
///
/// Implementations return whatever text the model produced. Callers must not
/// assume it is well-formed, even when JSON output was requested.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - API key and base URL of the service.
    /// * `model` - The model identifier used for every completion.
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String> {
        let response_format = match options.format {
            OutputFormat::Text => ResponseFormat::Text,
            OutputFormat::JsonObject => ResponseFormat::JsonObject,
        };
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_prompt)
                    .build()?
                    .into(),
            ])
            .temperature(options.temperature)
            .max_completion_tokens(options.max_tokens)
            .response_format(response_format)
            .build()?;

        let response: CreateChatCompletionResponse = self.client.chat().create(request).await?;
        tracing::debug!(model = %self.model, usage = ?response.usage, "Completion received");

        let content = response
            .choices
            .first()
            .context("No response choice from LLM")?
            .message
            .content
            .as_ref()
            .context("No content in LLM response")?;
        Ok(content.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interviewer_options_request_json() {
        let options = CompletionOptions::interviewer();
        assert_eq!(options.format, OutputFormat::JsonObject);
        assert_eq!(options.max_tokens, 600);
        assert!((options.temperature - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_assessment_options_are_cooler_and_longer() {
        let assessment = CompletionOptions::assessment();
        let interviewer = CompletionOptions::interviewer();
        assert!(assessment.temperature < interviewer.temperature);
        assert!(assessment.max_tokens > interviewer.max_tokens);
    }
}
