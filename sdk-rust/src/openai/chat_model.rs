use super::api::{
    ChatCompletionRequestMessage, ChatCompletionStreamResponseDelta, CreateChatCompletionRequest,
    CreateChatCompletionStreamResponse,
};
use crate::{
    client_utils, telemetry, ChatChunk, ChatMessage, ChatRole, ChatStream, GenerationResponse,
    ModelProvider, Part, ProviderError, ProviderResult,
};
use async_stream::try_stream;
use futures::StreamExt;
use reqwest::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    Client,
};
use std::collections::HashMap;

const PROVIDER: &str = "openai";

/// A chat model reached through the OpenAI-compatible chat completions shape.
///
/// Any endpoint speaking this shape can be targeted through `base_url`,
/// including Gemini's OpenAI compatibility layer.
pub struct OpenAIChatModel {
    model_id: String,
    api_key: String,
    base_url: String,
    client: Client,
    headers: HashMap<String, String>,
}

#[derive(Clone, Default)]
pub struct OpenAIChatModelOptions {
    pub base_url: Option<String>,
    pub api_key: String,
    pub headers: Option<HashMap<String, String>>,
    pub client: Option<Client>,
}

impl OpenAIChatModel {
    #[must_use]
    pub fn new(model_id: impl Into<String>, options: OpenAIChatModelOptions) -> Self {
        let OpenAIChatModelOptions {
            base_url,
            api_key,
            headers,
            client,
        } = options;

        let base_url = base_url
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
            .trim_end_matches('/')
            .to_string();
        let client = client.unwrap_or_else(Client::new);
        let headers = headers.unwrap_or_default();

        Self {
            model_id: model_id.into(),
            api_key,
            base_url,
            client,
            headers,
        }
    }

    fn request_headers(&self) -> ProviderResult<HeaderMap> {
        let mut headers = HeaderMap::new();

        let mut auth_header =
            HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|error| {
                ProviderError::InvalidInput(format!("Invalid OpenAI API key header value: {error}"))
            })?;
        auth_header.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth_header);

        for (key, value) in &self.headers {
            let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|error| {
                ProviderError::InvalidInput(format!("Invalid OpenAI header name '{key}': {error}"))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|error| {
                ProviderError::InvalidInput(format!(
                    "Invalid OpenAI header value for '{key}': {error}"
                ))
            })?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }
}

#[async_trait::async_trait]
impl ModelProvider for OpenAIChatModel {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn model_id(&self) -> String {
        self.model_id.clone()
    }

    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> ProviderResult<ChatStream> {
        telemetry::trace_stream_chat(self.provider(), &self.model_id, || async move {
            let request = convert_to_openai_create_params(messages, &self.model_id, true)?;
            let headers = self.request_headers()?;

            let mut stream = client_utils::send_sse_stream::<
                CreateChatCompletionRequest,
                CreateChatCompletionStreamResponse,
            >(
                &self.client,
                &format!("{}/chat/completions", self.base_url),
                &request,
                headers,
                PROVIDER,
            )
            .await?;

            let stream = try_stream! {
                let mut refusal = String::new();

                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?;

                    if let Some(usage) = &chunk.usage {
                        tracing::debug!(
                            prompt_tokens = usage.prompt_tokens,
                            completion_tokens = usage.completion_tokens,
                            "chat completion usage"
                        );
                    }

                    match chunk.choices.into_iter().next() {
                        Some(choice) => {
                            let mut delta = choice.delta;
                            if let Some(delta_refusal) = delta.refusal.take() {
                                refusal.push_str(&delta_refusal);
                            }
                            yield map_openai_delta(delta, choice.finish_reason);
                        }
                        // usage-only chunk
                        None => yield ChatChunk::default(),
                    }
                }

                if !refusal.is_empty() {
                    Err(ProviderError::Refusal(refusal))?;
                }
            };

            Ok(ChatStream::from_stream(stream))
        })
        .await
    }

    async fn generate_image(&self, _parts: Vec<Part>) -> ProviderResult<GenerationResponse> {
        Err(ProviderError::Unsupported(
            PROVIDER,
            "Image generation is not available through the chat completions API".to_string(),
        ))
    }
}

fn convert_to_openai_create_params(
    messages: Vec<ChatMessage>,
    model_id: &str,
    stream: bool,
) -> ProviderResult<CreateChatCompletionRequest> {
    if messages.is_empty() {
        return Err(ProviderError::InvalidInput(
            "At least one message is required".to_string(),
        ));
    }

    Ok(CreateChatCompletionRequest {
        model: model_id.to_string(),
        messages: messages.into_iter().map(convert_to_openai_message).collect(),
        stream,
    })
}

fn convert_to_openai_message(message: ChatMessage) -> ChatCompletionRequestMessage {
    let role = match message.role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
    };

    ChatCompletionRequestMessage {
        role,
        content: message.content,
    }
}

fn map_openai_delta(
    delta: ChatCompletionStreamResponseDelta,
    finish_reason: Option<String>,
) -> ChatChunk {
    ChatChunk {
        delta: delta.content,
        finish_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_params_keep_message_order_and_roles() {
        let request = convert_to_openai_create_params(
            vec![
                ChatMessage::system("be precise"),
                ChatMessage::user("hello"),
            ],
            "gemini-2.5-flash",
            true,
        )
        .unwrap();

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "gemini-2.5-flash",
                "messages": [
                    { "role": "system", "content": "be precise" },
                    { "role": "user", "content": "hello" }
                ],
                "stream": true
            })
        );
    }

    #[test]
    fn create_params_reject_empty_messages() {
        let err = convert_to_openai_create_params(vec![], "model", true).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidInput(_)));
    }

    #[test]
    fn delta_without_content_maps_to_empty_chunk() {
        let chunk = map_openai_delta(ChatCompletionStreamResponseDelta::default(), None);
        assert_eq!(chunk, ChatChunk::default());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let model = OpenAIChatModel::new(
            "gemini-2.5-flash",
            OpenAIChatModelOptions {
                base_url: Some(
                    "https://generativelanguage.googleapis.com/v1beta/openai/".to_string(),
                ),
                api_key: "key".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(
            model.base_url,
            "https://generativelanguage.googleapis.com/v1beta/openai"
        );
    }

    #[tokio::test]
    async fn generate_image_is_unsupported() {
        let model = OpenAIChatModel::new("gpt-4o", OpenAIChatModelOptions::default());
        let err = model
            .generate_image(vec![Part::text("a cat")])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported("openai", _)));
    }

    #[test]
    fn auth_header_is_sensitive() {
        let model = OpenAIChatModel::new(
            "gpt-4o",
            OpenAIChatModelOptions {
                api_key: "secret".to_string(),
                ..Default::default()
            },
        );
        let headers = model.request_headers().unwrap();
        assert!(headers[header::AUTHORIZATION].is_sensitive());
    }
}
