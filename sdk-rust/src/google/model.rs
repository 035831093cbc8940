use super::api::{
    Blob, Content, GenerateContentConfig, GenerateContentParameters, GenerateContentResponse,
    Part as GooglePart,
};
use crate::{
    client_utils, telemetry, ChatChunk, ChatMessage, ChatRole, ChatStream, GenerationResponse,
    ModelProvider, Part, ProviderError, ProviderResult,
};
use async_stream::try_stream;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use futures::StreamExt;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client,
};
use std::collections::HashMap;

const PROVIDER: &str = "google";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// A Gemini model reached through the native `generateContent` API.
pub struct GoogleModel {
    model_id: String,
    api_key: String,
    base_url: String,
    client: Client,
    headers: HashMap<String, String>,
}

#[derive(Clone, Default)]
pub struct GoogleModelOptions {
    pub api_key: String,
    pub base_url: Option<String>,
    pub headers: Option<HashMap<String, String>>,
    pub client: Option<Client>,
}

impl GoogleModel {
    #[must_use]
    pub fn new(model_id: impl Into<String>, options: GoogleModelOptions) -> Self {
        let GoogleModelOptions {
            api_key,
            base_url,
            headers,
            client,
        } = options;

        let base_url = base_url
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string())
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

    // The key travels in a header so that transport errors, which echo the
    // request URL, never contain it.
    fn request_headers(&self) -> ProviderResult<HeaderMap> {
        let mut headers = HeaderMap::new();

        let mut key_header = HeaderValue::from_str(&self.api_key).map_err(|error| {
            ProviderError::InvalidInput(format!("Invalid Google API key header value: {error}"))
        })?;
        key_header.set_sensitive(true);
        headers.insert(HeaderName::from_static(API_KEY_HEADER), key_header);

        for (key, value) in &self.headers {
            let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|error| {
                ProviderError::InvalidInput(format!("Invalid Google header name '{key}': {error}"))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|error| {
                ProviderError::InvalidInput(format!(
                    "Invalid Google header value for '{key}': {error}"
                ))
            })?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }
}

#[async_trait::async_trait]
impl ModelProvider for GoogleModel {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn model_id(&self) -> String {
        self.model_id.clone()
    }

    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> ProviderResult<ChatStream> {
        telemetry::trace_stream_chat(self.provider(), &self.model_id, || async move {
            let params = convert_chat_to_generate_content_parameters(messages)?;

            let url = format!(
                "{}/models/{}:streamGenerateContent?alt=sse",
                self.base_url, self.model_id
            );

            let headers = self.request_headers()?;
            let mut chunk_stream = client_utils::send_sse_stream::<_, GenerateContentResponse>(
                &self.client,
                &url,
                &params,
                headers,
                PROVIDER,
            )
            .await?;

            let stream = try_stream! {
                while let Some(chunk) = chunk_stream.next().await {
                    let response = chunk?;
                    yield map_google_chunk(response);
                }
            };

            Ok(ChatStream::from_stream(stream))
        })
        .await
    }

    async fn generate_image(&self, parts: Vec<Part>) -> ProviderResult<GenerationResponse> {
        telemetry::trace_generate_image(self.provider(), &self.model_id, || async move {
            let params = convert_image_to_generate_content_parameters(parts)?;

            let url = format!("{}/models/{}:generateContent", self.base_url, self.model_id);

            let headers = self.request_headers()?;
            let response: GenerateContentResponse =
                client_utils::send_json(&self.client, &url, &params, headers).await?;

            if let Some(usage) = &response.usage_metadata {
                tracing::debug!(
                    prompt_tokens = usage.prompt_token_count,
                    candidates_tokens = usage.candidates_token_count,
                    "generate content usage"
                );
            }

            map_google_response(response)
        })
        .await
    }
}

fn convert_chat_to_generate_content_parameters(
    messages: Vec<ChatMessage>,
) -> ProviderResult<GenerateContentParameters> {
    let mut system_texts: Vec<String> = Vec::new();
    let mut contents: Vec<Content> = Vec::new();

    for message in messages {
        let role = match message.role {
            ChatRole::System => {
                system_texts.push(message.content);
                continue;
            }
            ChatRole::User => "user",
            ChatRole::Assistant => "model",
        };

        contents.push(Content {
            role: Some(role.to_string()),
            parts: Some(vec![GooglePart {
                text: Some(message.content),
                ..Default::default()
            }]),
        });
    }

    if contents.is_empty() {
        return Err(ProviderError::InvalidInput(
            "At least one user or assistant message is required".to_string(),
        ));
    }

    let system_instruction = if system_texts.is_empty() {
        None
    } else {
        Some(Content {
            role: Some("system".to_string()),
            parts: Some(vec![GooglePart {
                text: Some(system_texts.join("\n")),
                ..Default::default()
            }]),
        })
    };

    Ok(GenerateContentParameters {
        contents,
        system_instruction,
        generation_config: None,
    })
}

fn convert_image_to_generate_content_parameters(
    parts: Vec<Part>,
) -> ProviderResult<GenerateContentParameters> {
    if parts.is_empty() {
        return Err(ProviderError::InvalidInput(
            "At least one part is required".to_string(),
        ));
    }

    Ok(GenerateContentParameters {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: Some(parts.into_iter().map(convert_to_google_part).collect()),
        }],
        system_instruction: None,
        generation_config: Some(GenerateContentConfig {
            response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
        }),
    })
}

fn convert_to_google_part(part: Part) -> GooglePart {
    match part {
        Part::Text(text_part) => GooglePart {
            text: Some(text_part.text),
            ..Default::default()
        },
        Part::Image(image_part) => GooglePart {
            inline_data: Some(Blob {
                data: Some(BASE64_STANDARD.encode(&image_part.data)),
                mime_type: Some(image_part.mime_type),
            }),
            ..Default::default()
        },
    }
}

fn map_google_response(response: GenerateContentResponse) -> ProviderResult<GenerationResponse> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        // A blocked prompt comes back without candidates.
        let finish_reason = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason.or(feedback.block_reason_message));
        return Ok(GenerationResponse {
            parts: Vec::new(),
            finish_reason,
        });
    };

    let parts = map_google_content(candidate.content.and_then(|c| c.parts).unwrap_or_default())?;

    Ok(GenerationResponse {
        parts,
        finish_reason: candidate.finish_reason,
    })
}

fn map_google_content(parts: Vec<GooglePart>) -> ProviderResult<Vec<Part>> {
    parts
        .into_iter()
        .filter_map(|part| {
            if let Some(text) = part.text {
                if part.thought.unwrap_or(false) {
                    None
                } else {
                    Some(Ok(Part::text(text)))
                }
            } else if let Some(inline_data) = part.inline_data {
                match (inline_data.data, inline_data.mime_type) {
                    (Some(data), Some(mime_type)) if mime_type.starts_with("image/") => Some(
                        BASE64_STANDARD
                            .decode(data)
                            .map(|bytes| Part::image(mime_type, bytes))
                            .map_err(|error| {
                                ProviderError::Invariant(
                                    PROVIDER,
                                    format!("Inline image data is not valid base64: {error}"),
                                )
                            }),
                    ),
                    (Some(_), Some(_)) => None,
                    _ => Some(Err(ProviderError::Invariant(
                        PROVIDER,
                        "Inline data missing data or mime type".to_string(),
                    ))),
                }
            } else {
                None
            }
        })
        .collect()
}

fn map_google_chunk(response: GenerateContentResponse) -> ChatChunk {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return ChatChunk::default();
    };

    let texts: Vec<String> = candidate
        .content
        .and_then(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter(|part| !part.thought.unwrap_or(false))
        .filter_map(|part| part.text)
        .collect();

    ChatChunk {
        delta: if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        },
        finish_reason: candidate.finish_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn chat_messages_split_system_instruction_and_roles() {
        let params = convert_chat_to_generate_content_parameters(vec![
            ChatMessage::system("persona"),
            ChatMessage::user("question"),
            ChatMessage::assistant("answer"),
        ])
        .unwrap();

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "persona");
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["contents"][1]["parts"][0]["text"], "answer");
    }

    #[test]
    fn image_request_keeps_text_first_and_encodes_reference() {
        let params = convert_image_to_generate_content_parameters(vec![
            Part::text("a lotus pond"),
            Part::image("image/jpeg", b"jpeg".to_vec()),
        ])
        .unwrap();

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(
            json,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "text": "a lotus pond" },
                        { "inlineData": { "data": "anBlZw==", "mimeType": "image/jpeg" } }
                    ]
                }],
                "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] }
            })
        );
    }

    #[test]
    fn response_parts_keep_order_and_decode_images() {
        let mapped = map_google_response(response(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "text": "thinking", "thought": true },
                        { "text": "Here it is" },
                        { "inlineData": { "mimeType": "image/png", "data": "cG5n" } },
                        { "text": "enjoy" }
                    ]
                },
                "finishReason": "STOP"
            }]
        })))
        .unwrap();

        assert_eq!(
            mapped,
            GenerationResponse {
                parts: vec![
                    Part::text("Here it is"),
                    Part::image("image/png", b"png".to_vec()),
                    Part::text("enjoy"),
                ],
                finish_reason: Some("STOP".to_string()),
            }
        );
    }

    #[test]
    fn non_image_inline_data_is_ignored() {
        let mapped = map_google_response(response(json!({
            "candidates": [{
                "content": { "parts": [
                    { "inlineData": { "mimeType": "audio/wav", "data": "AAAA" } }
                ]}
            }]
        })))
        .unwrap();

        assert!(mapped.parts.is_empty());
    }

    #[test]
    fn invalid_base64_is_an_invariant_error() {
        let err = map_google_response(response(json!({
            "candidates": [{
                "content": { "parts": [
                    { "inlineData": { "mimeType": "image/png", "data": "not base64!" } }
                ]}
            }]
        })))
        .unwrap_err();

        assert!(matches!(err, ProviderError::Invariant("google", _)));
    }

    #[test]
    fn blocked_prompt_yields_empty_parts_with_reason() {
        let mapped = map_google_response(response(json!({
            "promptFeedback": {
                "blockReason": "SAFETY",
                "blockReasonMessage": "The prompt was blocked due to safety reasons."
            }
        })))
        .unwrap();

        assert!(mapped.parts.is_empty());
        assert_eq!(mapped.finish_reason.as_deref(), Some("SAFETY"));
    }

    #[test]
    fn blocked_prompt_falls_back_to_block_message() {
        let mapped = map_google_response(response(json!({
            "promptFeedback": { "blockReasonMessage": "Blocked by policy." }
        })))
        .unwrap();

        assert_eq!(mapped.finish_reason.as_deref(), Some("Blocked by policy."));
    }

    #[test]
    fn stream_chunk_concatenates_visible_text() {
        let chunk = map_google_chunk(response(json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "hidden", "thought": true },
                    { "text": "Xin " },
                    { "text": "chào" }
                ]}
            }]
        })));

        assert_eq!(chunk, ChatChunk::text("Xin chào"));
    }

    #[test]
    fn api_key_header_is_sensitive() {
        let model = GoogleModel::new(
            "gemini-2.5-flash-image",
            GoogleModelOptions {
                api_key: "secret".to_string(),
                ..Default::default()
            },
        );
        let headers = model.request_headers().unwrap();
        assert!(headers[API_KEY_HEADER].is_sensitive());
    }
}
