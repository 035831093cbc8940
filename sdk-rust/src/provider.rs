use crate::{ChatChunk, ChatMessage, GenerationResponse, Part, ProviderResult};
use futures::Stream;
use std::{
    pin::Pin,
    task::{Context, Poll},
};

/// The capability interface shared by every provider binding.
///
/// A binding that cannot serve one of the operations returns
/// [`crate::ProviderError::Unsupported`] for it.
#[async_trait::async_trait]
pub trait ModelProvider: Send + Sync {
    fn provider(&self) -> &'static str;
    fn model_id(&self) -> String;
    /// Start a streaming chat completion. The returned stream yields chunks in
    /// arrival order.
    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> ProviderResult<ChatStream>;
    /// Run a single, non-streaming multi-modal generation.
    async fn generate_image(&self, parts: Vec<Part>) -> ProviderResult<GenerationResponse>;
}

pub struct ChatStream(Pin<Box<dyn Stream<Item = ProviderResult<ChatChunk>> + Send>>);

impl ChatStream {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = ProviderResult<ChatChunk>> + Send + 'static,
    {
        Self(Box::pin(stream))
    }
}

impl Stream for ChatStream {
    type Item = ProviderResult<ChatChunk>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.0.as_mut().poll_next(cx)
    }
}
