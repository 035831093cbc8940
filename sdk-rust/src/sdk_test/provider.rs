use crate::{
    ChatChunk, ChatMessage, ChatStream, GenerationResponse, ModelProvider, Part, ProviderError,
    ProviderResult,
};
use futures::{
    channel::oneshot,
    future,
    stream::{self, StreamExt},
};
use std::{collections::VecDeque, sync::Mutex};

/// Result for a mocked `stream_chat` call.
pub enum MockStreamResult {
    /// The stream yields these chunks and then ends.
    Chunks(Vec<ChatChunk>),
    /// The call itself fails before any chunk is produced.
    Error(ProviderError),
    /// The stream yields these chunks and then fails.
    FailAfter(Vec<ChatChunk>, ProviderError),
    /// The stream yields these chunks and stays open until the paired sender
    /// fires or is dropped.
    Held(Vec<ChatChunk>, oneshot::Receiver<()>),
}

impl MockStreamResult {
    /// Construct a result that yields one text chunk per item.
    pub fn texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Chunks(texts.into_iter().map(ChatChunk::text).collect())
    }

    /// Construct a result that yields the provided error.
    pub fn error(error: ProviderError) -> Self {
        Self::Error(error)
    }

    /// Construct a held stream of text chunks and the sender that ends it.
    pub fn held<I, S>(texts: I) -> (Self, oneshot::Sender<()>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (release, held) = oneshot::channel();
        let chunks = texts.into_iter().map(ChatChunk::text).collect();
        (Self::Held(chunks, held), release)
    }
}

impl From<Vec<ChatChunk>> for MockStreamResult {
    fn from(chunks: Vec<ChatChunk>) -> Self {
        Self::Chunks(chunks)
    }
}

/// Result for a mocked `generate_image` call.
pub enum MockImageResult {
    Response(GenerationResponse),
    Error(ProviderError),
}

impl MockImageResult {
    /// Construct a result that yields the provided response.
    pub fn response(response: GenerationResponse) -> Self {
        Self::Response(response)
    }

    /// Construct a result that yields the provided error.
    pub fn error(error: ProviderError) -> Self {
        Self::Error(error)
    }
}

impl From<GenerationResponse> for MockImageResult {
    fn from(response: GenerationResponse) -> Self {
        Self::response(response)
    }
}

#[derive(Default)]
struct MockProviderState {
    mocked_stream_results: VecDeque<MockStreamResult>,
    mocked_image_results: VecDeque<MockImageResult>,
    tracked_chat_inputs: Vec<Vec<ChatMessage>>,
    tracked_image_inputs: Vec<Vec<Part>>,
}

/// A mock provider for testing that tracks inputs and yields predefined outputs.
pub struct MockProvider {
    provider: &'static str,
    model_id: String,
    state: Mutex<MockProviderState>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            provider: "mock",
            model_id: "mock-model".to_string(),
            state: Mutex::new(MockProviderState::default()),
        }
    }
}

impl MockProvider {
    /// Construct a new mock provider instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the model identifier returned by the mock.
    pub fn set_model_id<S: Into<String>>(&mut self, model_id: S) {
        self.model_id = model_id.into();
    }

    /// Enqueue a mocked `stream_chat` result.
    pub fn enqueue_stream<R>(&self, result: R) -> &Self
    where
        R: Into<MockStreamResult>,
    {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.mocked_stream_results.push_back(result.into());
        drop(state);
        self
    }

    /// Enqueue a mocked `generate_image` result.
    pub fn enqueue_image<R>(&self, result: R) -> &Self
    where
        R: Into<MockImageResult>,
    {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.mocked_image_results.push_back(result.into());
        drop(state);
        self
    }

    /// Messages received by every `stream_chat` call so far.
    pub fn tracked_chat_inputs(&self) -> Vec<Vec<ChatMessage>> {
        let state = self.state.lock().expect("mock state poisoned");
        state.tracked_chat_inputs.clone()
    }

    /// Parts received by every `generate_image` call so far.
    pub fn tracked_image_inputs(&self) -> Vec<Vec<Part>> {
        let state = self.state.lock().expect("mock state poisoned");
        state.tracked_image_inputs.clone()
    }

    /// Total number of calls received on either operation.
    pub fn call_count(&self) -> usize {
        let state = self.state.lock().expect("mock state poisoned");
        state.tracked_chat_inputs.len() + state.tracked_image_inputs.len()
    }
}

#[async_trait::async_trait]
impl ModelProvider for MockProvider {
    fn provider(&self) -> &'static str {
        self.provider
    }

    fn model_id(&self) -> String {
        self.model_id.clone()
    }

    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> ProviderResult<ChatStream> {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.tracked_chat_inputs.push(messages);

        let result = state.mocked_stream_results.pop_front().ok_or_else(|| {
            ProviderError::Invariant(self.provider, "no mocked stream results available".into())
        })?;

        match result {
            MockStreamResult::Chunks(chunks) => Ok(ChatStream::from_stream(stream::iter(
                chunks.into_iter().map(Ok),
            ))),
            MockStreamResult::Error(error) => Err(error),
            MockStreamResult::FailAfter(chunks, error) => {
                let items = chunks
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(error)))
                    .collect::<Vec<_>>();
                Ok(ChatStream::from_stream(stream::iter(items)))
            }
            MockStreamResult::Held(chunks, held) => {
                let release = stream::once(held)
                    .filter_map(|_| future::ready(None::<ProviderResult<ChatChunk>>));
                Ok(ChatStream::from_stream(
                    stream::iter(chunks.into_iter().map(Ok)).chain(release),
                ))
            }
        }
    }

    async fn generate_image(&self, parts: Vec<Part>) -> ProviderResult<GenerationResponse> {
        let mut state = self.state.lock().expect("mock state poisoned");
        state.tracked_image_inputs.push(parts);

        let result = state.mocked_image_results.pop_front().ok_or_else(|| {
            ProviderError::Invariant(self.provider, "no mocked image results available".into())
        })?;

        match result {
            MockImageResult::Response(response) => Ok(response),
            MockImageResult::Error(error) => Err(error),
        }
    }
}
