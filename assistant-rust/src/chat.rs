use crate::{prompt, KnowledgeBase, Transcript};
use commune_sdk::{ModelProvider, ProviderError, StreamAccumulator};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;

/// Appended to the in-progress answer while chunks are still arriving.
pub const TYPING_MARKER: &str = "▌";

/// Recorded as the assistant's answer when a turn fails.
pub const FALLBACK_ANSWER: &str = "Sorry, I am unable to process this request.";

/// Lifecycle of a single chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Idle,
    AwaitingStream,
    Streaming,
    Complete,
    Error,
}

impl TurnState {
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::AwaitingStream)
                | (Self::AwaitingStream, Self::Streaming | Self::Error)
                | (Self::Streaming, Self::Complete | Self::Error)
                | (Self::Complete | Self::Error, Self::Idle)
        )
    }

    fn advance(&mut self, next: Self) {
        debug_assert!(
            self.can_advance_to(next),
            "invalid turn transition {self:?} -> {next:?}"
        );
        tracing::debug!(from = ?*self, to = ?next, "chat turn state");
        *self = next;
    }
}

/// Progress of a turn, emitted to the observer in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// The user entry was recorded and the request is being sent.
    Started,
    /// One chunk arrived. `display` is the answer so far with the typing marker.
    Streaming { delta: String, display: String },
    Completed { answer: String },
    Failed { diagnostic: String, fallback: String },
}

impl ChatEvent {
    /// Name used for the event on the wire.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Streaming { .. } => "streaming",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Receives the events of a turn as they happen.
pub trait ChatObserver: Send {
    fn on_event(&mut self, event: ChatEvent);
}

impl<F> ChatObserver for F
where
    F: FnMut(ChatEvent) + Send,
{
    fn on_event(&mut self, event: ChatEvent) {
        self(event);
    }
}

/// How a call to [`ChatFlow::submit`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The prompt was blank. Nothing was sent and nothing was recorded.
    Skipped,
    Answered { answer: String },
    /// The fallback answer was recorded in place of a reply.
    Failed { diagnostic: String },
}

/// Knowledge-grounded streaming chat.
pub struct ChatFlow {
    provider: Arc<dyn ModelProvider>,
    knowledge_base: Arc<KnowledgeBase>,
}

impl ChatFlow {
    pub fn new(provider: Arc<dyn ModelProvider>, knowledge_base: Arc<KnowledgeBase>) -> Self {
        Self {
            provider,
            knowledge_base,
        }
    }

    #[must_use]
    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.knowledge_base
    }

    /// Run one turn against `transcript`.
    ///
    /// The user entry is recorded before the request is sent. Exactly one
    /// assistant entry follows it: the full answer, or [`FALLBACK_ANSWER`] if
    /// anything failed, even after part of the answer was streamed. Errors
    /// never escape this call.
    pub async fn submit<O>(
        &self,
        transcript: &mut Transcript,
        prompt: &str,
        observer: &mut O,
    ) -> TurnOutcome
    where
        O: ChatObserver,
    {
        if prompt.trim().is_empty() {
            return TurnOutcome::Skipped;
        }

        let span = tracing::info_span!(
            "chat_turn",
            provider = self.provider.provider(),
            model = %self.provider.model_id(),
            turn = transcript.len() / 2 + 1,
        );

        async {
            let mut state = TurnState::Idle;

            transcript.push_user(prompt);
            observer.on_event(ChatEvent::Started);
            state.advance(TurnState::AwaitingStream);

            let outcome = match self.stream_answer(prompt, &mut state, observer).await {
                Ok(answer) => {
                    state.advance(TurnState::Complete);
                    tracing::info!(chars = answer.chars().count(), "chat turn answered");
                    transcript.push_assistant(answer.clone());
                    observer.on_event(ChatEvent::Completed {
                        answer: answer.clone(),
                    });
                    TurnOutcome::Answered { answer }
                }
                Err(error) => {
                    state.advance(TurnState::Error);
                    tracing::error!(%error, "chat turn failed");
                    let diagnostic = format!("An error occurred: {error}");
                    transcript.push_assistant(FALLBACK_ANSWER);
                    observer.on_event(ChatEvent::Failed {
                        diagnostic: diagnostic.clone(),
                        fallback: FALLBACK_ANSWER.to_string(),
                    });
                    TurnOutcome::Failed { diagnostic }
                }
            };

            state.advance(TurnState::Idle);
            outcome
        }
        .instrument(span)
        .await
    }

    async fn stream_answer<O>(
        &self,
        prompt: &str,
        state: &mut TurnState,
        observer: &mut O,
    ) -> Result<String, ProviderError>
    where
        O: ChatObserver,
    {
        let messages = prompt::build_chat_messages(&self.knowledge_base, prompt);
        let mut stream = self.provider.stream_chat(messages).await?;
        state.advance(TurnState::Streaming);

        let mut accumulator = StreamAccumulator::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let display = format!("{}{TYPING_MARKER}", accumulator.add_chunk(&chunk));
            observer.on_event(ChatEvent::Streaming {
                delta: chunk.delta.unwrap_or_default(),
                display,
            });
        }

        Ok(accumulator.into_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_transitions_follow_the_lifecycle() {
        use TurnState::{AwaitingStream, Complete, Error, Idle, Streaming};

        assert!(Idle.can_advance_to(AwaitingStream));
        assert!(AwaitingStream.can_advance_to(Streaming));
        assert!(AwaitingStream.can_advance_to(Error));
        assert!(Streaming.can_advance_to(Complete));
        assert!(Streaming.can_advance_to(Error));
        assert!(Complete.can_advance_to(Idle));
        assert!(Error.can_advance_to(Idle));

        assert!(!Idle.can_advance_to(Streaming));
        assert!(!AwaitingStream.can_advance_to(Complete));
        assert!(!Complete.can_advance_to(Streaming));
        assert!(!Error.can_advance_to(Complete));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = ChatEvent::Streaming {
            delta: "b".to_string(),
            display: "ab▌".to_string(),
        };

        assert_eq!(event.name(), "streaming");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({ "type": "streaming", "delta": "b", "display": "ab▌" })
        );
    }
}
