use crate::{ChatStream, GenerationResponse, Part, ProviderResult};
use futures::StreamExt;
use opentelemetry::trace::Status;
use std::time::Instant;
use tracing::{info_span, Span};
use tracing_futures::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

#[derive(Clone, Copy)]
enum Operation {
    StreamChat,
    GenerateImage,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Self::StreamChat => "stream_chat",
            Self::GenerateImage => "generate_image",
        }
    }
}

/// Span around one provider call. Attributes that are only known at the end
/// (chunk count, time to first chunk, image count) are recorded on drop.
struct ProviderSpan {
    span: Span,
    start_time: Instant,
    time_to_first_chunk: Option<f64>,
    chunk_count: i64,
    image_parts: Option<i64>,
}

impl ProviderSpan {
    fn new(provider: &str, model_id: &str, operation: Operation) -> Self {
        let span = match operation {
            Operation::StreamChat => info_span!("commune_sdk.stream_chat"),
            Operation::GenerateImage => info_span!("commune_sdk.generate_image"),
        };
        span.set_attribute("gen_ai.provider.name", provider.to_string());
        span.set_attribute("gen_ai.request.model", model_id.to_string());
        span.set_attribute("commune_sdk.method", operation.name());

        Self {
            span,
            start_time: Instant::now(),
            time_to_first_chunk: None,
            chunk_count: 0,
            image_parts: None,
        }
    }

    fn span(&self) -> Span {
        self.span.clone()
    }

    async fn instrument_future<F>(&self, future: F) -> F::Output
    where
        F: std::future::Future,
    {
        future.instrument(self.span()).await
    }

    fn on_chunk(&mut self) {
        self.chunk_count += 1;
        if self.time_to_first_chunk.is_none() {
            self.time_to_first_chunk = Some(self.start_time.elapsed().as_secs_f64());
        }
    }

    fn on_response(&mut self, response: &GenerationResponse) {
        let images = response
            .parts
            .iter()
            .filter(|part| matches!(part, Part::Image(_)))
            .count();
        self.image_parts = Some(i64::try_from(images).unwrap_or(i64::MAX));
    }

    fn on_error(&mut self, error: &(dyn std::error::Error + 'static)) {
        self.span
            .set_attribute("exception.message", error.to_string());
        self.span.set_status(Status::error(error.to_string()));
    }

    fn on_end(&mut self) {
        if self.chunk_count > 0 {
            self.span
                .set_attribute("commune_sdk.stream.chunks", self.chunk_count);
        }
        if let Some(time_to_first_chunk) = self.time_to_first_chunk {
            self.span
                .set_attribute("gen_ai.server.time_to_first_token", time_to_first_chunk);
        }
        if let Some(image_parts) = self.image_parts {
            self.span
                .set_attribute("commune_sdk.response.image_parts", image_parts);
        }
    }
}

impl Drop for ProviderSpan {
    fn drop(&mut self) {
        self.on_end();
    }
}

/// Run a `generate_image` call inside its span.
pub async fn trace_generate_image<F, Fut>(
    provider: &str,
    model_id: &str,
    f: F,
) -> ProviderResult<GenerationResponse>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = ProviderResult<GenerationResponse>>,
{
    let mut span = ProviderSpan::new(provider, model_id, Operation::GenerateImage);
    let result = span.instrument_future(f()).await;

    match &result {
        Ok(response) => span.on_response(response),
        Err(error) => span.on_error(error),
    }

    result
}

/// Run a `stream_chat` call inside its span. The span stays open until the
/// returned stream is dropped.
pub async fn trace_stream_chat<F, Fut>(
    provider: &str,
    model_id: &str,
    f: F,
) -> ProviderResult<ChatStream>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = ProviderResult<ChatStream>>,
{
    let mut span = ProviderSpan::new(provider, model_id, Operation::StreamChat);
    let stream_result = span.instrument_future(f()).await;

    match stream_result {
        Ok(mut stream) => {
            let span_handle = span.span();
            let instrumented = async_stream::try_stream! {
                let mut span_state = span;

                while let Some(item) = stream.next().await {
                    match item {
                        Ok(chunk) => {
                            span_state.on_chunk();
                            yield chunk;
                        }
                        Err(err) => {
                            span_state.on_error(&err);
                            Err(err)?;
                        }
                    }
                }
            }
            .instrument(span_handle);

            Ok(ChatStream::from_stream(instrumented))
        }
        Err(error) => {
            span.on_error(&error);
            Err(error)
        }
    }
}
