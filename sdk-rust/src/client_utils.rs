use crate::{ProviderError, ProviderResult};
use eventsource_stream::{EventStreamError, Eventsource};
use futures::{stream::StreamExt, Stream};
use reqwest::{header::HeaderMap, Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::pin::Pin;

/// Chunks decoded from a server-sent event stream.
pub type JsonEventStream<R> = Pin<Box<dyn Stream<Item = ProviderResult<R>> + Send>>;

/// POST `data` as JSON. Any non-success status becomes
/// [`ProviderError::StatusCode`] carrying the response body.
async fn post<T: Serialize>(
    client: &Client,
    url: &str,
    data: &T,
    headers: HeaderMap,
) -> ProviderResult<Response> {
    let response = client.post(url).headers(headers).json(data).send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(%status, "provider returned an error status");
    Err(ProviderError::StatusCode(status, body))
}

/// POST `data` and decode the JSON response body.
pub async fn send_json<T: Serialize, R: DeserializeOwned>(
    client: &Client,
    url: &str,
    data: &T,
    headers: HeaderMap,
) -> ProviderResult<R> {
    let response = post(client, url, data, headers).await?;
    Ok(response.json::<R>().await?)
}

/// POST `data` and decode every event of the returned SSE stream as JSON.
/// Empty events are skipped and a `[DONE]` event ends the stream.
pub async fn send_sse_stream<T: Serialize, R: DeserializeOwned + Send + 'static>(
    client: &Client,
    url: &str,
    data: &T,
    headers: HeaderMap,
    provider: &'static str,
) -> ProviderResult<JsonEventStream<R>> {
    let mut events = post(client, url, data, headers)
        .await?
        .bytes_stream()
        .eventsource();

    let stream = async_stream::try_stream! {
        while let Some(event) = events.next().await {
            let event = event.map_err(|error| event_error(provider, error))?;
            match event.data.as_str() {
                "" => continue,
                "[DONE]" => break,
                data => {
                    let chunk: R = serde_json::from_str(data).map_err(|error| {
                        ProviderError::Invariant(
                            provider,
                            format!("Failed to parse stream chunk: {error}"),
                        )
                    })?;
                    yield chunk;
                }
            }
        }
    };

    Ok(Box::pin(stream))
}

fn event_error(provider: &'static str, error: EventStreamError<reqwest::Error>) -> ProviderError {
    match error {
        EventStreamError::Transport(error) => ProviderError::Transport(error),
        EventStreamError::Utf8(error) => {
            ProviderError::Invariant(provider, format!("Stream data is not valid UTF-8: {error}"))
        }
        EventStreamError::Parser(error) => {
            ProviderError::Invariant(provider, format!("Malformed event stream: {error}"))
        }
    }
}
