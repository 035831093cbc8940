use crate::{
    chat::{ChatEvent, ChatFlow},
    image::{GeneratedImage, ImageFlow, ImageOutcome, ReferenceImage},
    AssistantError, Transcript,
};
use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Response, Sse,
    },
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use futures::channel::mpsc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub const LATEST_IMAGE_PATH: &str = "/images/latest";

/// Shared state of the HTTP shell. The transcript is owned here and lent to
/// the chat flow one turn at a time.
#[derive(Clone)]
pub struct AppState {
    chat: Arc<ChatFlow>,
    image: Arc<ImageFlow>,
    transcript: Arc<Mutex<Transcript>>,
    latest_image: Arc<RwLock<Option<GeneratedImage>>>,
}

impl AppState {
    pub fn new(chat: ChatFlow, image: ImageFlow) -> Self {
        Self {
            chat: Arc::new(chat),
            image: Arc::new(image),
            transcript: Arc::new(Mutex::new(Transcript::new())),
            latest_image: Arc::new(RwLock::new(None)),
        }
    }
}

#[derive(Deserialize)]
struct ChatBody {
    prompt: String,
}

#[derive(Deserialize)]
struct ImageBody {
    description: String,
    reference_image: Option<ReferenceImageBody>,
}

#[derive(Deserialize)]
struct ReferenceImageBody {
    /// Base64 file contents.
    data: String,
}

pub fn router(state: AppState, allowed_origin: Option<&str>) -> Result<Router, AssistantError> {
    let mut app = Router::new()
        .route("/", get(home_handler))
        .route("/chat", post(chat_handler))
        .route("/chat/messages", get(messages_handler))
        .route("/images", post(image_handler))
        .route(LATEST_IMAGE_PATH, get(latest_image_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if let Some(origin) = allowed_origin {
        let origin = origin.parse::<HeaderValue>().map_err(|_| {
            AssistantError::InvalidInput(format!("invalid allowed origin: {origin}"))
        })?;
        app = app.layer(
            CorsLayer::new()
                .allow_origin([origin])
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE]),
        );
    }

    Ok(app)
}

async fn home_handler(State(state): State<AppState>) -> String {
    let knowledge_base = if state.chat.knowledge_base().is_placeholder() {
        "not provided"
    } else {
        "loaded"
    };
    format!(
        "Welcome to the commune assistant!\nPOST /chat to ask about administrative procedures, POST /images to create an image.\nKnowledge base: {knowledge_base}"
    )
}

/// Waits for a running turn to finish before answering.
async fn messages_handler(State(state): State<AppState>) -> Json<Transcript> {
    Json(state.transcript.lock().await.clone())
}

/// Streams one chat turn as server-sent events, ending with a `transcript`
/// event carrying the whole updated transcript.
async fn chat_handler(State(state): State<AppState>, Json(body): Json<ChatBody>) -> Response {
    if body.prompt.trim().is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }

    let Ok(mut transcript) = state.transcript.clone().try_lock_owned() else {
        return (StatusCode::CONFLICT, "a chat turn is already in progress").into_response();
    };

    let (sender, receiver) = mpsc::unbounded::<Result<Event, axum::Error>>();
    let chat = state.chat.clone();

    // The turn runs to completion even if the client goes away, so the
    // transcript always receives its assistant entry.
    tokio::spawn(async move {
        let mut observer = |event: ChatEvent| {
            sender
                .unbounded_send(Event::default().event(event.name()).json_data(&event))
                .ok();
        };
        chat.submit(&mut transcript, &body.prompt, &mut observer).await;

        sender
            .unbounded_send(Event::default().event("transcript").json_data(&*transcript))
            .ok();
    });

    Sse::new(receiver)
        .keep_alive(KeepAlive::default())
        .into_response()
}

async fn image_handler(State(state): State<AppState>, Json(body): Json<ImageBody>) -> Response {
    let reference = match body.reference_image.map(decode_reference).transpose() {
        Ok(reference) => reference,
        Err(error) => {
            *state.latest_image.write().await = None;
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "invalid", "warning": error.to_string() })),
            )
                .into_response();
        }
    };

    let outcome = state.image.generate(&body.description, reference).await;

    let mut latest = state.latest_image.write().await;
    match outcome {
        ImageOutcome::Generated(image) => {
            let response = Json(json!({
                "status": "generated",
                "image": {
                    "data": BASE64_STANDARD.encode(&image.data),
                    "file_name": image.file_name,
                    "mime_type": image.mime_type,
                    "caption": image.caption,
                },
                "download_url": LATEST_IMAGE_PATH,
            }))
            .into_response();
            *latest = Some(image);
            response
        }
        ImageOutcome::Invalid { warning } => {
            *latest = None;
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "status": "invalid", "warning": warning })),
            )
                .into_response()
        }
        ImageOutcome::NoImage {
            warning,
            explanation,
        } => {
            *latest = None;
            Json(json!({
                "status": "no_image",
                "warning": warning,
                "explanation": explanation,
            }))
            .into_response()
        }
        ImageOutcome::Failed { diagnostic, hint } => {
            *latest = None;
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "status": "failed",
                    "diagnostic": diagnostic,
                    "hint": hint,
                })),
            )
                .into_response()
        }
    }
}

fn decode_reference(body: ReferenceImageBody) -> Result<ReferenceImage, AssistantError> {
    let data = BASE64_STANDARD.decode(body.data.trim()).map_err(|error| {
        AssistantError::InvalidInput(format!("reference image is not valid base64: {error}"))
    })?;
    ReferenceImage::from_bytes(data)
}

async fn latest_image_handler(State(state): State<AppState>) -> Response {
    let latest = state.latest_image.read().await;
    let Some(image) = latest.as_ref() else {
        return (StatusCode::NOT_FOUND, "no image has been generated yet").into_response();
    };

    (
        [
            (header::CONTENT_TYPE, image.mime_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", image.file_name),
            ),
        ],
        image.data.clone(),
    )
        .into_response()
}
