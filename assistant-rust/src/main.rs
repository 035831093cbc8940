use commune_assistant::{
    config::{build_provider, Credentials, ProviderKind, Settings},
    logging::init_tracing,
    server::{self, AppState},
    BoxedError, ChatFlow, ImageFlow, KnowledgeBase,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), BoxedError> {
    let settings = Settings::load()?;
    init_tracing(&settings.log_filter);

    let knowledge_base = Arc::new(KnowledgeBase::load(&settings.knowledge_base_path)?);
    let credentials = Credentials::load(&settings.secrets_path)?;
    let client = settings.http_client()?;

    let chat_provider = build_provider(
        settings.chat_provider,
        &settings.chat_model,
        settings.chat_base_url.clone(),
        &credentials.standard,
        client.clone(),
    );
    let image_provider = build_provider(
        ProviderKind::Google,
        &settings.image_model,
        settings.image_base_url.clone(),
        &credentials.elevated,
        client,
    );

    let state = AppState::new(
        ChatFlow::new(chat_provider, knowledge_base),
        ImageFlow::new(image_provider),
    );
    let app = server::router(state, settings.allowed_origin.as_deref())?;

    let address = settings.bind_address();
    let listener = TcpListener::bind(&address).await?;
    tracing::info!(%address, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
