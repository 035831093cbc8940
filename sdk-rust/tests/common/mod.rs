use axum::Router;
use std::sync::{Arc, Mutex};

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local listener");
    let addr = listener.local_addr().expect("local address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve test router");
    });
    format!("http://{addr}")
}

/// Last request seen by a test endpoint: its JSON body and the value of one
/// header of interest.
#[derive(Clone, Default)]
pub struct Captured(Arc<Mutex<Option<(serde_json::Value, Option<String>)>>>);

impl Captured {
    pub fn store(&self, body: serde_json::Value, header: Option<String>) {
        *self.0.lock().unwrap() = Some((body, header));
    }

    pub fn take(&self) -> (serde_json::Value, Option<String>) {
        self.0.lock().unwrap().take().expect("a request was captured")
    }
}

pub fn sse_body(events: &[&str]) -> String {
    events
        .iter()
        .map(|event| format!("data: {event}\n\n"))
        .collect()
}
