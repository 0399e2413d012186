//! SSE transport: event stream down, HTTP POST up.
//!
//! `GET /sse` opens the stream and immediately announces the per-session
//! message endpoint; `POST /messages?session_id=…` feeds client messages
//! in, and their responses are pushed onto that session's stream.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use futures::{Stream, StreamExt, stream};
use serde::Deserialize;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use crate::error::Result;
use crate::rpc;
use crate::tools::ToolSet;

/// Per-session queue depth for outbound events.
const SESSION_BUFFER: usize = 64;

struct AppState {
    tools: ToolSet,
    sessions: Mutex<HashMap<String, mpsc::Sender<String>>>,
}

pub async fn serve(tools: ToolSet, bind: &str) -> Result<()> {
    let state = Arc::new(AppState {
        tools,
        sessions: Mutex::new(HashMap::new()),
    });
    let app = Router::new()
        .route("/sse", get(open_stream))
        .route("/messages", post(receive_message))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "serving sse transport");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn open_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let session_id = Uuid::new_v4().to_string();
    let (tx, rx) = mpsc::channel(SESSION_BUFFER);
    state.sessions.lock().await.insert(session_id.clone(), tx);
    tracing::debug!(session = %session_id, "stream opened");

    let endpoint = format!("/messages?session_id={session_id}");
    let announce =
        stream::once(async move { Ok(Event::default().event("endpoint").data(endpoint)) });
    let responses = stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|payload| (Ok(Event::default().event("message").data(payload)), rx))
    });

    Sse::new(announce.chain(responses)).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    session_id: String,
}

async fn receive_message(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> StatusCode {
    let sender = state.sessions.lock().await.get(&query.session_id).cloned();
    let Some(sender) = sender else {
        return StatusCode::NOT_FOUND;
    };

    if let Some(response) = rpc::handle_message(&state.tools, &body).await {
        if sender.send(response).await.is_err() {
            // Client went away; forget the session.
            state.sessions.lock().await.remove(&query.session_id);
            return StatusCode::GONE;
        }
    }
    StatusCode::ACCEPTED
}
