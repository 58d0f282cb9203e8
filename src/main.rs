//! Minimal HTTP front end: one POST route that injects a user turn and
//! streams the resulting chunks back as newline-delimited JSON. Exists to
//! exercise the facade end-to-end, not as a real deployment surface.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use codesm::{Agent, AgentConfig};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

struct AppState {
    agent: Agent,
}

#[derive(Deserialize)]
struct ChatRequest {
    session_id: Option<String>,
    message: String,
}

#[derive(Serialize)]
struct ChatError {
    error: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cwd = std::env::current_dir()?;
    let agent = Agent::new(AgentConfig::new(cwd)).await?;
    let state = Arc::new(AppState { agent });

    let app = Router::new().route("/chat", post(chat_handler)).with_state(state);

    let addr = std::env::var("CODESM_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:4815".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "codesm HTTP endpoint listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn chat_handler(State(state): State<Arc<AppState>>, Json(request): Json<ChatRequest>) -> Response {
    let session_id = match request.session_id {
        Some(id) => id,
        None => match state.agent.new_session().await {
            Ok(id) => id,
            Err(err) => return error_response(err),
        },
    };

    let stream = match state.agent.chat(&session_id, request.message).await {
        Ok(stream) => stream,
        Err(err) => return error_response(err),
    };

    let body_stream = stream.map(|chunk| {
        let mut line = serde_json::to_string(&chunk).unwrap_or_else(|_| "{}".to_string());
        line.push('\n');
        Ok::<_, std::io::Error>(line)
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(axum::http::header::CONTENT_TYPE, "application/x-ndjson")
        .body(axum::body::Body::from_stream(body_stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn error_response(err: codesm::AgentError) -> Response {
    let status = match &err {
        codesm::AgentError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ChatError { error: err.to_string() })).into_response()
}
