//! # API Server Module
//!
//! ## Purpose
//! REST API server exposing the question-answering engine: streamed answers
//! over Server-Sent Events, chat history import and export, and health
//! reporting.
//!
//! ## Input/Output Specification
//! - **Input**: HTTP requests with prompts and message payloads
//! - **Output**: SSE answer streams, JSON history and status responses
//! - **Endpoints**: `/`, `/streamresponse`, `/update`, `/history`, `/health`
//!
//! ## Key Features
//! - Word-bounded SSE framing with a configurable inter-frame delay
//! - Short prompts short-circuit to a clarification frame without touching
//!   the model
//! - CORS support for web frontends
//! - Structured error responses

use crate::chat::ChatRole;
use crate::engine::segment_answer;
use crate::errors::{RagError, Result};
use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer, Result as ActixResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Prompts shorter than this many characters get a clarification frame
/// instead of a generated answer
const MIN_PROMPT_CHARS: usize = 5;

const CLARIFICATION_MESSAGE: &str = "Could you provide more details?";

/// API server wrapping the shared application state
pub struct ApiServer {
    app_state: crate::AppState,
}

/// Query parameters of the streaming endpoint
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub prompt: String,
}

/// One message in the history import payload
#[derive(Debug, Deserialize)]
pub struct UpdateMessage {
    pub role: String,
    pub content: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub indexed_chunks: usize,
    pub fallback_entries: usize,
    pub history_messages: usize,
}

impl ApiServer {
    /// Create new API server
    pub fn new(app_state: crate::AppState) -> Self {
        Self { app_state }
    }

    /// Run the API server until shutdown
    pub async fn run(self) -> Result<()> {
        let bind_addr = format!(
            "{}:{}",
            self.app_state.config.server.host, self.app_state.config.server.port
        );
        let enable_cors = self.app_state.config.server.enable_cors;

        tracing::info!("Starting API server on {}", bind_addr);

        // `HttpServer` itself is not `Send`; only the `dev::Server` handle
        // may live across an await point
        let server = HttpServer::new(move || {
            let cors = if enable_cors {
                Cors::permissive()
            } else {
                Cors::default()
            };
            App::new()
                .wrap(cors)
                .app_data(web::Data::new(self.app_state.clone()))
                .route("/", web::get().to(index_handler))
                .route("/streamresponse", web::get().to(stream_handler))
                .route("/update", web::post().to(update_handler))
                .route("/history", web::get().to(history_handler))
                .route("/health", web::get().to(health_handler))
        })
        .bind(&bind_addr)
        .map_err(|e| RagError::Internal {
            message: format!("Failed to bind server to {}: {}", bind_addr, e),
        })?
        .run();

        server.await.map_err(|e| RagError::Internal {
            message: format!("Server error: {}", e),
        })?;

        Ok(())
    }
}

fn sse_frame(text: &str) -> web::Bytes {
    web::Bytes::from(format!("data: {}\n\n", text))
}

/// Index page handler
async fn index_handler() -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Welcome to the Legal RAG API"
    })))
}

/// Streaming answer endpoint handler.
///
/// The full answer is generated first (and logged to history), then replayed
/// to the client in word-bounded SSE frames with a fixed delay between them.
async fn stream_handler(
    app_state: web::Data<crate::AppState>,
    query: web::Query<StreamQuery>,
) -> ActixResult<HttpResponse> {
    let prompt = query.into_inner().prompt;

    // Too short to answer meaningfully; ask for more without involving the
    // model or the history log
    if prompt.chars().count() < MIN_PROMPT_CHARS {
        let frames = futures::stream::once(async {
            Ok::<_, actix_web::Error>(sse_frame(CLARIFICATION_MESSAGE))
        });
        return Ok(HttpResponse::Ok()
            .content_type("text/event-stream")
            .streaming(frames));
    }

    let answer = match app_state.engine.answer(&prompt).await {
        Ok(answer) => answer,
        Err(e) => {
            tracing::error!("Answer generation failed: {}", e);
            return Ok(HttpResponse::BadGateway().json(serde_json::json!({
                "error": "Generation failed",
                "message": e.to_string(),
            })));
        }
    };

    let segments = segment_answer(&answer, app_state.config.server.stream_chunk_words);
    let delay = Duration::from_millis(app_state.config.server.stream_delay_ms);

    let frames = async_stream::stream! {
        for segment in segments {
            yield Ok::<_, actix_web::Error>(sse_frame(&segment));
            tokio::time::sleep(delay).await;
        }
    };

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .streaming(frames))
}

/// History import endpoint handler
async fn update_handler(
    app_state: web::Data<crate::AppState>,
    messages: web::Json<Vec<UpdateMessage>>,
) -> ActixResult<HttpResponse> {
    let messages = messages.into_inner();

    // Validate every role before writing anything, so a bad payload never
    // half-applies
    let mut parsed = Vec::with_capacity(messages.len());
    for message in &messages {
        match ChatRole::parse(&message.role) {
            Some(role) => parsed.push((role, message.content.as_str())),
            None => {
                let err = RagError::InvalidApiRequest {
                    details: format!("unknown role '{}'", message.role),
                };
                return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                    "error": "Invalid request",
                    "message": err.to_string(),
                })));
            }
        }
    }

    for (role, content) in parsed {
        if let Err(e) = app_state.engine.append_message(role, content) {
            tracing::error!("Failed to store message: {}", e);
            return Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Storage failed",
                "message": e.to_string(),
            })));
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Messages updated!"
    })))
}

/// Chat history export endpoint handler
async fn history_handler(app_state: web::Data<crate::AppState>) -> ActixResult<HttpResponse> {
    match app_state.engine.history() {
        Ok(messages) => Ok(HttpResponse::Ok().json(messages)),
        Err(e) => {
            tracing::error!("History read failed: {}", e);
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "History unavailable",
                "message": e.to_string(),
            })))
        }
    }
}

/// Health check endpoint handler
async fn health_handler(app_state: web::Data<crate::AppState>) -> ActixResult<HttpResponse> {
    match app_state.engine.stats().await {
        Ok(stats) => Ok(HttpResponse::Ok().json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            indexed_chunks: stats.indexed_chunks,
            fallback_entries: stats.fallback_entries,
            history_messages: stats.history_messages,
        })),
        Err(e) => Ok(HttpResponse::InternalServerError().json(serde_json::json!({
            "status": "unhealthy",
            "message": e.to_string(),
        }))),
    }
}
