use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::collection::Collection;
use crate::config::Config;
use crate::error::{DeckError, SchedulerError};
use crate::review::{self, DeckSummary, ReviewSubmission, SessionRequest};
use crate::schedule::{Quality, SchedulingState};

// -- App state --

struct ServerState {
    collection: Collection,
    config: Config,
}

type SharedState = Arc<Mutex<ServerState>>;

// -- Errors --

pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Storage(DeckError),
}

impl From<SchedulerError> for ApiError {
    fn from(e: SchedulerError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<DeckError> for ApiError {
    fn from(e: DeckError) -> Self {
        ApiError::Storage(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Storage(e) => {
                tracing::error!("storage failure: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

// -- Payloads --

#[derive(Serialize)]
struct QueueResponse {
    cards: Vec<String>,
}

#[derive(Serialize)]
struct CardResponse {
    id: String,
    deck: String,
    front: String,
    back: String,
    tags: Vec<String>,
    scheduling: SchedulingState,
    reviews: usize,
}

/// Ratings arrive as plain integers so an out-of-range value gets a
/// descriptive 400 instead of a generic deserialization failure.
#[derive(Deserialize)]
struct ReviewRequest {
    quality: u8,
    #[serde(default)]
    hint_used: bool,
    #[serde(default)]
    answer_ms: u64,
}

// -- Handlers --

async fn decks(State(state): State<SharedState>) -> Json<Vec<DeckSummary>> {
    let st = state.lock().await;
    Json(review::deck_summaries(&st.collection.cards, Utc::now()))
}

async fn queue(
    State(state): State<SharedState>,
    Query(request): Query<SessionRequest>,
) -> Json<QueueResponse> {
    let st = state.lock().await;
    let cards = &st.collection.cards;
    let order = review::session_queue(cards, &request, Utc::now(), &st.config);
    Json(QueueResponse {
        cards: order.into_iter().map(|i| cards[i].id.clone()).collect(),
    })
}

fn find(collection: &Collection, id: &str) -> Result<usize, ApiError> {
    collection
        .position(id)
        .ok_or_else(|| ApiError::NotFound(format!("no card with id {id}")))
}

async fn card_detail(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<CardResponse>, ApiError> {
    let st = state.lock().await;
    let index = find(&st.collection, &id)?;
    let card = &st.collection.cards[index];
    Ok(Json(CardResponse {
        id: card.id.clone(),
        deck: card.deck.clone(),
        front: card.front.clone(),
        back: card.back.clone(),
        tags: card.tags.clone(),
        scheduling: card.scheduling,
        reviews: card.history.len(),
    }))
}

async fn card_review(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<SchedulingState>, ApiError> {
    let submission = ReviewSubmission {
        quality: Quality::try_from(request.quality)?,
        hint_used: request.hint_used,
        answer_ms: request.answer_ms,
    };

    let mut st = state.lock().await;
    let ServerState { collection, config } = &mut *st;
    let index = find(collection, &id)?;
    collection.review(index, submission, Utc::now(), config)?;
    Ok(Json(collection.cards[index].scheduling))
}

pub fn router(collection: Collection, config: Config) -> Router {
    let state = Arc::new(Mutex::new(ServerState { collection, config }));
    Router::new()
        .route("/api/decks", get(decks))
        .route("/api/queue", get(queue))
        .route("/api/card/{id}", get(card_detail))
        .route("/api/card/{id}/review", post(card_review))
        .with_state(state)
}

// -- Public entry point --

pub async fn serve(collection: Collection, config: Config, port: u16) -> std::io::Result<()> {
    tracing::info!(
        cards = collection.cards.len(),
        files = collection.file_count(),
        "loaded collection"
    );

    let app = router(collection, config);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("serving at http://localhost:{port}");
    axum::serve(listener, app).await
}
