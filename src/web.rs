use crate::{
    corpus::{ChapterDetail, ChapterSummary, CorpusStats},
    search::{SearchError, SearchMode, SearchOutcome, SearchSession},
    semantic::{ProviderStatus, SearchHit},
};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

#[derive(Clone)]
struct SharedState {
    session: Arc<SearchSession>,
}

pub fn router(session: Arc<SearchSession>) -> Router {
    let shared_state = Arc::new(SharedState { session });

    Router::new()
        .route("/api/chapters", get(chapters))
        .route("/api/chapters/:index", get(chapter))
        .route("/api/search", post(search))
        .route("/api/status", get(status))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                log::error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::warn!("shutting down");
}

async fn start_app(session: Arc<SearchSession>, bind: &str) -> anyhow::Result<()> {
    let app = router(session);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    log::info!("listening on {bind}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn start_daemon(session: Arc<SearchSession>, bind: &str) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_app(session, bind))
}

#[derive(Debug)]
enum HttpError {
    Search(SearchError),
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            HttpError::Search(err) => {
                let status = match err {
                    SearchError::InvalidQuery => axum::http::StatusCode::BAD_REQUEST,
                    SearchError::ModelNotReady | SearchError::ModelInit(_) => {
                        axum::http::StatusCode::SERVICE_UNAVAILABLE
                    }
                    SearchError::EmbeddingCompute(_) => {
                        axum::http::StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, err.user_message())
            }
            HttpError::BadRequest(message) => {
                (axum::http::StatusCode::BAD_REQUEST, message.clone())
            }
            HttpError::NotFound(message) => (axum::http::StatusCode::NOT_FOUND, message.clone()),
            HttpError::Internal(message) => {
                (axum::http::StatusCode::INTERNAL_SERVER_ERROR, message.clone())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn chapters(State(state): State<Arc<SharedState>>) -> Json<Vec<ChapterSummary>> {
    Json(state.session.chapters())
}

async fn chapter(
    State(state): State<Arc<SharedState>>,
    index: Result<Path<usize>, PathRejection>,
) -> Result<Json<ChapterDetail>, HttpError> {
    let Path(index) = index.map_err(|rejection| HttpError::BadRequest(rejection.body_text()))?;

    state
        .session
        .chapter(index)
        .map(Json)
        .ok_or_else(|| HttpError::NotFound(format!("chapter {index} not found")))
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    mode: SearchMode,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum OutcomeKind {
    Results,
    NoResults,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    query: String,
    mode: SearchMode,
    outcome: OutcomeKind,
    results: Vec<SearchHit>,
}

async fn search(
    State(state): State<Arc<SharedState>>,
    request: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, HttpError> {
    let Json(request) = request.map_err(|rejection| HttpError::BadRequest(rejection.body_text()))?;

    let provider = state.session.provider();
    if request.mode == SearchMode::Semantic
        && !request.query.trim().is_empty()
        && !provider.is_ready()
    {
        let err = match provider.status() {
            ProviderStatus::Unavailable { reason } => SearchError::ModelInit(reason),
            _ => SearchError::ModelNotReady,
        };
        return Err(HttpError::Search(err));
    }

    let session = state.session.clone();
    let (query, mode) = (request.query.clone(), request.mode);

    // detached: concurrent clients never supersede each other
    let outcome = tokio::task::spawn_blocking(move || session.run_detached(&query, mode))
        .await
        .map_err(|err| HttpError::Internal(format!("search task failed: {err}")))?;

    let (outcome, results) = match outcome {
        SearchOutcome::Results(hits) => (OutcomeKind::Results, hits),
        SearchOutcome::NoResults | SearchOutcome::Superseded => {
            (OutcomeKind::NoResults, Vec::new())
        }
        SearchOutcome::Failed(err) => return Err(HttpError::Search(err)),
    };

    Ok(Json(SearchResponse {
        query: request.query,
        mode: request.mode,
        outcome,
        results,
    }))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    semantic: ProviderStatus,
    corpus: CorpusStats,
    cached_queries: usize,
}

async fn status(State(state): State<Arc<SharedState>>) -> Json<StatusResponse> {
    let session = &state.session;
    Json(StatusResponse {
        semantic: session.provider().status(),
        corpus: session.index().stats(),
        cached_queries: session.provider().cached_queries(),
    })
}
