//! Status, version and corpus statistics handlers

use axum::{
  extract::{Extension, State},
  http::StatusCode,
  response::Json,
};
use tracing::error;

use super::{error_response, HandlerError};
use crate::server::middleware::RequestContext;
use crate::server::state::AppState;
use crate::server::types::{BaseResponse, CorpusStatsResponse, StatusResponse, VersionResponse};

/// GET /status - Health check endpoint
pub async fn status(
  State(state): State<AppState>,
  Extension(context): Extension<RequestContext>,
) -> Json<BaseResponse<StatusResponse>> {
  let response = StatusResponse {
    status: "healthy".to_string(),
    version: env!("CARGO_PKG_VERSION").to_string(),
    data_dir: state.data_dir.to_string_lossy().to_string(),
    search_available: state.retriever.is_some(),
    rerank_enabled: state.retriever.as_ref().is_some_and(|r| r.reranker_enabled()),
  };
  Json(BaseResponse::success(response, context.request_id))
}

/// GET /version - Returns current API version
pub async fn version(Extension(context): Extension<RequestContext>) -> Json<BaseResponse<VersionResponse>> {
  let response = VersionResponse { version: env!("CARGO_PKG_VERSION").to_string() };
  Json(BaseResponse::success(response, context.request_id))
}

/// GET /corpus/stats - Corpus counters
pub async fn corpus_stats(
  State(state): State<AppState>,
  Extension(context): Extension<RequestContext>,
) -> Result<Json<BaseResponse<CorpusStatsResponse>>, HandlerError> {
  match state.store.stats().await {
    Ok(corpus) => Ok(Json(BaseResponse::success(CorpusStatsResponse { corpus }, context.request_id))),
    Err(e) => {
      error!(request_id = %context.request_id, error = %e, "Failed to read corpus stats");
      Err(error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "corpus_stats_failed",
        &format!("Failed to read corpus stats: {e}"),
        context.request_id,
      ))
    }
  }
}
