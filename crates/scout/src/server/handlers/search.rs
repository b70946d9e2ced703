//! Search endpoint handler

use axum::{
  extract::{rejection::JsonRejection, Extension, Json, State},
  http::StatusCode,
  response::Json as ResponseJson,
};
use tracing::{error, info};

use super::{error_response, HandlerError};
use crate::error::ScoutError;
use crate::models::SearchQuery;
use crate::server::middleware::RequestContext;
use crate::server::state::AppState;
use crate::server::types::{BaseResponse, SearchHitData, SearchRequest, SearchResponse};

/// POST /search - Hybrid search over the corpus
pub async fn search(
  State(state): State<AppState>,
  Extension(context): Extension<RequestContext>,
  payload: std::result::Result<Json<SearchRequest>, JsonRejection>,
) -> Result<ResponseJson<BaseResponse<SearchResponse>>, HandlerError> {
  let transaction_id = context.request_id;

  // malformed bodies get the same envelope as every other failure
  let Json(request) =
    payload.map_err(|rejection| error_response(rejection.status(), "invalid_request", &rejection.body_text(), transaction_id))?;

  let top_k = request.top_k.unwrap_or(state.search.default_top_k);
  let fanout = request.fanout.unwrap_or_else(|| state.search.default_fanout.max(top_k));
  let query = SearchQuery::new(request.query, fanout, top_k);

  // reject bad input even when search is not configured
  if let Err(e) = query.validate() {
    return Err(error_response(StatusCode::BAD_REQUEST, "invalid_query", &e.to_string(), transaction_id));
  }

  let Some(retriever) = state.retriever.as_ref() else {
    return Err(error_response(
      StatusCode::SERVICE_UNAVAILABLE,
      "search_unavailable",
      "Search is not configured: no embedding client available",
      transaction_id,
    ));
  };

  match retriever.search(&query).await {
    Ok(result) => {
      info!(request_id = %transaction_id, results = result.len(), ranking = ?result.ranking, "Search served");
      let response = SearchResponse {
        query: query.text,
        top_k,
        fanout,
        ranking: result.ranking,
        results: result.hits.into_iter().enumerate().map(|(i, hit)| SearchHitData::from_hit(i, hit)).collect(),
      };
      Ok(ResponseJson(BaseResponse::success(response, transaction_id)))
    }
    Err(e) => {
      let (status, key) = match &e {
        ScoutError::InvalidQuery(_) => (StatusCode::BAD_REQUEST, "invalid_query"),
        ScoutError::DimensionMismatch { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "dimension_mismatch"),
        ScoutError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_failure"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "search_failed"),
      };
      error!(request_id = %transaction_id, error = %e, "Search failed");
      Err(error_response(status, key, &e.to_string(), transaction_id))
    }
  }
}
