//! Endpoint handlers

pub mod search;
pub mod status;

use axum::{http::StatusCode, response::Json};
use uuid::Uuid;

use crate::server::types::{ApiError, BaseResponse};

/// Error half of every handler result
pub type HandlerError = (StatusCode, Json<BaseResponse<()>>);

pub(crate) fn error_response(status: StatusCode, key: &str, message: &str, transaction_id: Uuid) -> HandlerError {
  let error = ApiError::new(key, message);
  (status, Json(BaseResponse::<()>::error(vec![error], transaction_id)))
}
