//! Request context middleware
//!
//! Assigns every request an id, makes it available to handlers as an
//! extension, and logs start and completion with method, path, status and
//! duration.

use axum::{
  extract::Request,
  http::{HeaderMap, Method, Uri},
  middleware::Next,
  response::Response,
};
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RequestContext {
  /// Unique ID for this request, echoed as the response transaction id
  pub request_id: Uuid,
  pub method: Method,
  pub uri: Uri,
  pub headers: HeaderMap,
}

impl RequestContext {
  pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
    Self { request_id: Uuid::new_v4(), method, uri, headers }
  }

  pub fn user_agent(&self) -> &str {
    self.headers.get("user-agent").and_then(|v| v.to_str().ok()).unwrap_or("none")
  }
}

pub async fn request_context_middleware(mut request: Request, next: Next) -> Response {
  let context = RequestContext::new(request.method().clone(), request.uri().clone(), request.headers().clone());

  let started = Instant::now();
  info!(
    request_id = %context.request_id,
    method = %context.method,
    path = context.uri.path(),
    user_agent = context.user_agent(),
    "Request started"
  );

  request.extensions_mut().insert(context.clone());
  let response = next.run(request).await;

  info!(
    request_id = %context.request_id,
    method = %context.method,
    path = context.uri.path(),
    status = response.status().as_u16(),
    duration_ms = started.elapsed().as_secs_f64() * 1000.0,
    "Request completed"
  );
  response
}
