use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::Response;
use http::StatusCode;
use http::header::CONTENT_TYPE;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::codec::CodecKind;
use crate::error::TwirpError;
use crate::server::router::Dispatcher;

impl Dispatcher {
    /// Serve this dispatcher as an axum [`Router`].
    ///
    /// Every request, whatever its method or path, goes to the dispatcher, so
    /// unknown paths are answered with a protocol `bad_route` error rather
    /// than a bare 404.
    pub fn into_router(self) -> Router {
        axum_router(Arc::new(self))
    }
}

/// Build an axum [`Router`] for a shared dispatcher.
pub fn axum_router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .fallback(serve_request)
        .with_state(dispatcher)
}

async fn serve_request(State(dispatcher): State<Arc<Dispatcher>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let limit = dispatcher.config().max_body_bytes;

    // hyper drops this future when the caller disconnects; the guard then
    // cancels the token the handler sees.
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let task = tokio::spawn(async move {
        let body = axum::body::to_bytes(body, limit)
            .await
            .map_err(|e| TwirpError::malformed(format!("failed to read request body: {e}")));
        dispatcher.dispatch(parts, body, cancel).await
    });

    let result = task.await;
    guard.disarm();

    match result {
        Ok(response) => response.map(Body::from),
        Err(e) => {
            error!(error = %e, "Dispatch task failed");
            let err = TwirpError::internal_with("dispatch task failed", e);
            let codec = CodecKind::Structured;
            let mut response = Response::new(Body::from(codec.encode_error(&err)));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, codec.header_value());
            response
        }
    }
}
