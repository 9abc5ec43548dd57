use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::error::HeaderError;

#[derive(Debug, Default)]
struct ResponseMeta {
    headers: HeaderMap,
    status: Option<StatusCode>,
}

/// Execution context for one request.
///
/// The dispatcher creates one per request and hands clones to hooks and to
/// the handler. Clones share the response metadata, so a header set by the
/// handler is visible to later hooks and ends up on the response.
#[derive(Debug, Clone)]
pub struct Context {
    package: Arc<str>,
    service: Arc<str>,
    method: Option<Arc<str>>,
    request_id: Arc<str>,
    request_headers: Arc<HeaderMap>,
    response: Arc<Mutex<ResponseMeta>>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context for calling a service implementation outside of a request,
    /// e.g. from tests. It is never cancelled and has no deadline.
    pub fn new(package: &str, service: &str) -> Self {
        Self {
            package: Arc::from(package),
            service: Arc::from(service),
            method: None,
            request_id: Arc::from(""),
            request_headers: Arc::new(HeaderMap::new()),
            response: Arc::new(Mutex::new(ResponseMeta::default())),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_id = Arc::from(request_id);
        self
    }

    pub fn with_request_headers(mut self, headers: HeaderMap) -> Self {
        self.request_headers = Arc::new(headers);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub(crate) fn set_method(&mut self, method: &str) {
        self.method = Some(Arc::from(method));
    }

    pub(crate) fn set_status(&self, status: StatusCode) {
        self.response_meta().status = Some(status);
    }

    fn response_meta(&self) -> MutexGuard<'_, ResponseMeta> {
        self.response.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// The declared name of the matched method. `None` until routing succeeds.
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn request_headers(&self) -> &HeaderMap {
        &self.request_headers
    }

    pub fn request_header(&self, name: &str) -> Option<&HeaderValue> {
        self.request_headers.get(name)
    }

    /// Attach a header to the response.
    ///
    /// `Content-Type` and `Content-Length` belong to the codec and are rejected.
    pub fn set_response_header(
        &self,
        name: HeaderName,
        value: HeaderValue,
    ) -> Result<(), HeaderError> {
        if name == CONTENT_TYPE || name == CONTENT_LENGTH {
            return Err(HeaderError::Reserved(name));
        }
        self.response_meta().headers.insert(name, value);
        Ok(())
    }

    /// Headers attached so far by the handler and hooks.
    pub fn response_headers(&self) -> HeaderMap {
        self.response_meta().headers.clone()
    }

    /// The status of the response being written. Set once the response is prepared.
    pub fn status_code(&self) -> Option<StatusCode> {
        self.response_meta().status
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the caller has gone away.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_clones_share_response_headers() {
        let ctx = Context::new("pkg", "Svc");
        let handler_ctx = ctx.clone();

        handler_ctx
            .set_response_header(
                HeaderName::from_static("x-hat-color"),
                HeaderValue::from_static("red"),
            )
            .unwrap();

        assert_eq!(ctx.response_headers()["x-hat-color"], "red");
    }

    #[test]
    fn test_reserved_headers_rejected() {
        let ctx = Context::new("pkg", "Svc");
        let err = ctx
            .set_response_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .unwrap_err();
        assert_eq!(err, HeaderError::Reserved(CONTENT_TYPE));
        assert!(ctx.response_headers().is_empty());
    }

    #[test]
    fn test_status_visible_to_clones() {
        let ctx = Context::new("pkg", "Svc");
        assert_eq!(ctx.status_code(), None);
        ctx.clone().set_status(StatusCode::NOT_FOUND);
        assert_eq!(ctx.status_code(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_deadline() {
        let ctx = Context::new("pkg", "Svc");
        assert!(!ctx.is_expired());

        let past = Context::new("pkg", "Svc").with_deadline(Some(Instant::now()));
        assert!(past.is_expired());

        let future = Context::new("pkg", "Svc")
            .with_deadline(Some(Instant::now() + Duration::from_secs(60)));
        assert!(!future.is_expired());
    }

    #[tokio::test]
    async fn test_cancellation_is_observable() {
        let token = CancellationToken::new();
        let ctx = Context::new("pkg", "Svc").with_cancellation(token.clone());
        assert!(!ctx.is_cancelled());

        token.cancel();
        ctx.cancelled().await;
        assert!(ctx.is_cancelled());
    }
}
