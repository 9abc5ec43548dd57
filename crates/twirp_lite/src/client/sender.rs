use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response};

use crate::server::Dispatcher;

/// Error type returned by senders for failures below the protocol layer.
pub type SendError = Box<dyn std::error::Error + Send + Sync>;

/// The HTTP client a transport sends requests through.
///
/// Implementations perform exactly one round trip per call and report any
/// failure to produce a response (refused connection, reset, unreadable
/// body) as an error. Any response, whatever its status, is returned as-is.
pub trait HttpSender: Send + Sync {
    fn send(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>, SendError>> + Send;
}

/// Sends over the network.
///
/// reqwest follows redirects unless the client was built with
/// `redirect::Policy::none()`; with that policy an unexpected redirect
/// surfaces as an error carrying its `Location`.
impl HttpSender for reqwest::Client {
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, SendError> {
        let request = reqwest::Request::try_from(request)?;
        let response = self.execute(request).await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        let mut out = Response::new(body);
        *out.status_mut() = status;
        *out.headers_mut() = headers;
        Ok(out)
    }
}

/// Sends straight into a dispatcher in the same process.
impl HttpSender for Dispatcher {
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, SendError> {
        Ok(self.handle(request).await)
    }
}

impl<S: HttpSender> HttpSender for Arc<S> {
    fn send(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>, SendError>> + Send {
        (**self).send(request)
    }
}

/// Render an error and its sources as `outer: inner: root`.
pub(crate) fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        // Some errors already include their source in their own message.
        if !text.ends_with(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}
