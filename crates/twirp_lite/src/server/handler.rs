use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::codec::{CodecKind, RpcMessage};
use crate::context::Context;
use crate::error::TwirpError;

/// A type-erased method handler that can be stored in the route table.
///
/// This trait allows us to store handlers with different message types
/// in a single map.
pub(crate) trait ErasedHandler: Send + Sync {
    /// Decode the body with `codec`, run the method, and encode its output
    /// with the same codec.
    ///
    /// A body that fails to decode yields `Malformed` and the method never runs.
    fn call(
        &self,
        ctx: Context,
        codec: CodecKind,
        body: Bytes,
    ) -> BoxFuture<'static, Result<Bytes, TwirpError>>;
}

/// A bound method implementation.
///
/// The function receives the request's [`Context`] and the decoded input and
/// returns the output or an error that is sent to the caller unchanged.
pub type MethodFn<Req, Resp> = Arc<
    dyn Fn(Context, Req) -> BoxFuture<'static, Result<Resp, TwirpError>> + Send + Sync + 'static,
>;

/// A typed handler that wraps a method function.
pub(crate) struct TypedHandler<Req, Resp> {
    method: MethodFn<Req, Resp>,
    _marker: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> TypedHandler<Req, Resp>
where
    Req: RpcMessage,
    Resp: RpcMessage,
{
    pub fn new(method: MethodFn<Req, Resp>) -> Self {
        Self {
            method,
            _marker: PhantomData,
        }
    }
}

impl<Req, Resp> ErasedHandler for TypedHandler<Req, Resp>
where
    Req: RpcMessage,
    Resp: RpcMessage,
{
    fn call(
        &self,
        ctx: Context,
        codec: CodecKind,
        body: Bytes,
    ) -> BoxFuture<'static, Result<Bytes, TwirpError>> {
        let method = Arc::clone(&self.method);

        Box::pin(async move {
            let input: Req = codec.decode(&body).map_err(|e| {
                tracing::debug!(codec = ?codec, error = %e, "Request body failed to decode");
                TwirpError::malformed(format!("failed to decode request: {e}"))
            })?;

            let outcome = AssertUnwindSafe(async move { method(ctx, input).await })
                .catch_unwind()
                .await;

            let output = match outcome {
                Ok(result) => result?,
                Err(_) => {
                    tracing::error!("Handler panicked");
                    return Err(TwirpError::internal("internal service panic"));
                }
            };

            codec
                .encode(&output)
                .map_err(|e| TwirpError::internal_with("failed to encode response", e))
        })
    }
}

/// Helper to create a boxed method function from an async closure.
///
/// This handles the type gymnastics of boxing the closure and its return type.
pub fn make_method<Req, Resp, F, Fut>(f: F) -> MethodFn<Req, Resp>
where
    Req: RpcMessage,
    Resp: RpcMessage,
    F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, TwirpError>> + Send + 'static,
{
    Arc::new(
        move |ctx: Context, input: Req| -> BoxFuture<'static, Result<Resp, TwirpError>> {
            Box::pin(f(ctx, input))
        },
    )
}
