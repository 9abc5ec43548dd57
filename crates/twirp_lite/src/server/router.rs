use std::collections::{HashMap, HashSet};
use std::collections::hash_map::Entry;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::request::Parts;
use http::{HeaderValue, Method, Request, Response, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;

use crate::codec::{CodecKind, RpcMessage};
use crate::context::Context;
use crate::descriptor::ServiceDescriptor;
use crate::error::{DispatcherError, ErrorCode, TwirpError};
use crate::naming::{NamingPolicy, RoutePath, normalize_prefix};
use crate::server::config::DispatcherConfig;
use crate::server::handler::{ErasedHandler, TypedHandler, make_method};
use crate::server::hooks::ServerHook;

/// Header carrying a caller-supplied request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Meta key added to `bad_route` errors, holding the rejected method and path.
pub const META_INVALID_ROUTE: &str = "twirp_invalid_route";

/// Collects method handlers for one service and builds a [`Dispatcher`].
pub struct DispatcherBuilder {
    descriptor: ServiceDescriptor,
    config: DispatcherConfig,
    handlers: HashMap<String, Arc<dyn ErasedHandler>>,
}

impl DispatcherBuilder {
    pub fn new(descriptor: ServiceDescriptor, config: DispatcherConfig) -> Self {
        Self {
            descriptor,
            config,
            handlers: HashMap::new(),
        }
    }

    /// Bind a handler to a declared method.
    ///
    /// # Example
    /// ```ignore
    /// builder.register::<SizeV1, HatV1, _, _>("MakeHat_v1", |_ctx, size| async move {
    ///     Ok(HatV1 { size: size.inches })
    /// })?;
    /// ```
    pub fn register<Req, Resp, F, Fut>(&mut self, method: &str, f: F) -> Result<(), DispatcherError>
    where
        Req: RpcMessage,
        Resp: RpcMessage,
        F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, TwirpError>> + Send + 'static,
    {
        let declared =
            self.descriptor
                .method(method)
                .ok_or_else(|| DispatcherError::UnknownMethod {
                    service: self.descriptor.full_name(),
                    method: method.to_owned(),
                })?;

        check_type(method, declared.input_type(), Req::full_name())?;
        check_type(method, declared.output_type(), Resp::full_name())?;

        let handler = TypedHandler::<Req, Resp>::new(make_method(f));
        match self.handlers.entry(method.to_owned()) {
            Entry::Occupied(_) => Err(DispatcherError::DuplicateHandler(method.to_owned())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(handler));
                Ok(())
            }
        }
    }

    /// Derive the route table and freeze it.
    ///
    /// Method names must be unique, every declared method must have a
    /// handler, and no two methods may claim the same path under any
    /// accepted form.
    pub fn build(mut self) -> Result<Dispatcher, DispatcherError> {
        let mut declared: HashSet<&str, ahash::RandomState> = HashSet::default();
        for method in self.descriptor.methods() {
            if !declared.insert(method.name()) {
                return Err(DispatcherError::DuplicateMethod(method.name().to_owned()));
            }
        }

        let prefix = normalize_prefix(&self.config.path_prefix);
        let mut routes: HashMap<String, Route, ahash::RandomState> = HashMap::default();

        for method in self.descriptor.methods() {
            let handler = self
                .handlers
                .remove(method.name())
                .ok_or_else(|| DispatcherError::Unbound(method.name().to_owned()))?;
            let method_name: Arc<str> = Arc::from(method.name());

            // Paths this method has claimed; literal and camel forms coincide
            // when the names have no underscores.
            let mut claimed: Vec<String> = Vec::with_capacity(2);

            for &policy in self.config.route_match.policies() {
                let path = self.descriptor.path(policy, &prefix, method)?;

                match routes.entry(path) {
                    Entry::Occupied(entry) if claimed.contains(entry.key()) => {}
                    Entry::Occupied(entry) => {
                        return Err(DispatcherError::RouteCollision {
                            path: entry.key().clone(),
                            first: entry.get().method.to_string(),
                            second: method.name().to_owned(),
                        });
                    }
                    Entry::Vacant(slot) => {
                        info!(route = %slot.key(), method = %method_name, policy = ?policy, "Registered RPC route");
                        claimed.push(slot.key().clone());
                        slot.insert(Route {
                            method: Arc::clone(&method_name),
                            policy,
                            handler: Arc::clone(&handler),
                        });
                    }
                }
            }
        }

        Ok(Dispatcher {
            descriptor: Arc::new(self.descriptor),
            config: self.config,
            routes,
        })
    }
}

fn check_type(method: &str, expected: &str, found: String) -> Result<(), DispatcherError> {
    if expected == found {
        Ok(())
    } else {
        Err(DispatcherError::TypeMismatch {
            method: method.to_owned(),
            expected: expected.to_owned(),
            found,
        })
    }
}

struct Route {
    method: Arc<str>,
    policy: NamingPolicy,
    handler: Arc<dyn ErasedHandler>,
}

/// Routes requests for one service to its method handlers.
///
/// The route table is built once by [`DispatcherBuilder::build`] and never
/// changes, so a dispatcher can be shared across any number of concurrent
/// requests without locking.
pub struct Dispatcher {
    descriptor: Arc<ServiceDescriptor>,
    config: DispatcherConfig,
    routes: HashMap<String, Route, ahash::RandomState>,
}

impl Dispatcher {
    pub fn builder(descriptor: ServiceDescriptor, config: DispatcherConfig) -> DispatcherBuilder {
        DispatcherBuilder::new(descriptor, config)
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Every accepted path, sorted.
    pub fn routes(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    /// Check if a path is accepted.
    pub fn has_route(&self, path: &str) -> bool {
        self.routes.contains_key(path)
    }

    /// Handle one request. The request is never treated as cancelled.
    pub async fn handle(&self, request: Request<Bytes>) -> Response<Bytes> {
        let (parts, body) = request.into_parts();
        self.dispatch(parts, Ok(body), CancellationToken::new())
            .await
    }

    /// Handle one request whose body may have failed to arrive.
    ///
    /// `cancel` is cancelled by the transport when the caller disconnects.
    /// Handlers can observe it through their context; once the handler
    /// returns, a cancelled request is answered with `canceled`.
    pub(crate) async fn dispatch(
        &self,
        parts: Parts,
        body: Result<Bytes, TwirpError>,
        cancel: CancellationToken,
    ) -> Response<Bytes> {
        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let span = tracing::debug_span!(
            "twirp_request",
            request_id = %request_id,
            path = %parts.uri.path(),
        );

        self.process(parts, body, &request_id, cancel)
            .instrument(span)
            .await
    }

    async fn process(
        &self,
        parts: Parts,
        body: Result<Bytes, TwirpError>,
        request_id: &str,
        cancel: CancellationToken,
    ) -> Response<Bytes> {
        let hooks = &self.config.hooks;
        let path = parts.uri.path();

        let mut ctx = Context::new(self.descriptor.package(), self.descriptor.service())
            .with_request_id(request_id)
            .with_request_headers(parts.headers.clone())
            .with_cancellation(cancel)
            .with_deadline(self.config.handler_timeout.map(|timeout| Instant::now() + timeout));
        hooks.request_received(&ctx);

        let negotiated = CodecKind::negotiate(parts.headers.get(CONTENT_TYPE));
        // Until a codec is agreed on, errors go out as JSON so any peer can read them.
        let error_codec = negotiated.as_ref().map_or(CodecKind::Structured, |codec| *codec);

        if parts.method != Method::POST {
            let err = TwirpError::bad_route(format!(
                "unsupported method {} (only POST is allowed)",
                parts.method
            ))
            .with_meta(META_INVALID_ROUTE, format!("{} {path}", parts.method));
            return self.reject(&ctx, error_codec, err);
        }

        let Some(route) = self.routes.get(path) else {
            let parsed = RoutePath::parse(path).ok();
            warn!(
                path = %path,
                service = ?parsed.as_ref().map(RoutePath::full_service),
                method = ?parsed.as_ref().map(|p| p.method.as_str()),
                "No route matched"
            );
            let err = TwirpError::bad_route(format!("no handler for path {path:?}"))
                .with_meta(META_INVALID_ROUTE, format!("POST {path}"));
            return self.reject(&ctx, error_codec, err);
        };

        ctx.set_method(&route.method);
        debug!(method = %route.method, policy = ?route.policy, "Request routed");
        hooks.request_routed(&ctx);

        let codec = match negotiated {
            Ok(codec) => codec,
            Err(err) => return self.reject(&ctx, error_codec, err),
        };

        let body = match body {
            Ok(body) => body,
            Err(err) => return self.reject(&ctx, codec, err),
        };

        let result = route.handler.call(ctx.clone(), codec, body).await;

        if ctx.is_cancelled() {
            debug!(method = %route.method, "Caller went away before the response was written");
            let err = TwirpError::canceled("the caller disconnected before the response was written");
            return self.reject(&ctx, codec, err);
        }

        match result {
            Ok(body) => self.respond(&ctx, codec, StatusCode::OK, body),
            Err(err) => self.reject(&ctx, codec, err),
        }
    }

    fn reject(&self, ctx: &Context, codec: CodecKind, err: TwirpError) -> Response<Bytes> {
        match err.code() {
            ErrorCode::Internal | ErrorCode::Unknown | ErrorCode::DataLoss => {
                warn!(method = ?ctx.method(), code = %err.code(), error = %err.msg(), "Request failed");
            }
            code => {
                debug!(method = ?ctx.method(), code = %code, error = %err.msg(), "Request failed");
            }
        }

        self.config.hooks.error(ctx, &err);
        let body = codec.encode_error(&err);
        self.respond(ctx, codec, err.http_status(), body)
    }

    fn respond(
        &self,
        ctx: &Context,
        codec: CodecKind,
        status: StatusCode,
        body: Bytes,
    ) -> Response<Bytes> {
        let hooks = &self.config.hooks;
        ctx.set_status(status);
        hooks.response_prepared(ctx);

        let length = HeaderValue::from(body.len());
        let mut response = Response::new(body);
        *response.status_mut() = status;

        let headers = response.headers_mut();
        headers.extend(ctx.response_headers());
        headers.insert(CONTENT_TYPE, codec.header_value());
        headers.insert(CONTENT_LENGTH, length);

        hooks.response_sent(ctx);
        response
    }
}
