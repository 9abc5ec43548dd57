//! Server-side types for twirp_lite.
//!
//! A [`Dispatcher`] owns the route table for one service and turns HTTP
//! requests into handler calls. It can be driven directly with
//! [`Dispatcher::handle`] or mounted on axum with [`Dispatcher::into_router`].

mod config;
mod handler;
mod hooks;
mod router;
mod service;

pub use config::{DEFAULT_MAX_BODY_BYTES, DispatcherConfig, RouteMatch};
pub use handler::{MethodFn, make_method};
pub use hooks::{ServerHook, ServerHooks};
pub use router::{Dispatcher, DispatcherBuilder, META_INVALID_ROUTE, REQUEST_ID_HEADER};
pub use service::axum_router;
