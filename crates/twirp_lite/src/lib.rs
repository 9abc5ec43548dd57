//! A small Twirp-style RPC runtime.
//!
//! Calls are HTTP `POST`s to `{prefix}/{package}.{Service}/{Method}` carrying
//! a protobuf or JSON encoded message. Failures travel as an `{code, msg, meta}`
//! envelope with a fixed HTTP status per code.
//!
//! Service and method identifiers can reach the wire in two spellings: as
//! declared ([`NamingPolicy::Literal`]) or re-cased the way older generated
//! clients did ([`NamingPolicy::LegacyCamelCase`]). Servers accept both by
//! default; clients pick one.
//!
//! - [`server`]: the [`Dispatcher`](server::Dispatcher), hooks and the axum adapter
//! - [`client`]: [`ClientTransport`](client::ClientTransport) over any [`HttpSender`](client::HttpSender)

pub mod client;
pub mod codec;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod naming;
pub mod server;

#[cfg(test)]
mod testing;

pub use codec::{CodecKind, RpcMessage};
pub use context::Context;
pub use descriptor::{MethodDescriptor, ServiceDescriptor};
pub use error::{ErrorCode, TwirpError};
pub use naming::NamingPolicy;
