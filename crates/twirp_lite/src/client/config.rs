use http::{HeaderMap, HeaderName, HeaderValue};

use crate::codec::CodecKind;
use crate::naming::{DEFAULT_PREFIX, NamingPolicy};

/// Configuration for a client transport.
///
/// Fixed once the transport is built; a client never switches naming policy
/// or codec mid-session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How method paths are spelled on the wire.
    pub naming: NamingPolicy,

    /// Encoding used for requests.
    pub codec: CodecKind,

    /// Prefix in front of `{package}.{service}/{method}` (e.g. "/twirp").
    pub path_prefix: String,

    /// Headers sent with every request.
    pub headers: HeaderMap,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            naming: NamingPolicy::LegacyCamelCase,
            codec: CodecKind::Binary,
            path_prefix: DEFAULT_PREFIX.to_string(),
            headers: HeaderMap::new(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the naming policy.
    pub fn with_naming(mut self, naming: NamingPolicy) -> Self {
        self.naming = naming;
        self
    }

    /// Send literal paths when `true`, legacy camel-case paths otherwise.
    pub fn with_literal_urls(self, literal: bool) -> Self {
        self.with_naming(if literal {
            NamingPolicy::Literal
        } else {
            NamingPolicy::LegacyCamelCase
        })
    }

    /// Set the request codec.
    pub fn with_codec(mut self, codec: CodecKind) -> Self {
        self.codec = codec;
        self
    }

    /// Set the path prefix.
    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}
