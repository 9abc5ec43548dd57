use std::time::Duration;

use bon::Builder;

use crate::naming::{DEFAULT_PREFIX, NamingPolicy};
use crate::server::hooks::ServerHooks;

/// Largest request body read by the HTTP adapter unless configured otherwise.
pub const DEFAULT_MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Which path forms the dispatcher accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RouteMatch {
    /// Accept both the literal and the legacy camel-case path of every method.
    #[default]
    Both,

    /// Accept only literal paths.
    LiteralOnly,

    /// Accept only legacy camel-case paths.
    LegacyCamelOnly,
}

impl RouteMatch {
    /// The naming policies whose paths go into the route table.
    pub fn policies(&self) -> &'static [NamingPolicy] {
        match self {
            RouteMatch::Both => &[NamingPolicy::Literal, NamingPolicy::LegacyCamelCase],
            RouteMatch::LiteralOnly => &[NamingPolicy::Literal],
            RouteMatch::LegacyCamelOnly => &[NamingPolicy::LegacyCamelCase],
        }
    }
}

/// Configuration for the dispatcher.
///
/// ```ignore
/// let config = DispatcherConfig::builder()
///     .path_prefix("/rpc")
///     .route_match(RouteMatch::LiteralOnly)
///     .hooks(ServerHooks::new().with(metrics_hook))
///     .build();
/// ```
#[derive(Debug, Clone, Builder)]
pub struct DispatcherConfig {
    /// Prefix in front of `{package}.{service}/{method}` (e.g. "/twirp").
    #[builder(into, default = DEFAULT_PREFIX.to_owned())]
    pub path_prefix: String,

    /// Path forms accepted for each method.
    #[builder(default)]
    pub route_match: RouteMatch,

    /// Lifecycle observers, run in order.
    #[builder(default)]
    pub hooks: ServerHooks,

    /// Deadline given to handlers through the context. Handlers are never interrupted.
    pub handler_timeout: Option<Duration>,

    /// Request bodies larger than this are rejected by the HTTP adapter.
    #[builder(default = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatcherConfig::default();
        assert_eq!(config.path_prefix, "/twirp");
        assert_eq!(config.route_match, RouteMatch::Both);
        assert!(config.hooks.is_empty());
        assert_eq!(config.handler_timeout, None);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn test_route_match_policies() {
        assert_eq!(RouteMatch::Both.policies().len(), 2);
        assert_eq!(RouteMatch::LiteralOnly.policies(), [NamingPolicy::Literal]);
        assert_eq!(
            RouteMatch::LegacyCamelOnly.policies(),
            [NamingPolicy::LegacyCamelCase]
        );
    }
}
