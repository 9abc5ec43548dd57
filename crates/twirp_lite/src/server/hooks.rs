use std::fmt;
use std::sync::Arc;

use impl_trait_for_tuples::impl_for_tuples;

use crate::context::Context;
use crate::error::TwirpError;

/// Observer of the request lifecycle.
///
/// Hooks run at fixed points of every request, in registration order. They
/// can record metrics or attach response headers through the [`Context`],
/// but they cannot change which handler runs or what error is returned.
///
/// Tuples of hooks are hooks too, so `(metrics, audit)` runs both in order.
pub trait ServerHook: Send + Sync {
    /// The request has arrived. Only package and service are known.
    fn request_received(&self, _ctx: &Context) {}

    /// The path matched a method; [`Context::method`] is set.
    fn request_routed(&self, _ctx: &Context) {}

    /// The response status is decided; [`Context::status_code`] is set.
    fn response_prepared(&self, _ctx: &Context) {}

    /// The response has been handed to the transport.
    fn response_sent(&self, _ctx: &Context) {}

    /// The request is failing with `err`. Runs before `response_prepared`.
    fn error(&self, _ctx: &Context, _err: &TwirpError) {}
}

#[impl_for_tuples(1, 8)]
impl ServerHook for Tuple {
    fn request_received(&self, ctx: &Context) {
        for_tuples!( #( Tuple.request_received(ctx); )* );
    }

    fn request_routed(&self, ctx: &Context) {
        for_tuples!( #( Tuple.request_routed(ctx); )* );
    }

    fn response_prepared(&self, ctx: &Context) {
        for_tuples!( #( Tuple.response_prepared(ctx); )* );
    }

    fn response_sent(&self, ctx: &Context) {
        for_tuples!( #( Tuple.response_sent(ctx); )* );
    }

    fn error(&self, ctx: &Context, err: &TwirpError) {
        for_tuples!( #( Tuple.error(ctx, err); )* );
    }
}

/// An ordered list of hooks.
#[derive(Clone, Default)]
pub struct ServerHooks {
    hooks: Vec<Arc<dyn ServerHook>>,
}

impl ServerHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook; it runs after every hook added before it.
    pub fn with(mut self, hook: impl ServerHook + 'static) -> Self {
        self.push(hook);
        self
    }

    pub fn push(&mut self, hook: impl ServerHook + 'static) {
        self.hooks.push(Arc::new(hook));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl ServerHook for ServerHooks {
    fn request_received(&self, ctx: &Context) {
        self.hooks.iter().for_each(|hook| hook.request_received(ctx));
    }

    fn request_routed(&self, ctx: &Context) {
        self.hooks.iter().for_each(|hook| hook.request_routed(ctx));
    }

    fn response_prepared(&self, ctx: &Context) {
        self.hooks.iter().for_each(|hook| hook.response_prepared(ctx));
    }

    fn response_sent(&self, ctx: &Context) {
        self.hooks.iter().for_each(|hook| hook.response_sent(ctx));
    }

    fn error(&self, ctx: &Context, err: &TwirpError) {
        self.hooks.iter().for_each(|hook| hook.error(ctx, err));
    }
}

impl fmt::Debug for ServerHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerHooks")
            .field("len", &self.hooks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ServerHook for Recorder {
        fn request_received(&self, _ctx: &Context) {
            self.log.lock().unwrap().push(format!("{}:received", self.name));
        }

        fn error(&self, _ctx: &Context, err: &TwirpError) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:error:{}", self.name, err.code()));
        }
    }

    #[test]
    fn test_hooks_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hooks = ServerHooks::new()
            .with(Recorder { name: "first", log: Arc::clone(&log) })
            .with(Recorder { name: "second", log: Arc::clone(&log) });
        assert_eq!(hooks.len(), 2);

        let ctx = Context::new("pkg", "Svc");
        hooks.request_received(&ctx);
        hooks.error(&ctx, &TwirpError::bad_route("nope"));

        assert_eq!(
            *log.lock().unwrap(),
            [
                "first:received",
                "second:received",
                "first:error:bad_route",
                "second:error:bad_route"
            ]
        );
    }

    #[test]
    fn test_tuple_of_hooks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pair = (
            Recorder { name: "a", log: Arc::clone(&log) },
            Recorder { name: "b", log: Arc::clone(&log) },
        );

        pair.request_received(&Context::new("pkg", "Svc"));
        // Methods a hook doesn't override are no-ops.
        pair.response_sent(&Context::new("pkg", "Svc"));

        assert_eq!(*log.lock().unwrap(), ["a:received", "b:received"]);
    }
}
