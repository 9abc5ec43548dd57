//! Shared fixtures for unit tests: a small hat shop service.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use http::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::descriptor::{MethodDescriptor, ServiceDescriptor};
use crate::error::TwirpError;
use crate::server::{Dispatcher, DispatcherConfig};

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Size {
    #[prost(int32, tag = "1")]
    pub inches: i32,
}

impl prost::Name for Size {
    const NAME: &'static str = "Size";
    const PACKAGE: &'static str = "example.hats";
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Hat {
    #[prost(int32, tag = "1")]
    pub size: i32,
    #[prost(string, tag = "2")]
    pub color: String,
}

impl prost::Name for Hat {
    const NAME: &'static str = "Hat";
    const PACKAGE: &'static str = "example.hats";
}

impl Hat {
    pub fn sized(size: i32) -> Self {
        Self {
            size,
            color: "red".into(),
        }
    }
}

/// `example.hats.Hat_shop` with `Make_hat` and `Ping`.
pub fn hat_shop_descriptor() -> ServiceDescriptor {
    ServiceDescriptor::new("example.hats", "Hat_shop")
        .with_method(MethodDescriptor::typed::<Size, Hat>("Make_hat"))
        .with_method(MethodDescriptor::typed::<Size, Size>("Ping"))
}

/// A dispatcher for the hat shop and a count of `Make_hat` calls.
///
/// `Make_hat` rejects non-positive sizes, panics on 666, and paints the hat
/// "red-with-deadline" when its context carries a deadline.
pub fn hat_shop(config: DispatcherConfig) -> (Dispatcher, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut builder = Dispatcher::builder(hat_shop_descriptor(), config);

    let counter = Arc::clone(&calls);
    builder
        .register("Make_hat", move |ctx: Context, size: Size| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if size.inches <= 0 {
                    return Err(TwirpError::invalid_argument("inches", "must be positive"));
                }
                if size.inches == 666 {
                    panic!("cursed hat size");
                }

                ctx.set_response_header(
                    HeaderName::from_static("x-hat-maker"),
                    HeaderValue::from_static("test"),
                )
                .map_err(|e| TwirpError::internal(e.to_string()))?;

                let color = if ctx.deadline().is_some() {
                    "red-with-deadline"
                } else {
                    "red"
                };
                Ok(Hat {
                    size: size.inches,
                    color: color.into(),
                })
            }
        })
        .expect("Make_hat registers");

    builder
        .register("Ping", |_ctx: Context, size: Size| async move { Ok(size) })
        .expect("Ping registers");

    (builder.build().expect("hat shop builds"), calls)
}
