//! `Haberdasher_v1`, a service whose identifiers carry underscores.
//!
//! This is the glue a code generator would emit for
//!
//! ```text
//! package internal.twirptest.snake_case_names;
//!
//! service Haberdasher_v1 {
//!   rpc MakeHat_v1(MakeHatArgs_v1.Size_v1) returns (MakeHatArgs_v1.Hat_v1);
//! }
//! ```
//!
//! Its method has two paths, which every server built here accepts:
//!
//! - `/twirp/internal.twirptest.snake_case_names.Haberdasher_v1/MakeHat_v1`
//! - `/twirp/internal.twirptest.snake_case_names.HaberdasherV1/MakeHatV1`

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use twirp_lite::client::{ClientConfig, ClientTransport, HttpSender};
use twirp_lite::error::{ClientError, DispatcherError};
use twirp_lite::server::{Dispatcher, DispatcherConfig};
use twirp_lite::{Context, MethodDescriptor, ServiceDescriptor, TwirpError};

pub const PACKAGE: &str = "internal.twirptest.snake_case_names";
pub const SERVICE: &str = "Haberdasher_v1";
pub const MAKE_HAT: &str = "MakeHat_v1";

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeV1 {
    #[prost(int32, tag = "1")]
    pub inches: i32,
}

impl prost::Name for SizeV1 {
    const NAME: &'static str = "MakeHatArgs_v1.Size_v1";
    const PACKAGE: &'static str = PACKAGE;
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct HatV1 {
    #[prost(int32, tag = "1")]
    pub size: i32,
}

impl prost::Name for HatV1 {
    const NAME: &'static str = "MakeHatArgs_v1.Hat_v1";
    const PACKAGE: &'static str = PACKAGE;
}

pub fn descriptor() -> ServiceDescriptor {
    ServiceDescriptor::new(PACKAGE, SERVICE)
        .with_method(MethodDescriptor::typed::<SizeV1, HatV1>(MAKE_HAT))
}

/// Server-side interface of `Haberdasher_v1`.
pub trait HaberdasherV1: Send + Sync + 'static {
    fn make_hat_v1(
        &self,
        ctx: Context,
        size: SizeV1,
    ) -> impl Future<Output = Result<HatV1, TwirpError>> + Send;
}

/// Build a dispatcher serving `service`.
pub fn server<S: HaberdasherV1>(
    service: S,
    config: DispatcherConfig,
) -> Result<Dispatcher, DispatcherError> {
    let service = Arc::new(service);
    let mut builder = Dispatcher::builder(descriptor(), config);

    builder.register(MAKE_HAT, move |ctx: Context, size: SizeV1| {
        let service = Arc::clone(&service);
        async move { service.make_hat_v1(ctx, size).await }
    })?;

    builder.build()
}

/// Makes hats of exactly the requested size.
#[derive(Debug, Clone, Copy, Default)]
pub struct Haberdasher;

impl HaberdasherV1 for Haberdasher {
    async fn make_hat_v1(&self, ctx: Context, size: SizeV1) -> Result<HatV1, TwirpError> {
        if size.inches <= 0 {
            return Err(TwirpError::invalid_argument(
                "inches",
                "I can't make a hat that small!",
            ));
        }
        debug!(request_id = %ctx.request_id(), inches = size.inches, "Making hat");
        Ok(HatV1 { size: size.inches })
    }
}

/// Client for `Haberdasher_v1`.
pub struct HaberdasherV1Client<S> {
    transport: ClientTransport<S>,
}

impl<S: HttpSender> HaberdasherV1Client<S> {
    pub fn new(base_url: &str, sender: S, config: ClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            transport: ClientTransport::new(base_url, descriptor(), sender, config)?,
        })
    }

    pub fn transport(&self) -> &ClientTransport<S> {
        &self.transport
    }

    pub async fn make_hat_v1(&self, size: &SizeV1) -> Result<HatV1, TwirpError> {
        self.transport.call(MAKE_HAT, size).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twirp_lite::naming::NamingPolicy;
    use twirp_lite::{CodecKind, ErrorCode};

    const LITERAL: &str = "/twirp/internal.twirptest.snake_case_names.Haberdasher_v1/MakeHat_v1";
    const CAMEL: &str = "/twirp/internal.twirptest.snake_case_names.HaberdasherV1/MakeHatV1";

    #[test]
    fn test_paths() {
        let descriptor = descriptor();
        let method = descriptor.method(MAKE_HAT).unwrap();
        assert_eq!(
            descriptor.path(NamingPolicy::Literal, "/twirp", method).unwrap(),
            LITERAL
        );
        assert_eq!(
            descriptor
                .path(NamingPolicy::LegacyCamelCase, "/twirp", method)
                .unwrap(),
            CAMEL
        );

        let dispatcher = server(Haberdasher, DispatcherConfig::default()).unwrap();
        assert_eq!(dispatcher.routes(), [CAMEL, LITERAL]);
    }

    #[tokio::test]
    async fn test_in_process_calls() {
        let dispatcher = Arc::new(server(Haberdasher, DispatcherConfig::default()).unwrap());

        for literal in [false, true] {
            for codec in CodecKind::ALL {
                let config = ClientConfig::new()
                    .with_literal_urls(literal)
                    .with_codec(codec);
                let client =
                    HaberdasherV1Client::new("http://localhost", Arc::clone(&dispatcher), config)
                        .unwrap();

                let hat = client.make_hat_v1(&SizeV1 { inches: 1 }).await.unwrap();
                assert_eq!(hat, HatV1 { size: 1 });

                let err = client
                    .make_hat_v1(&SizeV1 { inches: 0 })
                    .await
                    .unwrap_err();
                assert_eq!(err.code(), ErrorCode::InvalidArgument);
            }
        }
    }

    #[tokio::test]
    async fn test_direct_call() {
        let hat = Haberdasher
            .make_hat_v1(Context::new(PACKAGE, SERVICE), SizeV1 { inches: 12 })
            .await
            .unwrap();
        assert_eq!(hat.size, 12);
    }
}
