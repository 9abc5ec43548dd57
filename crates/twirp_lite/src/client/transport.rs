use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use http::{Method, Request, Response, Uri};
use tracing::{debug, info, warn};
use url::Url;

use crate::client::config::ClientConfig;
use crate::client::sender::{HttpSender, error_chain};
use crate::codec::{CodecKind, RpcMessage};
use crate::descriptor::ServiceDescriptor;
use crate::error::{ClientError, TwirpError};
use crate::naming::normalize_prefix;

/// Sends calls for one service over an injected [`HttpSender`].
///
/// Method URLs are derived once, when the transport is built, from the base
/// URL, the path prefix and the configured naming policy.
///
/// # Example
///
/// ```ignore
/// let transport = ClientTransport::new(
///     "http://localhost:8080",
///     haberdasher::descriptor(),
///     reqwest::Client::new(),
///     ClientConfig::new().with_literal_urls(true),
/// )?;
/// let hat: HatV1 = transport.call("MakeHat_v1", &SizeV1 { inches: 1 }).await?;
/// ```
pub struct ClientTransport<S> {
    sender: S,
    descriptor: Arc<ServiceDescriptor>,
    config: ClientConfig,
    base_url: Url,
    uris: HashMap<String, Uri, ahash::RandomState>,
}

impl<S: HttpSender> ClientTransport<S> {
    pub fn new(
        base_url: &str,
        descriptor: ServiceDescriptor,
        sender: S,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() || base_url.host().is_none() {
            return Err(ClientError::UnsupportedUrl(base_url.to_string()));
        }

        let prefix = normalize_prefix(&config.path_prefix);
        let base_path = base_url.path().trim_end_matches('/').to_owned();

        let mut uris = HashMap::default();
        for method in descriptor.methods() {
            let path = descriptor.path(config.naming, &prefix, method)?;

            let mut url = base_url.clone();
            url.set_path(&format!("{base_path}{path}"));
            url.set_query(None);
            url.set_fragment(None);

            let uri: Uri = url.as_str().parse()?;
            debug!(method = %method.name(), uri = %uri, "Derived method URL");
            uris.insert(method.name().to_owned(), uri);
        }

        info!(
            service = %descriptor.full_name(),
            base_url = %base_url,
            naming = ?config.naming,
            codec = ?config.codec,
            "Client transport ready"
        );

        Ok(Self {
            sender,
            descriptor: Arc::new(descriptor),
            config,
            base_url,
            uris,
        })
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The URL a method's requests are sent to.
    pub fn uri_for(&self, method: &str) -> Option<&Uri> {
        self.uris.get(method)
    }

    /// Call `method` with `input` and decode its output.
    ///
    /// Every failure is a [`TwirpError`]: errors sent by the server come back
    /// unchanged, a response that is not a protocol error becomes `Internal`
    /// with the intermediary meta set, and a failure to get any response at
    /// all becomes `Internal` with the cause in the message.
    pub async fn call<I, O>(&self, method: &str, input: &I) -> Result<O, TwirpError>
    where
        I: RpcMessage,
        O: RpcMessage,
    {
        let uri = self.uri_for(method).ok_or_else(|| {
            TwirpError::internal(format!(
                "service {} has no method {method:?}",
                self.descriptor.full_name()
            ))
        })?;

        let codec = self.config.codec;
        let body = codec
            .encode(input)
            .map_err(|e| TwirpError::internal_with("failed to marshal request", e))?;

        let mut request = Request::new(body);
        *request.method_mut() = Method::POST;
        *request.uri_mut() = uri.clone();
        let headers = request.headers_mut();
        headers.extend(self.config.headers.clone());
        headers.insert(CONTENT_TYPE, codec.header_value());
        headers.insert(ACCEPT, codec.header_value());

        debug!(method = %method, uri = %uri, codec = ?codec, "Sending request");

        let response = self.sender.send(request).await.map_err(|e| {
            warn!(method = %method, uri = %uri, error = %e, "Request failed to send");
            TwirpError::internal_with("failed to do request", error_chain(&*e))
        })?;

        read_response(codec, response)
    }
}

fn read_response<O: RpcMessage>(codec: CodecKind, response: Response<Bytes>) -> Result<O, TwirpError> {
    let status = response.status();
    if status.is_success() {
        return codec
            .decode(response.body())
            .map_err(|e| TwirpError::internal_with("failed to unmarshal response", e));
    }

    let headers = response.headers();
    let location = headers.get(LOCATION).and_then(|value| value.to_str().ok());
    let error_codec = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(CodecKind::from_content_type);

    // Redirects are never protocol errors, whatever they claim to contain.
    let err = match error_codec {
        Some(error_codec) if !status.is_redirection() => {
            match error_codec.decode_error(response.body()) {
                Ok(err) => err,
                Err(e) => {
                    debug!(status = %status, error = %e, "Error body is not a protocol error");
                    TwirpError::from_intermediary(status, response.body(), location)
                }
            }
        }
        _ => TwirpError::from_intermediary(status, response.body(), location),
    };

    debug!(status = %status, code = %err.code(), "Call failed");
    Err(err)
}
