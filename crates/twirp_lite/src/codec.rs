use bytes::Bytes;
use http::HeaderValue;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{CodecError, ErrorEnvelope, TwirpError};

pub const CONTENT_TYPE_PROTOBUF: &str = "application/protobuf";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// A message type that can travel through either codec.
///
/// Generated message types derive `prost::Message` and serde, and implement
/// `prost::Name` so descriptors can check them against declared type tags.
pub trait RpcMessage:
    prost::Message + prost::Name + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> RpcMessage for T where
    T: prost::Message
        + prost::Name
        + Default
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// The two wire encodings, selected per request by `Content-Type`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CodecKind {
    /// Protobuf binary encoding.
    #[default]
    Binary,

    /// JSON encoding.
    Structured,
}

impl CodecKind {
    pub const ALL: [CodecKind; 2] = [CodecKind::Binary, CodecKind::Structured];

    pub fn content_type(&self) -> &'static str {
        match self {
            CodecKind::Binary => CONTENT_TYPE_PROTOBUF,
            CodecKind::Structured => CONTENT_TYPE_JSON,
        }
    }

    pub fn header_value(&self) -> HeaderValue {
        HeaderValue::from_static(self.content_type())
    }

    /// Match a `Content-Type` value against the codec tokens.
    ///
    /// Parameters such as `; charset=utf-8` are ignored and the media type is
    /// compared case-insensitively.
    pub fn from_content_type(value: &str) -> Option<CodecKind> {
        let media = value.split_once(';').map_or(value, |(media, _)| media).trim();
        CodecKind::ALL
            .into_iter()
            .find(|kind| kind.content_type().eq_ignore_ascii_case(media))
    }

    /// Pick the codec for a request. A missing header means binary.
    pub fn negotiate(header: Option<&HeaderValue>) -> Result<CodecKind, TwirpError> {
        let Some(header) = header else {
            return Ok(CodecKind::Binary);
        };

        header
            .to_str()
            .ok()
            .and_then(CodecKind::from_content_type)
            .ok_or_else(|| {
                TwirpError::unimplemented(format!(
                    "unexpected Content-Type: {:?}",
                    String::from_utf8_lossy(header.as_bytes())
                ))
            })
    }

    pub fn encode<M>(&self, msg: &M) -> Result<Bytes, CodecError>
    where
        M: prost::Message + Serialize,
    {
        match self {
            CodecKind::Binary => {
                let mut buf = Vec::with_capacity(msg.encoded_len());
                msg.encode(&mut buf)?;
                Ok(Bytes::from(buf))
            }
            CodecKind::Structured => Ok(Bytes::from(serde_json::to_vec(msg)?)),
        }
    }

    pub fn decode<M>(&self, bytes: &[u8]) -> Result<M, CodecError>
    where
        M: prost::Message + Default + DeserializeOwned,
    {
        match self {
            CodecKind::Binary => Ok(M::decode(bytes)?),
            CodecKind::Structured => Ok(serde_json::from_slice(bytes)?),
        }
    }

    /// Encode an error as an [`ErrorEnvelope`].
    pub fn encode_error(&self, err: &TwirpError) -> Bytes {
        let envelope = ErrorEnvelope::from(err);
        match self {
            CodecKind::Binary => Bytes::from(prost::Message::encode_to_vec(&envelope)),
            // A struct of strings and a string map always serializes.
            CodecKind::Structured => Bytes::from(serde_json::to_vec(&envelope).unwrap_or_default()),
        }
    }

    pub fn decode_error(&self, bytes: &[u8]) -> Result<TwirpError, CodecError> {
        let envelope: ErrorEnvelope = self.decode(bytes)?;
        Ok(TwirpError::from(envelope))
    }
}
