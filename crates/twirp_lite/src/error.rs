use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use http::StatusCode;
use http::header::HeaderName;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while building or parsing route paths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum NamingError {
    /// A package, service, or method identifier cannot appear in a path.
    #[error("invalid {component} identifier '{value}': {reason}")]
    InvalidIdentifier {
        component: &'static str,
        value: String,
        reason: &'static str,
    },

    /// A request path does not have the `prefix/package.service/method` shape.
    #[error("invalid route path: {0}")]
    InvalidPath(String),
}

/// Errors produced by the binary and structured codecs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// Failed to encode a protobuf message.
    #[error("protobuf encode error: {0}")]
    Encode(#[from] prost::EncodeError),

    /// Failed to decode a protobuf message.
    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Failed to encode or decode JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while building a dispatcher.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DispatcherError {
    /// A descriptor identifier cannot be turned into a path.
    #[error(transparent)]
    Naming(#[from] NamingError),

    /// A handler was registered for a method the descriptor does not declare.
    #[error("service '{service}' has no method '{method}'")]
    UnknownMethod { service: String, method: String },

    /// The descriptor declares the same method name more than once.
    #[error("method '{0}' is declared more than once")]
    DuplicateMethod(String),

    /// Two handlers were registered for the same method.
    #[error("a handler is already registered for '{0}'")]
    DuplicateHandler(String),

    /// The handler's message types do not match the descriptor.
    #[error("method '{method}' declares {expected}, handler uses {found}")]
    TypeMismatch {
        method: String,
        expected: String,
        found: String,
    },

    /// A declared method has no handler.
    #[error("no handler registered for '{0}'")]
    Unbound(String),

    /// Two methods map to the same path.
    #[error("route '{path}' is claimed by both '{first}' and '{second}'")]
    RouteCollision {
        path: String,
        first: String,
        second: String,
    },
}

/// Errors that can occur when constructing a client transport.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The base URL does not parse.
    #[error("invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The base URL parses but cannot carry a path.
    #[error("base URL cannot be used for requests: {0}")]
    UnsupportedUrl(String),

    /// A method URL is not a valid request URI.
    #[error("invalid request URI: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),

    /// A descriptor identifier cannot be turned into a path.
    #[error(transparent)]
    Naming(#[from] NamingError),
}

/// Errors returned when attaching response headers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum HeaderError {
    /// The header is owned by the protocol and cannot be set by handlers or hooks.
    #[error("header '{0}' is reserved")]
    Reserved(HeaderName),
}

/// The closed set of error kinds that may cross the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Canceled,
    Unknown,
    InvalidArgument,
    Malformed,
    DeadlineExceeded,
    NotFound,
    BadRoute,
    AlreadyExists,
    PermissionDenied,
    Unauthenticated,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 18] = [
        ErrorCode::Canceled,
        ErrorCode::Unknown,
        ErrorCode::InvalidArgument,
        ErrorCode::Malformed,
        ErrorCode::DeadlineExceeded,
        ErrorCode::NotFound,
        ErrorCode::BadRoute,
        ErrorCode::AlreadyExists,
        ErrorCode::PermissionDenied,
        ErrorCode::Unauthenticated,
        ErrorCode::ResourceExhausted,
        ErrorCode::FailedPrecondition,
        ErrorCode::Aborted,
        ErrorCode::OutOfRange,
        ErrorCode::Unimplemented,
        ErrorCode::Internal,
        ErrorCode::Unavailable,
        ErrorCode::DataLoss,
    ];

    /// The code's wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Canceled => "canceled",
            ErrorCode::Unknown => "unknown",
            ErrorCode::InvalidArgument => "invalid_argument",
            ErrorCode::Malformed => "malformed",
            ErrorCode::DeadlineExceeded => "deadline_exceeded",
            ErrorCode::NotFound => "not_found",
            ErrorCode::BadRoute => "bad_route",
            ErrorCode::AlreadyExists => "already_exists",
            ErrorCode::PermissionDenied => "permission_denied",
            ErrorCode::Unauthenticated => "unauthenticated",
            ErrorCode::ResourceExhausted => "resource_exhausted",
            ErrorCode::FailedPrecondition => "failed_precondition",
            ErrorCode::Aborted => "aborted",
            ErrorCode::OutOfRange => "out_of_range",
            ErrorCode::Unimplemented => "unimplemented",
            ErrorCode::Internal => "internal",
            ErrorCode::Unavailable => "unavailable",
            ErrorCode::DataLoss => "data_loss",
        }
    }

    /// Parse a wire name. Names outside the closed set become `Unknown`.
    pub fn from_wire(name: &str) -> ErrorCode {
        ErrorCode::ALL
            .into_iter()
            .find(|code| code.as_str() == name)
            .unwrap_or(ErrorCode::Unknown)
    }

    /// The HTTP status this code is sent with. Changing this table breaks peers.
    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::Canceled => StatusCode::REQUEST_TIMEOUT,
            ErrorCode::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorCode::Malformed => StatusCode::BAD_REQUEST,
            ErrorCode::DeadlineExceeded => StatusCode::REQUEST_TIMEOUT,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::BadRoute => StatusCode::NOT_FOUND,
            ErrorCode::AlreadyExists => StatusCode::CONFLICT,
            ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorCode::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
            ErrorCode::Aborted => StatusCode::CONFLICT,
            ErrorCode::OutOfRange => StatusCode::BAD_REQUEST,
            ErrorCode::Unimplemented => StatusCode::NOT_IMPLEMENTED,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl FromStr for ErrorCode {
    type Err = Infallible;

    /// Same as [`ErrorCode::from_wire`]; parsing never fails.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Ok(ErrorCode::from_wire(name))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Meta key set on errors synthesized from a non-protocol HTTP response.
pub const META_FROM_INTERMEDIARY: &str = "http_error_from_intermediary";
/// Meta key holding the raw HTTP status of a non-protocol response.
pub const META_STATUS_CODE: &str = "status_code";
/// Meta key holding the raw body of a non-protocol response.
pub const META_BODY: &str = "body";
/// Meta key holding the `Location` of an unexpected redirect.
pub const META_LOCATION: &str = "location";

/// The error every call can fail with: a code, a message, and string metadata.
///
/// Handlers return it, the dispatcher encodes it, and the client decodes
/// every failure (protocol, intermediary, or transport) into it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("twirp error {code}: {msg}")]
pub struct TwirpError {
    code: ErrorCode,
    msg: String,
    meta: HashMap<String, String>,
}

impl TwirpError {
    pub fn new(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            meta: HashMap::new(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, msg)
    }

    pub fn bad_route(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRoute, msg)
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Malformed, msg)
    }

    pub fn unimplemented(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unimplemented, msg)
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, msg)
    }

    pub fn canceled(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Canceled, msg)
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unknown, msg)
    }

    pub fn deadline_exceeded(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::DeadlineExceeded, msg)
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::AlreadyExists, msg)
    }

    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthenticated, msg)
    }

    pub fn resource_exhausted(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceExhausted, msg)
    }

    pub fn failed_precondition(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::FailedPrecondition, msg)
    }

    pub fn aborted(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Aborted, msg)
    }

    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::OutOfRange, msg)
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unavailable, msg)
    }

    pub fn data_loss(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::DataLoss, msg)
    }

    /// An invalid argument error naming the offending argument in its metadata.
    pub fn invalid_argument(argument: &str, reason: &str) -> Self {
        Self::new(ErrorCode::InvalidArgument, format!("{argument} {reason}"))
            .with_meta("argument", argument)
    }

    /// Wrap a lower-level failure as `Internal`, keeping its text in the message.
    pub fn internal_with(context: &str, cause: impl fmt::Display) -> Self {
        Self::internal(format!("{context}: {cause}"))
    }

    /// Build the error a client reports for a non-protocol HTTP response,
    /// e.g. a reverse proxy answering 502 before the server was reached.
    pub fn from_intermediary(status: StatusCode, body: &[u8], location: Option<&str>) -> Self {
        let reason = status.canonical_reason().unwrap_or("");
        let msg = match location {
            Some(location) if status.is_redirection() => format!(
                "unexpected HTTP status code {} \"{reason}\" received, Location=\"{location}\"",
                status.as_u16()
            ),
            _ => format!(
                "Error from intermediary with HTTP status code {} \"{reason}\"",
                status.as_u16()
            ),
        };

        let mut err = Self::internal(msg)
            .with_meta(META_FROM_INTERMEDIARY, "true")
            .with_meta(META_STATUS_CODE, status.as_u16().to_string())
            .with_meta(META_BODY, String::from_utf8_lossy(body));
        if let Some(location) = location {
            err = err.with_meta(META_LOCATION, location);
        }
        err
    }

    /// Attach a metadata entry, replacing any previous value for the key.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }

    pub fn meta(&self) -> &HashMap<String, String> {
        &self.meta
    }

    pub fn meta_value(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }
}

/// The wire form of [`TwirpError`].
///
/// The same three fields serve both codecs: a JSON object with keys `code`,
/// `msg`, and `meta` (omitted when empty), or a protobuf message with fields
/// 1, 2, and 3.
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorEnvelope {
    #[prost(string, tag = "1")]
    pub code: String,

    #[prost(string, tag = "2")]
    pub msg: String,

    #[prost(map = "string, string", tag = "3")]
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub meta: HashMap<String, String>,
}

impl From<&TwirpError> for ErrorEnvelope {
    fn from(err: &TwirpError) -> Self {
        ErrorEnvelope {
            code: err.code.as_str().to_owned(),
            msg: err.msg.clone(),
            meta: err.meta.clone(),
        }
    }
}

impl From<ErrorEnvelope> for TwirpError {
    fn from(envelope: ErrorEnvelope) -> Self {
        TwirpError {
            code: ErrorCode::from_wire(&envelope.code),
            msg: envelope.msg,
            meta: envelope.meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_table() {
        let expected = [
            (ErrorCode::NotFound, 404),
            (ErrorCode::PermissionDenied, 403),
            (ErrorCode::Internal, 500),
            (ErrorCode::Unimplemented, 501),
            (ErrorCode::ResourceExhausted, 429),
            (ErrorCode::Canceled, 408),
            (ErrorCode::DeadlineExceeded, 408),
            (ErrorCode::BadRoute, 404),
            (ErrorCode::Malformed, 400),
            (ErrorCode::Unauthenticated, 401),
            (ErrorCode::FailedPrecondition, 412),
            (ErrorCode::AlreadyExists, 409),
            (ErrorCode::Unavailable, 503),
        ];
        for (code, status) in expected {
            assert_eq!(code.http_status().as_u16(), status, "{code}");
        }
    }

    #[test]
    fn test_wire_names_round_trip() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_wire(code.as_str()), code);
        }
    }

    #[test]
    fn test_unknown_wire_name_is_unknown() {
        assert_eq!(ErrorCode::from_wire("teapot"), ErrorCode::Unknown);
        assert_eq!(ErrorCode::from_wire(""), ErrorCode::Unknown);

        let envelope = ErrorEnvelope {
            code: "not_a_code".into(),
            msg: "odd peer".into(),
            meta: HashMap::new(),
        };
        let err = TwirpError::from(envelope);
        assert_eq!(err.code(), ErrorCode::Unknown);
        assert_eq!(err.msg(), "odd peer");
    }

    #[test]
    fn test_parse_code() {
        for code in ErrorCode::ALL {
            assert_eq!(code.as_str().parse::<ErrorCode>(), Ok(code));
        }
        assert_eq!("hat_on_fire".parse::<ErrorCode>(), Ok(ErrorCode::Unknown));
    }

    #[test]
    fn test_constructor_codes() {
        let cases = [
            (TwirpError::unknown("x"), ErrorCode::Unknown),
            (TwirpError::deadline_exceeded("x"), ErrorCode::DeadlineExceeded),
            (TwirpError::already_exists("x"), ErrorCode::AlreadyExists),
            (TwirpError::unauthenticated("x"), ErrorCode::Unauthenticated),
            (TwirpError::resource_exhausted("x"), ErrorCode::ResourceExhausted),
            (TwirpError::failed_precondition("x"), ErrorCode::FailedPrecondition),
            (TwirpError::aborted("x"), ErrorCode::Aborted),
            (TwirpError::out_of_range("x"), ErrorCode::OutOfRange),
            (TwirpError::unavailable("x"), ErrorCode::Unavailable),
            (TwirpError::data_loss("x"), ErrorCode::DataLoss),
            (TwirpError::permission_denied("x"), ErrorCode::PermissionDenied),
            (TwirpError::not_found("x"), ErrorCode::NotFound),
        ];
        for (err, code) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.msg(), "x");
            assert_eq!(err.http_status(), code.http_status());
        }
    }

    #[test]
    fn test_display() {
        let err = TwirpError::internal_with("failed to do request", "connection refused");
        assert_eq!(
            err.to_string(),
            "twirp error internal: failed to do request: connection refused"
        );
    }

    #[test]
    fn test_invalid_argument_meta() {
        let err = TwirpError::invalid_argument("inches", "must be positive");
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert_eq!(err.msg(), "inches must be positive");
        assert_eq!(err.meta_value("argument"), Some("inches"));
    }

    #[test]
    fn test_from_intermediary() {
        let err = TwirpError::from_intermediary(StatusCode::BAD_GATEWAY, b"upstream down", None);
        assert_eq!(err.code(), ErrorCode::Internal);
        assert_eq!(
            err.msg(),
            "Error from intermediary with HTTP status code 502 \"Bad Gateway\""
        );
        assert_eq!(err.meta_value(META_FROM_INTERMEDIARY), Some("true"));
        assert_eq!(err.meta_value(META_STATUS_CODE), Some("502"));
        assert_eq!(err.meta_value(META_BODY), Some("upstream down"));
        assert_eq!(err.meta_value(META_LOCATION), None);
    }

    #[test]
    fn test_from_intermediary_redirect() {
        let err = TwirpError::from_intermediary(StatusCode::FOUND, b"", Some("https://elsewhere"));
        assert_eq!(err.code(), ErrorCode::Internal);
        assert!(err.msg().contains("Location=\"https://elsewhere\""));
        assert_eq!(err.meta_value(META_LOCATION), Some("https://elsewhere"));
    }
}
