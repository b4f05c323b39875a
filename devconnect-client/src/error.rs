use thiserror::Error;
use tonic::Code;

#[derive(Debug, Error)]
/// Errors returned by `devconnect-client`.
pub enum ClientError {
    /// HTTP transport failure (`reqwest`).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A gRPC call returned a status the client does not map.
    #[error("grpc status error: {0}")]
    GrpcStatus(#[from] tonic::Status),

    /// gRPC connection or channel failure.
    #[error("grpc transport error: {0}")]
    GrpcTransport(#[from] tonic::transport::Error),

    /// A cached value could not be (de)serialized.
    #[error("cache codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Missing or rejected token.
    #[error("unauthorized")]
    Unauthorized,

    /// The caller is signed in but not allowed to do this.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist.
    #[error("not found")]
    NotFound,

    /// The resource already exists (duplicate follow, username taken).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Invalid input or a business rule violation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The server failed to handle a valid request.
    #[error("server error: {0}")]
    Server(String),
}

/// Result of `devconnect-client` operations.
pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub(crate) fn from_http_status(status: reqwest::StatusCode, message: Option<String>) -> Self {
        let message = message.unwrap_or_else(|| format!("http status {status}"));
        match status {
            reqwest::StatusCode::UNAUTHORIZED => Self::Unauthorized,
            reqwest::StatusCode::FORBIDDEN => Self::Forbidden(message),
            reqwest::StatusCode::NOT_FOUND => Self::NotFound,
            reqwest::StatusCode::CONFLICT => Self::Conflict(message),
            status if status.is_server_error() => Self::Server(message),
            _ => Self::InvalidRequest(message),
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_http_status(status, None);
        }
        Self::Http(err)
    }

    pub(crate) fn from_grpc_status(status: tonic::Status) -> Self {
        match status.code() {
            Code::Unauthenticated => Self::Unauthorized,
            Code::PermissionDenied => Self::Forbidden(status.message().to_string()),
            Code::NotFound => Self::NotFound,
            Code::AlreadyExists => Self::Conflict(status.message().to_string()),
            Code::InvalidArgument | Code::FailedPrecondition => {
                Self::InvalidRequest(status.message().to_string())
            }
            _ => Self::GrpcStatus(status),
        }
    }

    /// Whether a query may be retried: transport hiccups and server-side failures.
    /// Client mistakes (4xx) are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::GrpcTransport(_) | Self::Server(_) => true,
            Self::GrpcStatus(status) => matches!(
                status.code(),
                Code::Unavailable | Code::DeadlineExceeded | Code::Internal | Code::Unknown
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use tonic::Code;

    use super::ClientError;

    #[test]
    fn http_statuses_map_to_variants() {
        let conflict =
            ClientError::from_http_status(reqwest::StatusCode::CONFLICT, Some("taken".into()));
        assert!(matches!(conflict, ClientError::Conflict(msg) if msg == "taken"));

        let server = ClientError::from_http_status(reqwest::StatusCode::BAD_GATEWAY, None);
        assert!(matches!(server, ClientError::Server(_)));

        let bad = ClientError::from_http_status(reqwest::StatusCode::BAD_REQUEST, None);
        assert!(matches!(bad, ClientError::InvalidRequest(_)));
    }

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(ClientError::Server("boom".into()).is_retryable());
        assert!(ClientError::GrpcStatus(tonic::Status::new(Code::Unavailable, "")).is_retryable());
        assert!(!ClientError::NotFound.is_retryable());
        assert!(!ClientError::InvalidRequest("bad".into()).is_retryable());
        assert!(!ClientError::Unauthorized.is_retryable());
    }

    #[test]
    fn grpc_status_mapping_covers_common_business_errors() {
        let unauth = ClientError::from_grpc_status(tonic::Status::new(Code::Unauthenticated, ""));
        assert!(matches!(unauth, ClientError::Unauthorized));

        let invalid =
            ClientError::from_grpc_status(tonic::Status::new(Code::InvalidArgument, "bad input"));
        match invalid {
            ClientError::InvalidRequest(msg) => assert_eq!(msg, "bad input"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
