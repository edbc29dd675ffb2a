//! Error taxonomy for the forwarding path.
//!
//! None of these are recovered locally: every variant travels back to the
//! inbound handler and becomes a caller-visible failure response. There is
//! deliberately no retry, no circuit breaking and no fallback value.

use std::fmt;

use http::StatusCode;

/// Everything that can go wrong between the gateway and the prediction
/// service on a single forwarding attempt.
#[derive(Debug)]
pub enum GatewayError {
    /// The downstream could not be reached or the connection broke mid-call.
    Unreachable(Box<pingora_error::Error>),

    /// The downstream answered, but with a non-success status.
    DownstreamStatus(StatusCode),

    /// The downstream body did not parse as JSON.
    InvalidResponse(serde_json::Error),

    /// Local failures that should not happen in practice, such as a request
    /// payload that refuses to serialize.
    Internal(String),
}

impl GatewayError {
    /// The status the original caller sees for this failure. Always distinct
    /// from the success path; never paired with a synthesized prediction body.
    pub fn response_status(&self) -> StatusCode {
        match self {
            GatewayError::Unreachable(_)
            | GatewayError::DownstreamStatus(_)
            | GatewayError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Unreachable(err) => write!(f, "prediction service unreachable: {err}"),
            GatewayError::DownstreamStatus(status) => {
                write!(f, "prediction service responded with status {status}")
            }
            GatewayError::InvalidResponse(err) => {
                write!(f, "prediction service returned an unparsable body: {err}")
            }
            GatewayError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GatewayError::Unreachable(err) => Some(err.as_ref()),
            GatewayError::InvalidResponse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<Box<pingora_error::Error>> for GatewayError {
    fn from(err: Box<pingora_error::Error>) -> Self {
        GatewayError::Unreachable(err)
    }
}
