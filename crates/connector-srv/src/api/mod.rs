//! Request surfaces.
//!
//! Both surfaces return [`ApiResult`]: failures leave as an [`ErrorResponse`]
//! carrying only a status code and a generic message. The detailed error is
//! logged here, once, at the boundary.

mod public;
mod trusted;

pub use public::{
    ApiUrls, CertificateResponse, CsrPayload, InfoResponse, PublicApi, RequestedCertificate,
};
pub use trusted::{TokenResponse, TrustedApi};

use connector_core::ConnectorError;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// Outcome of a surface call.
pub type ApiResult<T> = std::result::Result<T, ErrorResponse>;

/// Body returned for any failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP-style status code
    pub code: u16,
    /// Generic message; never names the failing token or internals
    pub error: String,
}

impl ErrorResponse {
    /// Map `err` to its public shape and log the detail for operators.
    pub fn from_error(err: &ConnectorError) -> Self {
        if err.is_operational() {
            error!(error = %err, code = err.status_code(), "request failed");
        } else if err.is_token_error() {
            debug!(error = %err, code = err.status_code(), "token rejected");
        } else {
            warn!(error = %err, code = err.status_code(), "request rejected");
        }
        Self {
            code: err.status_code(),
            error: err.public_message().to_string(),
        }
    }
}

impl From<ConnectorError> for ErrorResponse {
    fn from(err: ConnectorError) -> Self {
        Self::from_error(&err)
    }
}
