use thiserror::Error;

/// Result type alias for connector operations
pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Errors that can occur while issuing tokens or certificates
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// Token was never issued, was already redeemed, or belongs to another audience
    #[error("token not found")]
    TokenNotFound,

    /// Token existed but its lifetime elapsed before redemption
    #[error("token expired")]
    TokenExpired,

    /// A tenant-scoping or identity header required by the deployment mode is absent
    #[error("missing required context header: {header}")]
    ContextMissing {
        /// Name of the header that was missing or blank
        header: String,
    },

    /// The audience has no surface in this deployment mode
    #[error("audience {audience} is not served in {mode} mode")]
    AudienceDisabled {
        /// Audience the caller asked for
        audience: String,
        /// Deployment mode in force
        mode: String,
    },

    /// CSR could not be decoded or does not match the bound identity
    #[error("invalid certificate signing request: {0}")]
    CsrInvalid(String),

    /// CA material could not be read or the signature could not be produced
    #[error("certificate signing failed: {0}")]
    SigningFailure(String),

    /// Secret store I/O failed
    #[error("secret repository failure: {0}")]
    RepositoryFailure(String),

    /// The random source failed while generating a token
    #[error("token generation failed: {0}")]
    TokenGeneration(String),

    /// A freshly generated token collided with an active one
    #[error("token collision detected")]
    TokenCollision,

    /// Configuration is invalid or missing required fields
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectorError {
    /// Shorthand for [`ConnectorError::ContextMissing`]
    pub fn context_missing(header: impl Into<String>) -> Self {
        Self::ContextMissing {
            header: header.into(),
        }
    }

    /// Shorthand for [`ConnectorError::AudienceDisabled`]
    pub fn audience_disabled(audience: impl ToString, mode: impl ToString) -> Self {
        Self::AudienceDisabled {
            audience: audience.to_string(),
            mode: mode.to_string(),
        }
    }

    /// Returns true for infrastructure failures that operators must look at.
    ///
    /// Everything else is an expected caller-side condition.
    #[must_use]
    pub const fn is_operational(&self) -> bool {
        matches!(
            self,
            Self::SigningFailure(_)
                | Self::RepositoryFailure(_)
                | Self::TokenGeneration(_)
                | Self::TokenCollision
                | Self::Config(_)
                | Self::Io(_)
        )
    }

    /// Returns true if the failure came from the presented token
    #[must_use]
    pub const fn is_token_error(&self) -> bool {
        matches!(self, Self::TokenNotFound | Self::TokenExpired)
    }

    /// HTTP-style status code reported to the caller
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::TokenNotFound | Self::TokenExpired => 403,
            Self::ContextMissing { .. } | Self::CsrInvalid(_) => 400,
            Self::AudienceDisabled { .. } => 404,
            _ => 500,
        }
    }

    /// Generic message safe to return across the trust boundary.
    ///
    /// Never includes the wrapped detail (CA paths, parser output, store errors).
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::TokenNotFound | Self::TokenExpired => "Invalid or expired token.",
            Self::ContextMissing { .. } => "Required request context is missing.",
            Self::AudienceDisabled { .. } => "Not found.",
            Self::CsrInvalid(_) => "Invalid certificate signing request.",
            Self::SigningFailure(_) => "Failed to sign the certificate.",
            _ => "Internal error.",
        }
    }
}
