//! Issuance pipeline: context resolution, token redemption, signing.
//!
//! ```text
//! trusted:  headers ─► resolve ─► issue ─────────────────────► TokenIssued
//! public:   headers ─► resolve ─► ResolvedRequest
//!                                   │ redeem(token)
//!                                   ▼
//!                                 RedeemedRequest ──► TokenRedeemed
//!                                   │ sign(csr)            │ reissue()
//!                                   ▼                      ▼
//!                            CertificateSigned       TokenIssued
//! ```
//!
//! Each stage consumes the previous one. Only a [`ResolvedRequest`] can be
//! redeemed and only a [`RedeemedRequest`] can be signed, so a token is never
//! redeemed for a request whose context failed to resolve. The identity
//! travels with the [`RedeemedRequest`]; the second request's headers are only
//! used to resolve scope.

use connector_ca::{CertificateChain, CertificateService};
use connector_core::{Audience, ConnectorError, Identity, Result, TenantScope};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::context::{ContextResolver, RequestHeaders};
use crate::tokens::{IssuedToken, TokenManager};

/// Where a flow ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// Token minted on the trusted surface
    TokenIssued,
    /// Token consumed, identity carried forward
    TokenRedeemed,
    /// Certificate signed for the carried identity
    CertificateSigned,
    /// Terminal failure; the caller must start again from issuance
    Failed(Failure),
}

/// Terminal failure states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Token unknown, already used, expired, or for another audience
    TokenExpired,
    /// Required context header missing
    ContextMissing,
    /// CSR malformed or for another identity
    CsrInvalid,
    /// CA material unavailable or signing failed
    SigningFailure,
    /// Issued certificate could not be persisted
    RepositoryFailure,
    /// Audience not served in this deployment mode
    AudienceDisabled,
    /// Token could not be minted
    IssuanceFailure,
}

impl From<&ConnectorError> for Failure {
    fn from(err: &ConnectorError) -> Self {
        match err {
            ConnectorError::TokenNotFound | ConnectorError::TokenExpired => Self::TokenExpired,
            ConnectorError::ContextMissing { .. } => Self::ContextMissing,
            ConnectorError::AudienceDisabled { .. } => Self::AudienceDisabled,
            ConnectorError::CsrInvalid(_) => Self::CsrInvalid,
            ConnectorError::SigningFailure(_) => Self::SigningFailure,
            ConnectorError::RepositoryFailure(_) => Self::RepositoryFailure,
            ConnectorError::TokenGeneration(_)
            | ConnectorError::TokenCollision
            | ConnectorError::Config(_)
            | ConnectorError::Io(_) => Self::IssuanceFailure,
        }
    }
}

impl FlowState {
    /// Returns true if no further transition is possible
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::CertificateSigned | Self::Failed(_))
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenIssued => f.write_str("TokenIssued"),
            Self::TokenRedeemed => f.write_str("TokenRedeemed"),
            Self::CertificateSigned => f.write_str("CertificateSigned"),
            Self::Failed(failure) => write!(f, "{failure:?}"),
        }
    }
}

/// Shared components behind both request surfaces.
pub struct IssuancePipeline {
    resolver: ContextResolver,
    tokens: Arc<TokenManager>,
    certificates: Arc<CertificateService>,
}

impl IssuancePipeline {
    /// Compose the pipeline from shared instances.
    pub fn new(
        resolver: ContextResolver,
        tokens: Arc<TokenManager>,
        certificates: Arc<CertificateService>,
    ) -> Self {
        Self {
            resolver,
            tokens,
            certificates,
        }
    }

    /// Token manager shared with the trusted surface.
    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Certificate service shared with the public surface.
    pub fn certificates(&self) -> &Arc<CertificateService> {
        &self.certificates
    }

    /// Context resolver in force.
    pub const fn resolver(&self) -> &ContextResolver {
        &self.resolver
    }

    /// Trusted surface: bind an identity from `headers` and mint a token.
    pub fn issue_token(&self, audience: Audience, headers: &RequestHeaders) -> Result<IssuedToken> {
        let identity = self.resolver.resolve(headers, audience)?;
        let issued = self.tokens.issue_for_audience(identity)?;
        debug!(state = %FlowState::TokenIssued, identity = %issued.identity, "flow advanced");
        Ok(issued)
    }

    /// Public surface, first stage: resolve the caller's scope.
    pub fn resolve(&self, audience: Audience, headers: &RequestHeaders) -> Result<ResolvedRequest<'_>> {
        self.resolver.check_audience(audience)?;
        let scope = self.resolver.resolve_scope(headers)?;
        Ok(ResolvedRequest {
            pipeline: self,
            audience,
            scope,
        })
    }

    /// Public surface: redeem `token` and sign `csr` for its identity.
    pub async fn sign_certificate(
        &self,
        audience: Audience,
        headers: &RequestHeaders,
        token: &str,
        csr: &[u8],
    ) -> Result<CertificateChain> {
        self.resolve(audience, headers)?
            .redeem(token)?
            .sign(csr)
            .await
    }

    /// Public surface: redeem `token` and swap it for a fresh one bound to
    /// the same identity, for the CSR submission step.
    pub fn exchange_token(
        &self,
        audience: Audience,
        headers: &RequestHeaders,
        token: &str,
    ) -> Result<IssuedToken> {
        self.resolve(audience, headers)?.redeem(token)?.reissue()
    }
}

/// A public request whose scope resolved.
pub struct ResolvedRequest<'p> {
    pipeline: &'p IssuancePipeline,
    audience: Audience,
    scope: TenantScope,
}

impl<'p> ResolvedRequest<'p> {
    /// Scope resolved from the request headers.
    pub const fn scope(&self) -> &TenantScope {
        &self.scope
    }

    /// Consume `token`.
    ///
    /// A token bound to another audience is consumed and rejected like an
    /// unknown one.
    pub fn redeem(self, token: &str) -> Result<RedeemedRequest<'p>> {
        let identity = self.pipeline.tokens.redeem(token)?;
        if identity.audience() != self.audience {
            debug!(
                expected = %self.audience,
                bound = %identity.audience(),
                "token presented on the wrong audience"
            );
            return Err(ConnectorError::TokenNotFound);
        }
        debug!(state = %FlowState::TokenRedeemed, identity = %identity, "flow advanced");
        Ok(RedeemedRequest {
            pipeline: self.pipeline,
            identity,
        })
    }
}

/// A public request holding the identity of its redeemed token.
pub struct RedeemedRequest<'p> {
    pipeline: &'p IssuancePipeline,
    identity: Identity,
}

impl RedeemedRequest<'_> {
    /// Identity bound to the redeemed token.
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Sign `csr` for the carried identity.
    ///
    /// Runs outside the token cache lock. Dropping the future mid-way leaves
    /// the token consumed and nothing persisted.
    pub async fn sign(self, csr: &[u8]) -> Result<CertificateChain> {
        let chain = self
            .pipeline
            .certificates
            .validate_and_sign(csr, &self.identity)
            .await?;
        info!(state = %FlowState::CertificateSigned, identity = %self.identity, "flow advanced");
        Ok(chain)
    }

    /// Mint a fresh token for the carried identity.
    pub fn reissue(self) -> Result<IssuedToken> {
        let issued = self.pipeline.tokens.issue_for_audience(self.identity)?;
        debug!(state = %FlowState::TokenIssued, identity = %issued.identity, "flow advanced");
        Ok(issued)
    }
}
