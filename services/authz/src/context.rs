//! Request context and current-subject resolution.
//!
//! # Purpose
//! Carries the authenticated principal of an inbound request together with a
//! cancellation token scoped to that request, and resolves the principal into
//! the [`User`] that checks and audit records are attributed to.
//!
//! # Key invariants and assumptions
//! - The transport layer authenticates the caller and places the principal on
//!   the context; this module only parses it.
//! - Cancelling a context cancels every child derived from it, never its parent.
//! - A detached context keeps the principal but is not cancelled with the
//!   request, so side effects started from it outlive the request.
use async_trait::async_trait;
use keyward_authz::{Principal, PrincipalKind};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthnError {
    #[error("request carries no identity")]
    MissingIdentity,
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),
}

/// Authenticated user a request acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    subject: Option<String>,
    cancel: CancellationToken,
}

impl RequestContext {
    /// Context with no identity attached.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_subject(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Derive a context that is cancelled with this one but can also be cancelled on its own.
    pub fn child(&self) -> Self {
        Self {
            subject: self.subject.clone(),
            cancel: self.cancel.child_token(),
        }
    }

    /// Copy of this context whose cancellation is independent of the request.
    pub fn detached(&self) -> Self {
        Self {
            subject: self.subject.clone(),
            cancel: CancellationToken::new(),
        }
    }
}

#[async_trait]
pub trait CurrentUserResolver: Send + Sync {
    async fn fetch_current_user(&self, ctx: &RequestContext) -> Result<User, AuthnError>;
}

/// Resolves the user from the principal string carried on the context.
///
/// Accepts `user:<id>` or a bare `<id>`; group principals cannot act as the
/// current user.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextUserResolver;

#[async_trait]
impl CurrentUserResolver for ContextUserResolver {
    async fn fetch_current_user(&self, ctx: &RequestContext) -> Result<User, AuthnError> {
        let raw = ctx
            .subject()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .ok_or(AuthnError::MissingIdentity)?;
        if !raw.contains(':') {
            return Ok(User::new(raw));
        }
        let principal: Principal = raw
            .parse()
            .map_err(|_| AuthnError::InvalidIdentity(raw.to_string()))?;
        match principal.kind {
            PrincipalKind::User => Ok(User::new(principal.id)),
            PrincipalKind::Group => Err(AuthnError::InvalidIdentity(raw.to_string())),
        }
    }
}
