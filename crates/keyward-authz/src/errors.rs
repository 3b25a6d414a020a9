use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthzError {
    #[error("invalid principal: {0}")]
    InvalidPrincipal(String),
    #[error("invalid action: {0}")]
    InvalidAction(String),
    #[error("invalid role: {0}")]
    InvalidRole(String),
    #[error("invalid relation: {0}")]
    InvalidRelation(String),
}

pub type AuthzResult<T> = Result<T, AuthzError>;
