use thiserror::Error;

use crate::protocol::GraphQlError;

/// No document can be resolved for a requested operation.
///
/// Raised while mounting a controller or building the strategy registry, never
/// after a request has been sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("no {kind} strategy registered")]
    MissingStrategy { kind: &'static str },
    #[error(
        "operation '{operation}' on resource '{resource}' is named, but the {kind} strategy cannot build a document for it"
    )]
    MissingQueryBuilder {
        resource: String,
        operation: String,
        kind: &'static str,
    },
    #[error("cannot build operation '{operation}' without a selection set")]
    EmptySelection { operation: String },
    #[error("variable '{name}' of operation '{operation}' has no declared GraphQL type")]
    UntypedVariable { operation: String, name: String },
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("page size must be greater than zero")]
    NonPositiveLimit,
}

/// A read request that failed in transport or was answered with GraphQL errors.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("request failed: {message}")]
pub struct RequestError {
    pub message: String,
    pub graphql_errors: Vec<GraphQlError>,
}

impl RequestError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            graphql_errors: Vec::new(),
        }
    }

    pub fn from_graphql(errors: Vec<GraphQlError>) -> Self {
        let message = errors
            .iter()
            .map(|err| err.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            message,
            graphql_errors: errors,
        }
    }
}

/// A write that failed or came back with partial errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{action} {resource} failed: {message}")]
pub struct MutationError {
    pub resource: String,
    pub action: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdminError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Mutation(#[from] MutationError),
}

impl AdminError {
    /// Only configuration faults are meant to stop the application.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
