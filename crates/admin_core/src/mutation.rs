use std::sync::atomic::{AtomicUsize, Ordering};

use query_builder::{OperationKind, OperationSource, QueryBuilder};
use serde_json::Value;
use shared::{
    domain::RecordId,
    error::{AdminError, MutationError},
    protocol::{GraphQlRequest, Variables},
};
use tracing::{debug, warn};

use crate::{
    context::AdminContext,
    notify::Notification,
    read::merge_fields,
    resolve::{resolve_document, validate_source},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Edit,
    Delete,
}

impl MutationKind {
    fn strategy_kind(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Edit => "update",
            Self::Delete => "delete",
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            Self::Create => "created",
            Self::Edit => "updated",
            Self::Delete => "deleted",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MutationProps {
    pub kind: MutationKind,
    pub resource: String,
    pub operation: OperationSource,
    /// Selection for the mutation's payload; may stay empty for scalar results.
    pub fields: Vec<String>,
}

impl MutationProps {
    pub fn new(
        kind: MutationKind,
        resource: impl Into<String>,
        operation: impl Into<OperationSource>,
    ) -> Self {
        Self {
            kind,
            resource: resource.into(),
            operation: operation.into(),
            fields: Vec::new(),
        }
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        merge_fields(&mut self.fields, fields.into_iter().map(Into::into));
        self
    }
}

/// Runs create, edit or delete writes for one resource.
///
/// Nothing is applied to read state before the backend confirms; a confirmed
/// write bumps the version bus once so mounted reads refresh.
pub struct MutationController {
    ctx: AdminContext,
    props: MutationProps,
    in_flight: AtomicUsize,
}

impl MutationController {
    pub fn new(ctx: AdminContext, props: MutationProps) -> Result<Self, AdminError> {
        let builder = Self::builder(&ctx, props.kind);
        validate_source(
            &props.operation,
            builder,
            OperationKind::Mutation,
            props.kind.strategy_kind(),
            &props.resource,
        )?;
        Ok(Self {
            ctx,
            props,
            in_flight: AtomicUsize::new(0),
        })
    }

    fn builder(ctx: &AdminContext, kind: MutationKind) -> Option<&dyn QueryBuilder> {
        let strategies = ctx.strategies();
        match kind {
            MutationKind::Create => strategies.create_mutation_builder(),
            MutationKind::Edit => strategies.edit_mutation_builder(),
            MutationKind::Delete => strategies.delete_mutation_builder(),
        }
    }

    pub fn kind(&self) -> MutationKind {
        self.props.kind
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// `id` is ignored by creates; `values` by deletes. Returns the
    /// confirmed `data` of the response.
    pub async fn submit(&self, id: Option<&RecordId>, values: &Value) -> Result<Value, AdminError> {
        let outcome = {
            let _submitting = InFlight::enter(&self.in_flight);
            self.run(id, values).await
        };

        let kind = self.props.kind;
        let resource = self.props.resource.as_str();
        match outcome {
            Ok(data) => {
                self.ctx.version().bump();
                self.ctx.notifier().notify(Notification::success(format!(
                    "{resource} {}.",
                    kind.past_tense()
                )));
                Ok(data)
            }
            Err(AdminError::Mutation(err)) => {
                warn!(resource, action = kind.verb(), "mutation: {}", err.message);
                self.ctx.notifier().notify(Notification::error(
                    format!("Could not {} {resource}.", kind.verb()),
                    err.message.clone(),
                ));
                Err(err.into())
            }
            Err(err) => Err(err),
        }
    }

    async fn run(&self, id: Option<&RecordId>, values: &Value) -> Result<Value, AdminError> {
        let kind = self.props.kind;
        let variables = self.variables(id, values).ok_or_else(|| {
            self.failure(match kind {
                MutationKind::Create => "no variables for the submitted values".to_string(),
                MutationKind::Edit | MutationKind::Delete => "no record to write".to_string(),
            })
        })?;

        let document = resolve_document(
            &self.props.operation,
            Self::builder(&self.ctx, kind),
            OperationKind::Mutation,
            kind.strategy_kind(),
            &self.props.resource,
            &variables,
            &self.props.fields,
        )?
        .ok_or_else(|| self.failure("no document for this operation".to_string()))?;

        debug!(
            resource = self.props.resource.as_str(),
            action = kind.verb(),
            document = document.name().unwrap_or("<anonymous>"),
            "mutation: sending"
        );
        let request = GraphQlRequest {
            query: document.source().to_string(),
            operation_name: document.name().map(str::to_string),
            variables,
        };
        let response = self
            .ctx
            .transport()
            .execute(request)
            .await
            .map_err(|err| self.failure(format!("{err:#}")))?;

        if response.has_errors() {
            let message = response
                .errors
                .iter()
                .map(|err| err.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(self.failure(message));
        }
        match response.data {
            Some(data) if !data.is_null() => Ok(data),
            _ => Err(self.failure("response carried no data".to_string())),
        }
    }

    fn variables(&self, id: Option<&RecordId>, values: &Value) -> Option<Variables> {
        let strategies = self.ctx.strategies();
        let record = id.filter(|id| !id.as_str().is_empty());
        match self.props.kind {
            MutationKind::Create => strategies.create().get_mutation_variables(values),
            MutationKind::Edit => strategies.edit().get_mutation_variables(record?, values),
            MutationKind::Delete => strategies.delete().get_variables(record?),
        }
    }

    fn failure(&self, message: String) -> AdminError {
        MutationError {
            resource: self.props.resource.clone(),
            action: self.props.kind.verb(),
            message,
        }
        .into()
    }
}

/// Counts a submit as in flight until dropped, so a cancelled submit still
/// clears `is_submitting`.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "tests/mutation_tests.rs"]
mod tests;
