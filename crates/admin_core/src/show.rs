use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use query_builder::{OperationKind, OperationSource};
use serde_json::Value;
use shared::{domain::RecordId, error::AdminError};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, warn};

use crate::{
    context::AdminContext,
    read::{execute_read, lock, merge_fields, FetchStatus, RequestGenerations},
    resolve::{resolve_document, validate_source},
    strategy::ReadResult,
    version::{spawn_refetch_on_bump, Refetch},
};

#[derive(Debug, Clone)]
pub struct ShowProps {
    pub resource: String,
    pub id: RecordId,
    pub operation: OperationSource,
    pub fields: Vec<String>,
}

impl ShowProps {
    pub fn new(
        resource: impl Into<String>,
        id: impl Into<RecordId>,
        operation: impl Into<OperationSource>,
    ) -> Self {
        Self {
            resource: resource.into(),
            id: id.into(),
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

#[derive(Debug, Clone, PartialEq)]
pub struct ShowSnapshot {
    pub status: FetchStatus,
    /// Last record read; kept when a later read fails.
    pub record: Option<Value>,
    pub error: Option<AdminError>,
}

impl ShowSnapshot {
    pub fn loading(&self) -> bool {
        self.status == FetchStatus::Fetching
    }
}

struct ShowShared {
    ctx: AdminContext,
    resource: String,
    id: RecordId,
    operation: OperationSource,
    fields: Mutex<Vec<String>>,
    generations: RequestGenerations,
    snapshot: watch::Sender<ShowSnapshot>,
}

impl ShowShared {
    fn publish(&self, generation: u64, apply: impl FnOnce(&mut ShowSnapshot)) -> bool {
        self.snapshot.send_if_modified(|snapshot| {
            if !self.generations.is_current(generation) {
                return false;
            }
            apply(snapshot);
            true
        })
    }

    async fn fetch(&self) {
        let generation = self.generations.begin();
        let strategies = self.ctx.strategies();
        let variables = strategies.show().get_variables(&self.id);
        let fields = lock(&self.fields).clone();

        let document = match resolve_document(
            &self.operation,
            strategies.show_query_builder(),
            OperationKind::Query,
            "show",
            &self.resource,
            &variables,
            &fields,
        ) {
            Ok(Some(document)) => document,
            Ok(None) => return,
            Err(err) => {
                warn!(resource = self.resource.as_str(), "show: cannot resolve document: {err}");
                self.publish(generation, |snapshot| {
                    snapshot.status = FetchStatus::Failure;
                    snapshot.error = Some(err.into());
                });
                return;
            }
        };

        self.publish(generation, |snapshot| {
            snapshot.status = FetchStatus::Fetching;
            snapshot.error = None;
        });
        debug!(resource = self.resource.as_str(), id = %self.id, generation, "show: fetching");

        let outcome = execute_read(&self.ctx, &document, variables).await;
        match outcome {
            Ok(data) => {
                let record = strategies.show().get_item(&ReadResult {
                    resource: &self.resource,
                    operation: self.operation.operation_name(),
                    data: &data,
                });
                self.publish(generation, |snapshot| {
                    snapshot.status = FetchStatus::Success;
                    snapshot.record = record;
                });
            }
            Err(err) => {
                warn!(resource = self.resource.as_str(), id = %self.id, "show: fetch failed: {err}");
                self.publish(generation, |snapshot| {
                    snapshot.status = FetchStatus::Failure;
                    snapshot.error = Some(err.into());
                });
            }
        }
    }
}

#[async_trait]
impl Refetch for ShowShared {
    async fn refetch_for_version(&self, version: u64) {
        debug!(resource = self.resource.as_str(), version, "show: refetch after write");
        self.fetch().await;
    }
}

/// Reads a single record and keeps it fresh across writes.
pub struct ShowController {
    shared: Arc<ShowShared>,
    version_watcher: JoinHandle<()>,
}

impl ShowController {
    pub async fn mount(ctx: AdminContext, props: ShowProps) -> Result<Self, AdminError> {
        validate_source(
            &props.operation,
            ctx.strategies().show_query_builder(),
            OperationKind::Query,
            "show",
            &props.resource,
        )?;

        let (snapshot, _) = watch::channel(ShowSnapshot {
            status: FetchStatus::Idle,
            record: None,
            error: None,
        });
        let shared = Arc::new(ShowShared {
            resource: props.resource,
            id: props.id,
            operation: props.operation,
            fields: Mutex::new(props.fields),
            generations: RequestGenerations::new(),
            snapshot,
            ctx,
        });
        let version_watcher = spawn_refetch_on_bump(shared.ctx.version(), shared.clone());

        shared.fetch().await;
        Ok(Self {
            shared,
            version_watcher,
        })
    }

    pub async fn refetch(&self) {
        self.shared.fetch().await;
    }

    pub async fn set_selection_set<I, S>(&self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let changed = merge_fields(
            &mut lock(&self.shared.fields),
            fields.into_iter().map(Into::into),
        );
        if changed {
            self.shared.fetch().await;
        }
    }

    pub fn snapshot(&self) -> ShowSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ShowSnapshot> {
        self.shared.snapshot.subscribe()
    }

    pub fn id(&self) -> &RecordId {
        &self.shared.id
    }
}

impl Drop for ShowController {
    fn drop(&mut self) {
        self.shared.generations.unmount();
        self.version_watcher.abort();
    }
}

#[cfg(test)]
#[path = "tests/show_tests.rs"]
mod tests;
