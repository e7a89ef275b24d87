use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use query_builder::{OperationKind, OperationSource};
use serde_json::Value;
use shared::{
    domain::{page_count, ListState, Pagination, SortMap},
    error::AdminError,
    protocol::Variables,
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, warn};
use url_state::{
    decode, normalize_filter_values, with_filters, with_pagination, with_sort, ListDefaults,
    ParamStore,
};

use crate::{
    context::AdminContext,
    read::{execute_read, lock, merge_fields, FetchStatus, RequestGenerations},
    resolve::{resolve_document, validate_source},
    strategy::{ListInput, ReadResult},
    version::{spawn_refetch_on_bump, Refetch},
};

/// What a list view mounts with.
#[derive(Debug, Clone)]
pub struct ListProps {
    pub resource: String,
    pub operation: OperationSource,
    pub fields: Vec<String>,
    pub defaults: ListDefaults,
}

impl ListProps {
    pub fn new(resource: impl Into<String>, operation: impl Into<OperationSource>) -> Self {
        Self {
            resource: resource.into(),
            operation: operation.into(),
            fields: Vec::new(),
            defaults: ListDefaults::default(),
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

    pub fn defaults(mut self, defaults: ListDefaults) -> Self {
        self.defaults = defaults;
        self
    }
}

/// Everything a list view renders from.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSnapshot {
    pub status: FetchStatus,
    pub state: ListState,
    pub data: Vec<Value>,
    /// `0` while loading and after a failed fetch.
    pub total: u64,
    pub page_count: u64,
    pub error: Option<AdminError>,
}

impl ListSnapshot {
    fn idle(state: ListState) -> Self {
        Self {
            status: FetchStatus::Idle,
            state,
            data: Vec::new(),
            total: 0,
            page_count: 0,
            error: None,
        }
    }

    pub fn loading(&self) -> bool {
        self.status == FetchStatus::Fetching
    }
}

struct ListShared {
    ctx: AdminContext,
    store: Arc<dyn ParamStore>,
    resource: String,
    operation: OperationSource,
    defaults: ListDefaults,
    fields: Mutex<Vec<String>>,
    generations: RequestGenerations,
    snapshot: watch::Sender<ListSnapshot>,
}

impl ListShared {
    fn current_state(&self) -> ListState {
        decode(&self.store.read(), &self.defaults)
    }

    /// Applies `apply` only while `generation` is the newest request of a
    /// mounted controller.
    fn publish(&self, generation: u64, apply: impl FnOnce(&mut ListSnapshot)) -> bool {
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
        let state = self.current_state();
        let strategies = self.ctx.strategies();
        let variables = strategies.list().get_variables(&ListInput::from(&state));
        let fields = lock(&self.fields).clone();

        let document = match resolve_document(
            &self.operation,
            strategies.list_query_builder(),
            OperationKind::Query,
            "list",
            &self.resource,
            &variables,
            &fields,
        ) {
            Ok(Some(document)) => document,
            Ok(None) => {
                debug!(resource = self.resource.as_str(), "list: waiting for a selection set");
                self.publish(generation, |snapshot| snapshot.state = state);
                return;
            }
            Err(err) => {
                warn!(resource = self.resource.as_str(), "list: cannot resolve document: {err}");
                self.publish(generation, |snapshot| {
                    snapshot.status = FetchStatus::Failure;
                    snapshot.state = state;
                    snapshot.total = 0;
                    snapshot.page_count = 0;
                    snapshot.error = Some(err.into());
                });
                return;
            }
        };

        let limit = state.limit;
        self.publish(generation, |snapshot| {
            snapshot.status = FetchStatus::Fetching;
            snapshot.state = state;
            snapshot.total = 0;
            snapshot.page_count = 0;
            snapshot.error = None;
        });
        debug!(
            resource = self.resource.as_str(),
            generation,
            document = document.name().unwrap_or("<anonymous>"),
            "list: fetching"
        );

        let outcome = execute_read(&self.ctx, &document, variables).await;
        if !self.generations.is_current(generation) {
            debug!(resource = self.resource.as_str(), generation, "list: dropping superseded response");
            return;
        }

        match outcome {
            Ok(data) => {
                let result = ReadResult {
                    resource: &self.resource,
                    operation: self.operation.operation_name(),
                    data: &data,
                };
                let rows = strategies.list().get_list(&result);
                let total = strategies.list().get_total(&result);
                debug!(resource = self.resource.as_str(), rows = rows.len(), total, "list: fetched");
                self.publish(generation, |snapshot| {
                    snapshot.status = FetchStatus::Success;
                    snapshot.data = rows;
                    snapshot.total = total;
                    snapshot.page_count = page_count(total, limit);
                });
            }
            Err(err) => {
                warn!(resource = self.resource.as_str(), "list: fetch failed: {err}");
                self.publish(generation, |snapshot| {
                    snapshot.status = FetchStatus::Failure;
                    snapshot.error = Some(err.into());
                });
            }
        }
    }
}

#[async_trait]
impl Refetch for ListShared {
    async fn refetch_for_version(&self, version: u64) {
        debug!(resource = self.resource.as_str(), version, "list: refetch after write");
        self.fetch().await;
    }
}

/// Coordinates one resource list: location parameters in, page data out.
///
/// The location is the only home of pagination, sort and filter state; every
/// mutator writes it and then re-reads from it. Only the most recently
/// started fetch may publish. Dropping the controller unmounts it.
pub struct ListController {
    shared: Arc<ListShared>,
    version_watcher: JoinHandle<()>,
}

impl ListController {
    /// Validates the operation, subscribes to the version bus and runs the
    /// first fetch.
    pub async fn mount(
        ctx: AdminContext,
        store: Arc<dyn ParamStore>,
        props: ListProps,
    ) -> Result<Self, AdminError> {
        validate_source(
            &props.operation,
            ctx.strategies().list_query_builder(),
            OperationKind::Query,
            "list",
            &props.resource,
        )?;

        let state = decode(&store.read(), &props.defaults);
        let (snapshot, _) = watch::channel(ListSnapshot::idle(state));
        let shared = Arc::new(ListShared {
            resource: props.resource,
            operation: props.operation,
            defaults: props.defaults,
            fields: Mutex::new(props.fields),
            generations: RequestGenerations::new(),
            snapshot,
            store,
            ctx,
        });
        let version_watcher = spawn_refetch_on_bump(shared.ctx.version(), shared.clone());
        debug!(resource = shared.resource.as_str(), "list: mounted");

        shared.fetch().await;
        Ok(Self {
            shared,
            version_watcher,
        })
    }

    pub async fn on_pagination_change(&self, pagination: Pagination) -> Result<(), AdminError> {
        pagination.validate()?;
        self.shared
            .store
            .update(&|prev| with_pagination(prev, pagination));
        self.shared.fetch().await;
        Ok(())
    }

    /// Replaces the whole sort mapping.
    pub async fn on_sort_change(&self, sort: SortMap) {
        self.shared.store.update(&|prev| with_sort(prev, &sort));
        self.shared.fetch().await;
    }

    /// Replaces the whole filter mapping and returns to the first page.
    pub async fn on_filters_change(&self, filters: &Variables) {
        let filters = normalize_filter_values(filters);
        self.shared.store.update(&|prev| with_filters(prev, &filters));
        self.shared.fetch().await;
    }

    pub async fn refetch(&self) {
        self.shared.fetch().await;
    }

    /// Registers fields the view renders. A named operation sends nothing
    /// until at least one field is known.
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

    pub fn snapshot(&self) -> ListSnapshot {
        self.shared.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListSnapshot> {
        self.shared.snapshot.subscribe()
    }

    /// The state the location encodes right now.
    pub fn current_state(&self) -> ListState {
        self.shared.current_state()
    }

    pub fn resource(&self) -> &str {
        &self.shared.resource
    }
}

impl Drop for ListController {
    fn drop(&mut self) {
        self.shared.generations.unmount();
        self.version_watcher.abort();
        debug!(resource = self.shared.resource.as_str(), "list: unmounted");
    }
}

#[cfg(test)]
#[path = "tests/list_tests.rs"]
mod tests;
