use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use query_builder::Document;
use serde_json::{json, Value};
use shared::protocol::{GraphQlError, GraphQlRequest, GraphQlResponse, Variables};
use tokio::sync::{watch, Notify};
use url_state::MemoryLocation;

use crate::{
    context::AdminContext,
    notify::{Notification, Notifier},
    read::lock,
    strategy::StrategyRegistry,
    transport::GraphQlTransport,
};

pub(crate) enum Reply {
    Data(Value),
    Errors(Vec<&'static str>),
    Fail(&'static str),
}

type Responder = Box<dyn Fn(&GraphQlRequest) -> Reply + Send + Sync>;

/// Answers from a closure and records every request. Gates hold back the
/// next request whose variables contain a given text.
pub(crate) struct ScriptedTransport {
    respond: Mutex<Responder>,
    gates: Mutex<Vec<(String, Arc<Notify>)>>,
    requests: Mutex<Vec<GraphQlRequest>>,
    calls: watch::Sender<usize>,
}

impl ScriptedTransport {
    pub(crate) fn replying(
        respond: impl Fn(&GraphQlRequest) -> Reply + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Mutex::new(Box::new(respond)),
            gates: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            calls: watch::channel(0).0,
        })
    }

    pub(crate) fn set_responder(
        &self,
        respond: impl Fn(&GraphQlRequest) -> Reply + Send + Sync + 'static,
    ) {
        *lock(&self.respond) = Box::new(respond);
    }

    /// Holds the next request whose serialized variables contain `needle`
    /// until the returned gate is notified.
    pub(crate) fn gate_matching(&self, needle: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        lock(&self.gates).push((needle.to_string(), gate.clone()));
        gate
    }

    pub(crate) fn gate_next(&self) -> Arc<Notify> {
        self.gate_matching("")
    }

    pub(crate) fn calls(&self) -> usize {
        *self.calls.borrow()
    }

    pub(crate) fn requests(&self) -> Vec<GraphQlRequest> {
        lock(&self.requests).clone()
    }

    pub(crate) fn last_request(&self) -> GraphQlRequest {
        lock(&self.requests).last().cloned().expect("no request sent")
    }

    pub(crate) async fn wait_for_calls(&self, count: usize) {
        let mut calls = self.calls.subscribe();
        tokio::time::timeout(Duration::from_secs(5), calls.wait_for(|calls| *calls >= count))
            .await
            .expect("timed out waiting for requests")
            .expect("transport dropped");
    }

    fn take_gate(&self, variables: &str) -> Option<Arc<Notify>> {
        let mut gates = lock(&self.gates);
        let index = gates
            .iter()
            .position(|(needle, _)| variables.contains(needle.as_str()))?;
        Some(gates.remove(index).1)
    }
}

#[async_trait]
impl GraphQlTransport for ScriptedTransport {
    async fn execute(&self, request: GraphQlRequest) -> Result<GraphQlResponse> {
        let reply = (*lock(&self.respond))(&request);
        let gate = self.take_gate(&Value::Object(request.variables.clone()).to_string());
        lock(&self.requests).push(request);
        self.calls.send_modify(|calls| *calls += 1);

        if let Some(gate) = gate {
            gate.notified().await;
        }
        match reply {
            Reply::Data(data) => Ok(GraphQlResponse::from_data(data)),
            Reply::Errors(messages) => Ok(GraphQlResponse::from_errors(
                messages.into_iter().map(GraphQlError::new).collect(),
            )),
            Reply::Fail(message) => Err(anyhow!(message)),
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub(crate) fn notifications(&self) -> Vec<Notification> {
        lock(&self.seen).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        lock(&self.seen).push(notification);
    }
}

pub(crate) fn context(transport: &Arc<ScriptedTransport>) -> AdminContext {
    AdminContext::new(StrategyRegistry::with_defaults(), transport.clone())
}

/// Default strategies without a fallback query builder.
pub(crate) fn context_without_builder(transport: &Arc<ScriptedTransport>) -> AdminContext {
    let strategies = StrategyRegistry::builder()
        .all(crate::strategy::DefaultStrategy)
        .build()
        .expect("registry");
    AdminContext::new(strategies, transport.clone())
}

pub(crate) fn location(href: &str) -> Arc<MemoryLocation> {
    Arc::new(MemoryLocation::parse(href).expect("location"))
}

pub(crate) fn vars(value: Value) -> Variables {
    value.as_object().cloned().expect("object")
}

pub(crate) fn rows(ids: &[&str]) -> Vec<Value> {
    ids.iter().map(|id| json!({ "id": id })).collect()
}

pub(crate) fn companies_page(total: u64, ids: &[&str]) -> Value {
    json!({ "companies": { "total": total, "data": rows(ids) } })
}

pub(crate) fn companies_document() -> Document {
    Document::parse(
        "query GetCompanies($pagination: PaginationInput, $sort: CompanySortInput, $filters: CompanyFilterInput) \
         { companies(pagination: $pagination, sort: $sort, filters: $filters) { total data { id name } } }",
    )
    .expect("document")
}

/// Lets spawned watchers run.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}
