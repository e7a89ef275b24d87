use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Mutex, MutexGuard, PoisonError,
};

use query_builder::Document;
use serde_json::Value;
use shared::{
    error::RequestError,
    protocol::{GraphQlRequest, GraphQlResponse, Variables},
};

use crate::context::AdminContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Fetching,
    Success,
    Failure,
}

/// Request-generation tags for one controller.
///
/// Each fetch takes a new generation; only the newest one may publish its
/// outcome, and nothing may publish after unmount.
pub(crate) struct RequestGenerations {
    latest: AtomicU64,
    mounted: AtomicBool,
}

impl RequestGenerations {
    pub(crate) fn new() -> Self {
        Self {
            latest: AtomicU64::new(0),
            mounted: AtomicBool::new(true),
        }
    }

    pub(crate) fn begin(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.mounted.load(Ordering::SeqCst) && self.latest.load(Ordering::SeqCst) == generation
    }

    pub(crate) fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
        self.latest.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) async fn execute_read(
    ctx: &AdminContext,
    document: &Document,
    variables: Variables,
) -> Result<Value, RequestError> {
    let request = GraphQlRequest {
        query: document.source().to_string(),
        operation_name: document.name().map(str::to_string),
        variables,
    };
    match ctx.transport().execute(request).await {
        Ok(response) if response.has_errors() => Err(RequestError::from_graphql(response.errors)),
        Ok(GraphQlResponse {
            data: Some(data), ..
        }) if !data.is_null() => Ok(data),
        Ok(_) => Err(RequestError::transport("response carried no data")),
        Err(err) => Err(RequestError::transport(format!("{err:#}"))),
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Adds `fields` not yet present, keeping first-seen order. Returns whether
/// anything was added.
pub(crate) fn merge_fields(known: &mut Vec<String>, fields: impl IntoIterator<Item = String>) -> bool {
    let before = known.len();
    for field in fields {
        if !field.trim().is_empty() && !known.contains(&field) {
            known.push(field);
        }
    }
    known.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_newest_generation_is_current() {
        let generations = RequestGenerations::new();
        let first = generations.begin();
        let second = generations.begin();
        assert!(!generations.is_current(first));
        assert!(generations.is_current(second));
    }

    #[test]
    fn unmount_invalidates_in_flight_generation() {
        let generations = RequestGenerations::new();
        let generation = generations.begin();
        generations.unmount();
        assert!(!generations.is_current(generation));
        assert!(!generations.is_current(generations.begin()));
    }

    #[test]
    fn merged_fields_keep_first_seen_order() {
        let mut known = vec!["id".to_string()];
        assert!(merge_fields(
            &mut known,
            ["name", "id", "address.city"].map(String::from)
        ));
        assert_eq!(known, ["id", "name", "address.city"]);
        assert!(!merge_fields(&mut known, ["name".to_string()]));
    }
}
