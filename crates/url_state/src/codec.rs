use std::collections::{btree_map, BTreeMap};

use serde_json::Value;
use shared::{
    domain::{FilterMap, ListState, Pagination, SortDirection, SortMap, DEFAULT_LIMIT},
    protocol::Variables,
};
use tracing::debug;
use url::form_urlencoded;

pub const QP_LIMIT: &str = "limit";
pub const QP_OFFSET: &str = "offset";
pub const QP_SORT_PREFIX: &str = "s_";
pub const QP_FILTERS_PREFIX: &str = "f_";

/// Flat string mapping mirrored by the location's query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParams(BTreeMap<String, String>);

impl UrlParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a query string, with or without the leading `?`. A repeated key
    /// keeps its last value.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        form_urlencoded::parse(query.as_bytes())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect()
    }

    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter())
            .finish()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn remove_prefixed(&mut self, prefix: &str) {
        self.0.retain(|key, _| !key.starts_with(prefix));
    }

    fn write_sort(&mut self, sort: &SortMap) {
        for (field, direction) in sort {
            self.insert(format!("{QP_SORT_PREFIX}{field}"), direction.as_str());
        }
    }

    fn write_filters(&mut self, filters: &FilterMap) {
        for (field, value) in filters.iter().filter(|(_, value)| !value.is_empty()) {
            self.insert(format!("{QP_FILTERS_PREFIX}{field}"), value.clone());
        }
    }

    fn prefixed<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.0.iter().filter_map(move |(key, value)| {
            key.strip_prefix(prefix)
                .filter(|field| !field.is_empty())
                .map(|field| (field, value.as_str()))
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UrlParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Per-list fallbacks applied while decoding. They shape the decoded state and
/// are never written back to the location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDefaults {
    pub per_page: u32,
    pub sort: SortMap,
    pub filters: FilterMap,
}

impl ListDefaults {
    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.insert(field.into(), direction);
        self
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    fn limit(&self) -> u32 {
        if self.per_page == 0 {
            DEFAULT_LIMIT
        } else {
            self.per_page
        }
    }
}

impl Default for ListDefaults {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_LIMIT,
            sort: SortMap::new(),
            filters: FilterMap::new(),
        }
    }
}

/// Derives the list state from a parameter snapshot. Never fails: unparsable
/// numbers fall back to the defaults and unknown sort directions are dropped.
pub fn decode(params: &UrlParams, defaults: &ListDefaults) -> ListState {
    let limit = params
        .get(QP_LIMIT)
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .filter(|limit| *limit > 0)
        .unwrap_or_else(|| defaults.limit());
    let offset = params
        .get(QP_OFFSET)
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .unwrap_or(0);

    let mut sort = SortMap::new();
    for (field, raw) in params.prefixed(QP_SORT_PREFIX) {
        match raw.parse::<SortDirection>() {
            Ok(direction) => {
                sort.insert(field.to_string(), direction);
            }
            Err(err) => debug!(field, "url: dropping sort key: {err}"),
        }
    }
    if sort.is_empty() {
        sort = defaults.sort.clone();
    }

    let mut filters = defaults.filters.clone();
    filters.extend(
        params
            .prefixed(QP_FILTERS_PREFIX)
            .filter(|(_, value)| !value.is_empty())
            .map(|(field, value)| (field.to_string(), value.to_string())),
    );

    ListState {
        limit,
        offset,
        sort,
        filters,
    }
}

pub fn encode(state: &ListState) -> UrlParams {
    let mut params = with_pagination(&UrlParams::new(), state.pagination());
    params.write_sort(&state.sort);
    params.write_filters(&state.filters);
    params
}

/// Replaces `limit` and `offset`, keeping every other key.
pub fn with_pagination(prev: &UrlParams, pagination: Pagination) -> UrlParams {
    let mut next = prev.clone();
    next.insert(QP_LIMIT, pagination.limit.to_string());
    next.insert(QP_OFFSET, pagination.offset.to_string());
    next
}

/// Replaces the whole sort mapping: every `s_*` key is dropped before the new
/// ones are written.
pub fn with_sort(prev: &UrlParams, sort: &SortMap) -> UrlParams {
    let mut next = prev.clone();
    next.remove_prefixed(QP_SORT_PREFIX);
    next.write_sort(sort);
    next
}

/// Replaces the whole filter mapping and returns to the first page. Empty
/// values are left out.
pub fn with_filters(prev: &UrlParams, filters: &FilterMap) -> UrlParams {
    let mut next = prev.clone();
    next.remove_prefixed(QP_FILTERS_PREFIX);
    next.write_filters(filters);
    next.insert(QP_OFFSET, "0");
    next
}

/// Turns loosely typed filter input into persistable strings.
///
/// `null`, `false`, `""`, numeric zero and empty arrays/objects count as unset
/// and are omitted.
pub fn normalize_filter_values(values: &Variables) -> FilterMap {
    values
        .iter()
        .filter_map(|(field, value)| {
            let text = match value {
                Value::Null | Value::Bool(false) => return None,
                Value::Bool(true) => "true".to_string(),
                Value::Number(number) => {
                    if number.as_f64() == Some(0.0) {
                        return None;
                    }
                    number.to_string()
                }
                Value::String(text) if text.is_empty() => return None,
                Value::String(text) => text.clone(),
                Value::Array(items) if items.is_empty() => return None,
                Value::Object(map) if map.is_empty() => return None,
                other => other.to_string(),
            };
            Some((field.clone(), text))
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/codec_tests.rs"]
mod tests;
