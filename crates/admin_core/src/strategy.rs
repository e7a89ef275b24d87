use std::sync::Arc;

use query_builder::{DefaultQueryBuilder, QueryBuilder};
use serde_json::{json, Value};
use shared::{
    domain::{FilterMap, ListState, Pagination, RecordId, SortMap},
    error::ConfigurationError,
    protocol::Variables,
};

/// What a list strategy turns into request variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListInput {
    pub filters: FilterMap,
    pub pagination: Pagination,
    pub sort: SortMap,
}

impl From<&ListState> for ListInput {
    fn from(state: &ListState) -> Self {
        Self {
            filters: state.filters.clone(),
            pagination: state.pagination(),
            sort: state.sort.clone(),
        }
    }
}

/// A successful read handed to a strategy's normalizer.
#[derive(Debug, Clone, Copy)]
pub struct ReadResult<'a> {
    pub resource: &'a str,
    /// Root field for named operations, document name for static ones.
    pub operation: Option<&'a str>,
    pub data: &'a Value,
}

pub trait ListStrategy: Send + Sync {
    fn get_variables(&self, input: &ListInput) -> Variables;
    fn get_list(&self, result: &ReadResult<'_>) -> Vec<Value>;
    fn get_total(&self, result: &ReadResult<'_>) -> u64;

    /// Capability: build documents for named list operations.
    fn query_builder(&self) -> Option<&dyn QueryBuilder> {
        None
    }
}

pub trait ShowStrategy: Send + Sync {
    fn get_variables(&self, id: &RecordId) -> Variables;
    fn get_item(&self, result: &ReadResult<'_>) -> Option<Value>;

    fn query_builder(&self) -> Option<&dyn QueryBuilder> {
        None
    }
}

pub trait CreateStrategy: Send + Sync {
    fn get_mutation_variables(&self, values: &Value) -> Option<Variables>;

    fn mutation_builder(&self) -> Option<&dyn QueryBuilder> {
        None
    }
}

pub trait EditStrategy: Send + Sync {
    fn get_mutation_variables(&self, id: &RecordId, values: &Value) -> Option<Variables>;

    fn mutation_builder(&self) -> Option<&dyn QueryBuilder> {
        None
    }
}

pub trait DeleteStrategy: Send + Sync {
    fn get_variables(&self, id: &RecordId) -> Option<Variables>;

    fn mutation_builder(&self) -> Option<&dyn QueryBuilder> {
        None
    }
}

/// The strategy set of one application, resolved once at the root.
pub struct StrategyRegistry {
    list: Arc<dyn ListStrategy>,
    show: Arc<dyn ShowStrategy>,
    create: Arc<dyn CreateStrategy>,
    edit: Arc<dyn EditStrategy>,
    delete: Arc<dyn DeleteStrategy>,
    fallback_builder: Option<Arc<dyn QueryBuilder>>,
}

impl StrategyRegistry {
    pub fn builder() -> StrategyRegistryBuilder {
        StrategyRegistryBuilder::default()
    }

    /// [`DefaultStrategy`] for every kind, with the default query builder.
    pub fn with_defaults() -> Self {
        Self::from_strategy(DefaultStrategy, Some(Arc::new(DefaultQueryBuilder::new())))
    }

    fn from_strategy<S>(strategy: S, fallback_builder: Option<Arc<dyn QueryBuilder>>) -> Self
    where
        S: ListStrategy + ShowStrategy + CreateStrategy + EditStrategy + DeleteStrategy + 'static,
    {
        let strategy = Arc::new(strategy);
        Self {
            list: strategy.clone(),
            show: strategy.clone(),
            create: strategy.clone(),
            edit: strategy.clone(),
            delete: strategy,
            fallback_builder,
        }
    }

    pub fn list(&self) -> &dyn ListStrategy {
        self.list.as_ref()
    }

    pub fn show(&self) -> &dyn ShowStrategy {
        self.show.as_ref()
    }

    pub fn create(&self) -> &dyn CreateStrategy {
        self.create.as_ref()
    }

    pub fn edit(&self) -> &dyn EditStrategy {
        self.edit.as_ref()
    }

    pub fn delete(&self) -> &dyn DeleteStrategy {
        self.delete.as_ref()
    }

    pub fn list_query_builder(&self) -> Option<&dyn QueryBuilder> {
        self.list.query_builder().or(self.fallback_builder.as_deref())
    }

    pub fn show_query_builder(&self) -> Option<&dyn QueryBuilder> {
        self.show.query_builder().or(self.fallback_builder.as_deref())
    }

    pub fn create_mutation_builder(&self) -> Option<&dyn QueryBuilder> {
        self.create.mutation_builder().or(self.fallback_builder.as_deref())
    }

    pub fn edit_mutation_builder(&self) -> Option<&dyn QueryBuilder> {
        self.edit.mutation_builder().or(self.fallback_builder.as_deref())
    }

    pub fn delete_mutation_builder(&self) -> Option<&dyn QueryBuilder> {
        self.delete.mutation_builder().or(self.fallback_builder.as_deref())
    }
}

#[derive(Default)]
pub struct StrategyRegistryBuilder {
    list: Option<Arc<dyn ListStrategy>>,
    show: Option<Arc<dyn ShowStrategy>>,
    create: Option<Arc<dyn CreateStrategy>>,
    edit: Option<Arc<dyn EditStrategy>>,
    delete: Option<Arc<dyn DeleteStrategy>>,
    fallback_builder: Option<Arc<dyn QueryBuilder>>,
}

impl StrategyRegistryBuilder {
    /// Registers one value for all five kinds.
    pub fn all<S>(self, strategy: S) -> Self
    where
        S: ListStrategy + ShowStrategy + CreateStrategy + EditStrategy + DeleteStrategy + 'static,
    {
        let strategy = Arc::new(strategy);
        Self {
            list: Some(strategy.clone()),
            show: Some(strategy.clone()),
            create: Some(strategy.clone()),
            edit: Some(strategy.clone()),
            delete: Some(strategy),
            ..self
        }
    }

    pub fn list(mut self, strategy: impl ListStrategy + 'static) -> Self {
        self.list = Some(Arc::new(strategy));
        self
    }

    pub fn show(mut self, strategy: impl ShowStrategy + 'static) -> Self {
        self.show = Some(Arc::new(strategy));
        self
    }

    pub fn create(mut self, strategy: impl CreateStrategy + 'static) -> Self {
        self.create = Some(Arc::new(strategy));
        self
    }

    pub fn edit(mut self, strategy: impl EditStrategy + 'static) -> Self {
        self.edit = Some(Arc::new(strategy));
        self
    }

    pub fn delete(mut self, strategy: impl DeleteStrategy + 'static) -> Self {
        self.delete = Some(Arc::new(strategy));
        self
    }

    /// Lets strategies without their own builder fall back to
    /// [`DefaultQueryBuilder`]. Without this, named operations require a
    /// strategy that can build documents.
    pub fn with_default_query_builder(self) -> Self {
        self.with_query_builder(DefaultQueryBuilder::new())
    }

    pub fn with_query_builder(mut self, builder: impl QueryBuilder + 'static) -> Self {
        self.fallback_builder = Some(Arc::new(builder));
        self
    }

    pub fn build(self) -> Result<StrategyRegistry, ConfigurationError> {
        Ok(StrategyRegistry {
            list: self.list.ok_or(ConfigurationError::MissingStrategy { kind: "list" })?,
            show: self.show.ok_or(ConfigurationError::MissingStrategy { kind: "show" })?,
            create: self
                .create
                .ok_or(ConfigurationError::MissingStrategy { kind: "create" })?,
            edit: self.edit.ok_or(ConfigurationError::MissingStrategy { kind: "edit" })?,
            delete: self
                .delete
                .ok_or(ConfigurationError::MissingStrategy { kind: "delete" })?,
            fallback_builder: self.fallback_builder,
        })
    }
}

/// Strategy for backends shaped like
/// `companies(pagination, sort, filters) { total data { ... } }`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStrategy;

impl DefaultStrategy {
    fn root<'a>(result: &ReadResult<'a>) -> Option<&'a Value> {
        if let Some(value) = result.operation.and_then(|op| result.data.get(op)) {
            return Some(value);
        }
        match result.data {
            Value::Object(fields) => fields
                .iter()
                .find(|(name, _)| !name.starts_with("__"))
                .map(|(_, value)| value),
            Value::Null => None,
            other => Some(other),
        }
    }

    fn rows<'a>(result: &ReadResult<'a>) -> Option<&'a Vec<Value>> {
        match Self::root(result)? {
            Value::Array(rows) => Some(rows),
            root => root.get("data").and_then(Value::as_array),
        }
    }
}

impl ListStrategy for DefaultStrategy {
    fn get_variables(&self, input: &ListInput) -> Variables {
        let mut variables = Variables::new();
        variables.insert(
            "pagination".into(),
            json!({
                "limit": input.pagination.limit,
                "offset": input.pagination.offset,
            }),
        );
        if !input.sort.is_empty() {
            let sort = input
                .sort
                .iter()
                .map(|(field, direction)| {
                    (field.clone(), Value::from(direction.as_str().to_ascii_uppercase()))
                })
                .collect();
            variables.insert("sort".into(), Value::Object(sort));
        }
        if !input.filters.is_empty() {
            let filters = input
                .filters
                .iter()
                .map(|(field, value)| (field.clone(), Value::from(value.as_str())))
                .collect();
            variables.insert("filters".into(), Value::Object(filters));
        }
        variables
    }

    fn get_list(&self, result: &ReadResult<'_>) -> Vec<Value> {
        Self::rows(result).cloned().unwrap_or_default()
    }

    fn get_total(&self, result: &ReadResult<'_>) -> u64 {
        Self::root(result)
            .and_then(|root| root.get("total"))
            .and_then(Value::as_u64)
            .or_else(|| Self::rows(result).map(|rows| rows.len() as u64))
            .unwrap_or(0)
    }
}

impl ShowStrategy for DefaultStrategy {
    fn get_variables(&self, id: &RecordId) -> Variables {
        let mut variables = Variables::new();
        variables.insert("id".into(), Value::from(id.as_str()));
        variables
    }

    fn get_item(&self, result: &ReadResult<'_>) -> Option<Value> {
        Self::root(result).filter(|item| !item.is_null()).cloned()
    }
}

impl CreateStrategy for DefaultStrategy {
    fn get_mutation_variables(&self, values: &Value) -> Option<Variables> {
        let mut variables = Variables::new();
        variables.insert("data".into(), values.clone());
        Some(variables)
    }
}

impl EditStrategy for DefaultStrategy {
    fn get_mutation_variables(&self, id: &RecordId, values: &Value) -> Option<Variables> {
        if id.as_str().is_empty() {
            return None;
        }
        let mut variables = Variables::new();
        variables.insert("id".into(), Value::from(id.as_str()));
        variables.insert("data".into(), values.clone());
        Some(variables)
    }
}

impl DeleteStrategy for DefaultStrategy {
    fn get_variables(&self, id: &RecordId) -> Option<Variables> {
        if id.as_str().is_empty() {
            return None;
        }
        let mut variables = Variables::new();
        variables.insert("id".into(), Value::from(id.as_str()));
        Some(variables)
    }
}

#[cfg(test)]
mod tests {
    use shared::domain::SortDirection;

    use super::*;

    fn read<'a>(operation: Option<&'a str>, data: &'a Value) -> ReadResult<'a> {
        ReadResult {
            resource: "Company",
            operation,
            data,
        }
    }

    #[test]
    fn registry_requires_every_kind() {
        let err = StrategyRegistry::builder()
            .list(DefaultStrategy)
            .show(DefaultStrategy)
            .create(DefaultStrategy)
            .edit(DefaultStrategy)
            .build()
            .err();
        assert_eq!(err, Some(ConfigurationError::MissingStrategy { kind: "delete" }));
    }

    #[test]
    fn default_builder_is_opt_in() {
        let without = StrategyRegistry::builder()
            .all(DefaultStrategy)
            .build()
            .expect("registry");
        assert!(without.list_query_builder().is_none());
        assert!(without.delete_mutation_builder().is_none());

        let with = StrategyRegistry::builder()
            .all(DefaultStrategy)
            .with_default_query_builder()
            .build()
            .expect("registry");
        assert!(with.list_query_builder().is_some());
        assert!(with.show_query_builder().is_some());
        assert!(with.create_mutation_builder().is_some());
    }

    #[test]
    fn list_variables_follow_pagination_sort_filters_shape() {
        let input = ListInput {
            filters: [("name".to_string(), "acme".to_string())].into(),
            pagination: Pagination::new(20, 40),
            sort: [("name".to_string(), SortDirection::Asc)].into(),
        };
        let variables = ListStrategy::get_variables(&DefaultStrategy, &input);
        assert_eq!(
            Value::Object(variables),
            json!({
                "pagination": { "limit": 20, "offset": 40 },
                "sort": { "name": "ASC" },
                "filters": { "name": "acme" },
            })
        );
    }

    #[test]
    fn empty_sort_and_filters_are_not_sent() {
        let input = ListInput::from(&ListState::default());
        let variables = ListStrategy::get_variables(&DefaultStrategy, &input);
        assert_eq!(variables.len(), 1);
        assert!(variables.contains_key("pagination"));
    }

    #[test]
    fn list_normalizer_reads_total_and_rows() {
        let data = json!({
            "companies": { "total": 42, "data": [{ "id": "1" }, { "id": "2" }] }
        });
        let result = read(Some("companies"), &data);
        assert_eq!(DefaultStrategy.get_list(&result).len(), 2);
        assert_eq!(DefaultStrategy.get_total(&result), 42);
    }

    #[test]
    fn list_normalizer_falls_back_to_first_root_field_and_array_length() {
        let data = json!({ "__typename": "Query", "items": [{ "id": "1" }] });
        let result = read(Some("GetItems"), &data);
        assert_eq!(DefaultStrategy.get_list(&result), vec![json!({ "id": "1" })]);
        assert_eq!(DefaultStrategy.get_total(&result), 1);
    }

    #[test]
    fn show_normalizer_treats_null_as_missing() {
        let data = json!({ "company": null });
        assert_eq!(DefaultStrategy.get_item(&read(Some("company"), &data)), None);

        let data = json!({ "company": { "id": "7" } });
        assert_eq!(
            DefaultStrategy.get_item(&read(Some("company"), &data)),
            Some(json!({ "id": "7" }))
        );
    }

    #[test]
    fn delete_without_id_has_no_variables() {
        assert!(DeleteStrategy::get_variables(&DefaultStrategy, &RecordId::from("")).is_none());
        assert!(DeleteStrategy::get_variables(&DefaultStrategy, &RecordId::from("3")).is_some());
    }

    #[test]
    fn edit_without_id_has_no_variables() {
        let values = json!({ "name": "x" });
        assert!(
            EditStrategy::get_mutation_variables(&DefaultStrategy, &RecordId::from(""), &values)
                .is_none()
        );
        assert_eq!(
            EditStrategy::get_mutation_variables(&DefaultStrategy, &RecordId::from("3"), &values)
                .map(Value::Object),
            Some(json!({ "id": "3", "data": { "name": "x" } }))
        );
    }
}
