use std::collections::BTreeMap;

use serde_json::Value;
use shared::{error::ConfigurationError, protocol::Variables};
use tracing::trace;

use crate::{
    document::{Document, OperationKind},
    fields::FieldTree,
};

/// An abstract request: which operation on which resource, with what
/// variables and which fields.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    pub kind: OperationKind,
    pub resource: String,
    pub operation: String,
    pub variables: Variables,
    pub fields: Vec<String>,
}

impl OperationDescriptor {
    pub fn query(
        resource: impl Into<String>,
        operation: impl Into<String>,
        variables: Variables,
        fields: Vec<String>,
    ) -> Self {
        Self {
            kind: OperationKind::Query,
            resource: resource.into(),
            operation: operation.into(),
            variables,
            fields,
        }
    }

    pub fn mutation(
        resource: impl Into<String>,
        operation: impl Into<String>,
        variables: Variables,
        fields: Vec<String>,
    ) -> Self {
        Self {
            kind: OperationKind::Mutation,
            ..Self::query(resource, operation, variables, fields)
        }
    }
}

/// Synthesizes a document for a named operation.
///
/// Implementations must be deterministic: equal descriptors produce
/// byte-identical documents, which keeps transport-level de-duplication and
/// caching effective.
pub trait QueryBuilder: Send + Sync {
    fn build(&self, descriptor: &OperationDescriptor) -> Result<Document, ConfigurationError>;
}

/// Builds `query Companies($limit: Int) { companies(limit: $limit) { id name } }`
/// style documents.
///
/// Variable types come from declarations first (`Resource.variable` before
/// `variable`, with `{Resource}` in a declared type replaced by the resource
/// name) and otherwise from the JSON value: booleans, integers, floats and
/// strings map to the built-in scalars. Objects and arrays need a declaration.
/// `null` variables are left out of the document.
///
/// Declared out of the box:
///
/// | variable     | type                   |
/// |--------------|------------------------|
/// | `id`         | `ID!`                  |
/// | `pagination` | `PaginationInput`      |
/// | `sort`       | `{Resource}SortInput`  |
/// | `filters`    | `{Resource}FilterInput` |
/// | `data`       | `{Resource}Input!`     |
#[derive(Debug, Clone)]
pub struct DefaultQueryBuilder {
    variable_types: BTreeMap<String, String>,
}

impl DefaultQueryBuilder {
    pub fn new() -> Self {
        Self {
            variable_types: [
                ("id", "ID!"),
                ("pagination", "PaginationInput"),
                ("sort", "{Resource}SortInput"),
                ("filters", "{Resource}FilterInput"),
                ("data", "{Resource}Input!"),
            ]
            .into_iter()
            .map(|(name, ty)| (name.to_string(), ty.to_string()))
            .collect(),
        }
    }

    pub fn with_variable_type(mut self, variable: impl Into<String>, ty: impl Into<String>) -> Self {
        self.variable_types.insert(variable.into(), ty.into());
        self
    }

    fn variable_type(
        &self,
        descriptor: &OperationDescriptor,
        name: &str,
        value: &Value,
    ) -> Result<String, ConfigurationError> {
        let qualified = format!("{}.{name}", descriptor.resource);
        if let Some(ty) = self
            .variable_types
            .get(&qualified)
            .or_else(|| self.variable_types.get(name))
        {
            return Ok(ty.replace("{Resource}", &descriptor.resource));
        }

        let inferred = match value {
            Value::Bool(_) => "Boolean",
            Value::Number(number) if number.is_i64() || number.is_u64() => "Int",
            Value::Number(_) => "Float",
            Value::String(_) => "String",
            Value::Null | Value::Array(_) | Value::Object(_) => {
                return Err(ConfigurationError::UntypedVariable {
                    operation: descriptor.operation.clone(),
                    name: name.to_string(),
                })
            }
        };
        Ok(inferred.to_string())
    }
}

impl Default for DefaultQueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryBuilder for DefaultQueryBuilder {
    fn build(&self, descriptor: &OperationDescriptor) -> Result<Document, ConfigurationError> {
        let selection = FieldTree::from_paths(&descriptor.fields);
        if selection.is_empty() && descriptor.kind == OperationKind::Query {
            return Err(ConfigurationError::EmptySelection {
                operation: descriptor.operation.clone(),
            });
        }

        let mut declarations = Vec::new();
        let mut arguments = Vec::new();
        for (name, value) in descriptor.variables.iter().filter(|(_, v)| !v.is_null()) {
            let ty = self.variable_type(descriptor, name, value)?;
            declarations.push(format!("${name}: {ty}"));
            arguments.push(format!("{name}: ${name}"));
        }

        let name = operation_name(&descriptor.operation);
        let mut source = format!("{} {name}", descriptor.kind.keyword());
        if !declarations.is_empty() {
            source.push('(');
            source.push_str(&declarations.join(", "));
            source.push(')');
        }
        source.push_str(" { ");
        source.push_str(&descriptor.operation);
        if !arguments.is_empty() {
            source.push('(');
            source.push_str(&arguments.join(", "));
            source.push(')');
        }
        if !selection.is_empty() {
            source.push(' ');
            selection.render(&mut source);
        }
        source.push_str(" }");

        trace!(
            resource = descriptor.resource.as_str(),
            operation = descriptor.operation.as_str(),
            "gql: built document"
        );
        Ok(Document::built(descriptor.kind, name, source))
    }
}

fn operation_name(operation: &str) -> String {
    let mut chars = operation.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn vars(value: Value) -> Variables {
        value.as_object().cloned().expect("object")
    }

    fn fields(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn builds_requested_fields_under_operation() {
        let builder = DefaultQueryBuilder::new();
        let descriptor = OperationDescriptor::query(
            "Company",
            "companies",
            vars(json!({ "limit": 10 })),
            fields(&["id", "name"]),
        );
        let document = builder.build(&descriptor).expect("document");
        assert_eq!(
            document.source(),
            "query Companies($limit: Int) { companies(limit: $limit) { id name } }"
        );
        assert_eq!(document.kind(), OperationKind::Query);
        assert_eq!(document.name(), Some("Companies"));
    }

    #[test]
    fn repeated_builds_are_byte_identical() {
        let builder = DefaultQueryBuilder::new().with_variable_type("Company.search", "String!");
        let descriptor = OperationDescriptor::query(
            "Company",
            "companies",
            vars(json!({
                "pagination": { "limit": 10, "offset": 0 },
                "filters": { "name": "acme" },
                "search": "a",
            })),
            fields(&["total", "data.id", "data.name"]),
        );
        let first = builder.build(&descriptor).expect("first");
        let second = builder.build(&descriptor.clone()).expect("second");
        assert_eq!(first, second);
        assert_eq!(
            first.source(),
            "query Companies($filters: CompanyFilterInput, $pagination: PaginationInput, $search: String!) \
             { companies(filters: $filters, pagination: $pagination, search: $search) { total data { id name } } }"
        );
    }

    #[test]
    fn query_without_fields_is_a_configuration_error() {
        let descriptor =
            OperationDescriptor::query("Company", "companies", Variables::new(), Vec::new());
        assert_eq!(
            DefaultQueryBuilder::new().build(&descriptor),
            Err(ConfigurationError::EmptySelection {
                operation: "companies".into()
            })
        );
    }

    #[test]
    fn mutation_may_return_a_scalar() {
        let descriptor = OperationDescriptor::mutation(
            "Company",
            "deleteCompany",
            vars(json!({ "id": "42" })),
            Vec::new(),
        );
        let document = DefaultQueryBuilder::new().build(&descriptor).expect("document");
        assert_eq!(
            document.source(),
            "mutation DeleteCompany($id: ID!) { deleteCompany(id: $id) }"
        );
        assert_eq!(document.kind(), OperationKind::Mutation);
    }

    #[test]
    fn object_variables_need_a_declared_type() {
        let descriptor = OperationDescriptor::query(
            "Company",
            "companies",
            vars(json!({ "where": { "name": "acme" } })),
            fields(&["id"]),
        );
        assert!(matches!(
            DefaultQueryBuilder::new().build(&descriptor),
            Err(ConfigurationError::UntypedVariable { name, .. }) if name == "where"
        ));
    }

    #[test]
    fn null_variables_are_left_out() {
        let descriptor = OperationDescriptor::query(
            "Company",
            "company",
            vars(json!({ "id": "1", "locale": null })),
            fields(&["id"]),
        );
        let document = DefaultQueryBuilder::new().build(&descriptor).expect("document");
        assert_eq!(
            document.source(),
            "query Company($id: ID!) { company(id: $id) { id } }"
        );
    }
}
