use query_builder::{Document, OperationDescriptor, OperationKind, OperationSource, QueryBuilder};
use shared::{error::ConfigurationError, protocol::Variables};

/// Mount-time check that `operation` can ever produce a document of `kind`.
pub(crate) fn validate_source(
    operation: &OperationSource,
    builder: Option<&dyn QueryBuilder>,
    kind: OperationKind,
    strategy_kind: &'static str,
    resource: &str,
) -> Result<(), ConfigurationError> {
    match operation {
        OperationSource::Static(document) if document.kind() != kind => {
            Err(ConfigurationError::InvalidDocument(format!(
                "{strategy_kind} on '{resource}' needs a {} document, got a {}",
                kind.keyword(),
                document.kind().keyword()
            )))
        }
        OperationSource::Static(_) => Ok(()),
        OperationSource::Named(name) if builder.is_none() => {
            Err(ConfigurationError::MissingQueryBuilder {
                resource: resource.to_string(),
                operation: name.clone(),
                kind: strategy_kind,
            })
        }
        OperationSource::Named(_) => Ok(()),
    }
}

/// Picks the document to send. A static document always wins over a
/// selection set. `None` means a named query still waits for its fields.
pub(crate) fn resolve_document(
    operation: &OperationSource,
    builder: Option<&dyn QueryBuilder>,
    kind: OperationKind,
    strategy_kind: &'static str,
    resource: &str,
    variables: &Variables,
    fields: &[String],
) -> Result<Option<Document>, ConfigurationError> {
    validate_source(operation, builder, kind, strategy_kind, resource)?;
    let (OperationSource::Named(name), Some(builder)) = (operation, builder) else {
        return match operation {
            OperationSource::Static(document) => Ok(Some(document.clone())),
            OperationSource::Named(_) => Ok(None),
        };
    };

    if kind == OperationKind::Query && fields.is_empty() {
        return Ok(None);
    }

    let descriptor = OperationDescriptor {
        kind,
        resource: resource.to_string(),
        operation: name.clone(),
        variables: variables.clone(),
        fields: fields.to_vec(),
    };
    builder.build(&descriptor).map(Some)
}

#[cfg(test)]
mod tests {
    use query_builder::DefaultQueryBuilder;

    use super::*;

    fn fields(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn static_document_wins_over_fields() {
        let document = Document::parse("query GetCompanies { companies { total } }").expect("doc");
        let builder = DefaultQueryBuilder::new();
        let resolved = resolve_document(
            &OperationSource::Static(document.clone()),
            Some(&builder),
            OperationKind::Query,
            "list",
            "Company",
            &Variables::new(),
            &fields(&["id", "name"]),
        )
        .expect("resolve");
        assert_eq!(resolved, Some(document));
    }

    #[test]
    fn named_operation_without_builder_is_rejected() {
        let err = validate_source(
            &OperationSource::named("companies"),
            None,
            OperationKind::Query,
            "list",
            "Company",
        )
        .expect_err("should fail");
        assert!(matches!(err, ConfigurationError::MissingQueryBuilder { kind: "list", .. }));
    }

    #[test]
    fn named_query_waits_for_fields() {
        let builder = DefaultQueryBuilder::new();
        let resolved = resolve_document(
            &OperationSource::named("companies"),
            Some(&builder),
            OperationKind::Query,
            "list",
            "Company",
            &Variables::new(),
            &[],
        )
        .expect("resolve");
        assert_eq!(resolved, None);
    }

    #[test]
    fn mutation_document_cannot_serve_a_read() {
        let document =
            Document::parse("mutation DeleteCompany($id: ID!) { deleteCompany(id: $id) }")
                .expect("doc");
        let err = validate_source(
            &OperationSource::Static(document),
            None,
            OperationKind::Query,
            "show",
            "Company",
        )
        .expect_err("should fail");
        assert!(matches!(err, ConfigurationError::InvalidDocument(_)));
    }
}
