use std::fmt;

use shared::error::ConfigurationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Query,
    Mutation,
}

impl OperationKind {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
        }
    }
}

/// A GraphQL executable document holding exactly one operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Document {
    kind: OperationKind,
    name: Option<String>,
    source: String,
}

impl Document {
    /// Wraps a hand-written document. Only the operation keyword and name are
    /// inspected; the body is passed through untouched.
    pub fn parse(source: impl Into<String>) -> Result<Self, ConfigurationError> {
        let source = source.into();
        let body = skip_ignored(&source);

        if body.starts_with('{') {
            return Ok(Self {
                kind: OperationKind::Query,
                name: None,
                source,
            });
        }

        let (kind, rest) = if let Some(rest) = strip_keyword(body, "query") {
            (OperationKind::Query, rest)
        } else if let Some(rest) = strip_keyword(body, "mutation") {
            (OperationKind::Mutation, rest)
        } else {
            let head: String = body.chars().take(24).collect();
            return Err(ConfigurationError::InvalidDocument(format!(
                "expected a query or mutation, found '{head}'"
            )));
        };

        let rest = rest.trim_start();
        let name: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();

        Ok(Self {
            kind,
            name: (!name.is_empty()).then_some(name),
            source,
        })
    }

    pub(crate) fn built(kind: OperationKind, name: String, source: String) -> Self {
        Self {
            kind,
            name: Some(name),
            source,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Where a controller's document comes from.
///
/// A static document is always used as is. A named operation needs a builder
/// and a selection set before it can be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationSource {
    Static(Document),
    Named(String),
}

impl OperationSource {
    pub fn named(operation: impl Into<String>) -> Self {
        Self::Named(operation.into())
    }

    pub fn operation_name(&self) -> Option<&str> {
        match self {
            Self::Static(document) => document.name(),
            Self::Named(operation) => Some(operation),
        }
    }
}

impl From<Document> for OperationSource {
    fn from(document: Document) -> Self {
        Self::Static(document)
    }
}

fn skip_ignored(mut source: &str) -> &str {
    loop {
        source = source.trim_start_matches(|c: char| c.is_whitespace() || c == ',' || c == '\u{feff}');
        match source.strip_prefix('#') {
            Some(comment) => {
                source = comment.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
            }
            None => return source,
        }
    }
}

fn strip_keyword<'a>(body: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = body.strip_prefix(keyword)?;
    match rest.chars().next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => None,
        _ => Some(rest),
    }
}
