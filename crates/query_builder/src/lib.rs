//! Turns abstract operation descriptors into GraphQL documents.

mod builder;
mod document;
mod fields;

pub use builder::{DefaultQueryBuilder, OperationDescriptor, QueryBuilder};
pub use document::{Document, OperationKind, OperationSource};
pub use fields::FieldTree;
