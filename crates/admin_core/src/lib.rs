//! Resource data controllers for an admin panel over a GraphQL backend.
//!
//! A single [`AdminContext`] carries the strategy registry, the transport,
//! the version bus and the notifier. Read controllers ([`ListController`],
//! [`ShowController`]) refresh whenever the version bus moves; the
//! [`MutationController`] moves it after every confirmed write.

pub mod context;
pub mod list;
pub mod mutation;
pub mod notify;
mod read;
mod resolve;
pub mod show;
pub mod strategy;
pub mod transport;
pub mod version;

pub use context::AdminContext;
pub use list::{ListController, ListProps, ListSnapshot};
pub use mutation::{MutationController, MutationKind, MutationProps};
pub use notify::{Notification, NotificationStatus, Notifier, TracingNotifier};
pub use read::FetchStatus;
pub use show::{ShowController, ShowProps, ShowSnapshot};
pub use strategy::{
    CreateStrategy, DefaultStrategy, DeleteStrategy, EditStrategy, ListInput, ListStrategy,
    ReadResult, ShowStrategy, StrategyRegistry, StrategyRegistryBuilder,
};
pub use transport::{GraphQlTransport, HttpTransport, MissingTransport};
pub use version::VersionBus;

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
