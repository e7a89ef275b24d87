use std::sync::Arc;

use crate::{
    notify::{Notifier, TracingNotifier},
    strategy::StrategyRegistry,
    transport::{GraphQlTransport, MissingTransport},
    version::VersionBus,
};

/// Everything a controller needs from the application root.
///
/// Built once and handed to every controller; tests build their own.
#[derive(Clone)]
pub struct AdminContext {
    strategies: Arc<StrategyRegistry>,
    transport: Arc<dyn GraphQlTransport>,
    version: VersionBus,
    notifier: Arc<dyn Notifier>,
}

impl AdminContext {
    pub fn new(strategies: StrategyRegistry, transport: Arc<dyn GraphQlTransport>) -> Self {
        Self {
            strategies: Arc::new(strategies),
            transport,
            version: VersionBus::new(),
            notifier: Arc::new(TracingNotifier),
        }
    }

    /// Default strategies and no transport.
    pub fn offline() -> Self {
        Self::new(StrategyRegistry::with_defaults(), Arc::new(MissingTransport))
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_version_bus(mut self, version: VersionBus) -> Self {
        self.version = version;
        self
    }

    pub fn strategies(&self) -> &StrategyRegistry {
        &self.strategies
    }

    pub fn transport(&self) -> &dyn GraphQlTransport {
        self.transport.as_ref()
    }

    pub fn version(&self) -> &VersionBus {
        &self.version
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }
}
