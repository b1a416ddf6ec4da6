//! The shared context threaded through every PDX operation.

use std::fmt;
use std::sync::Arc;

use crate::config::PdxConfig;
use crate::pdx::{PdxClassRegistry, TypeRegistry};
use crate::serialization::{DataSerializableRegistry, ObjectDataOutput};
use crate::statistics::{PdxStatistics, StatisticsCollector};

/// Bundles configuration, the type registry, factory lookups and the
/// statistics collector.
///
/// A context is shared as `Arc<PdxContext>`; instances and writers keep a
/// handle to it for lazy type resolution and buffer allocation.
pub struct PdxContext {
    config: PdxConfig,
    registry: Arc<TypeRegistry>,
    classes: PdxClassRegistry,
    data_serializables: DataSerializableRegistry,
    statistics: Arc<dyn StatisticsCollector>,
}

impl PdxContext {
    /// Creates a context with its own registry and `PdxStatistics`.
    pub fn new(config: PdxConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// Creates a shared context with the default configuration.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new(PdxConfig::default()))
    }

    /// Creates a new context builder.
    pub fn builder() -> PdxContextBuilder {
        PdxContextBuilder::default()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PdxConfig {
        &self.config
    }

    /// Returns the type registry.
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Returns the class-name factory lookup used for materialization.
    pub fn classes(&self) -> &PdxClassRegistry {
        &self.classes
    }

    /// Returns the class-id factory lookup for `DataSerializable` values.
    pub fn data_serializables(&self) -> &DataSerializableRegistry {
        &self.data_serializables
    }

    /// Returns the statistics collector.
    pub fn statistics(&self) -> &Arc<dyn StatisticsCollector> {
        &self.statistics
    }

    /// Allocates an output buffer with the configured initial capacity.
    pub fn create_data_output(&self) -> ObjectDataOutput {
        ObjectDataOutput::with_capacity(self.config.initial_buffer_capacity())
    }

    /// Handles a disconnect from the cluster.
    ///
    /// Type ids are only meaningful per connection, so the registry is
    /// cleared unless configured otherwise.
    pub fn on_disconnect(&self) {
        if self.config.clear_types_on_disconnect() {
            self.registry.clear();
        } else {
            tracing::debug!(
                types = self.registry.len(),
                "keeping PDX types across disconnect"
            );
        }
    }
}

impl Default for PdxContext {
    fn default() -> Self {
        Self::new(PdxConfig::default())
    }
}

impl fmt::Debug for PdxContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdxContext")
            .field("config", &self.config)
            .field("types", &self.registry.len())
            .field("classes", &self.classes)
            .field("data_serializables", &self.data_serializables)
            .finish()
    }
}

/// Builder for `PdxContext`, used to inject shared collaborators.
#[derive(Default)]
pub struct PdxContextBuilder {
    config: Option<PdxConfig>,
    registry: Option<Arc<TypeRegistry>>,
    statistics: Option<Arc<dyn StatisticsCollector>>,
}

impl PdxContextBuilder {
    /// Sets the configuration.
    pub fn config(mut self, config: PdxConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Shares an existing type registry.
    pub fn registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the statistics collector.
    pub fn statistics(mut self, statistics: Arc<dyn StatisticsCollector>) -> Self {
        self.statistics = Some(statistics);
        self
    }

    /// Builds the context.
    pub fn build(self) -> PdxContext {
        PdxContext {
            config: self.config.unwrap_or_default(),
            registry: self.registry.unwrap_or_default(),
            classes: PdxClassRegistry::new(),
            data_serializables: DataSerializableRegistry::new(),
            statistics: self
                .statistics
                .unwrap_or_else(|| Arc::new(PdxStatistics::new())),
        }
    }
}
