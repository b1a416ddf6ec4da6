//! Configuration for the PDX engine.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{PdxError, Result};

/// Default for returning instances instead of objects on deserialization.
const DEFAULT_READ_SERIALIZED: bool = false;
/// Default for clearing the type registry on disconnect.
const DEFAULT_CLEAR_TYPES_ON_DISCONNECT: bool = true;
/// Default capacity of freshly allocated output buffers.
const DEFAULT_INITIAL_BUFFER_CAPACITY: usize = 256;
/// Smallest buffer able to hold a PDX code and header.
const MIN_BUFFER_CAPACITY: usize = 9;

/// PDX engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PdxConfig {
    read_serialized: bool,
    clear_types_on_disconnect: bool,
    initial_buffer_capacity: usize,
}

impl PdxConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> PdxConfigBuilder {
        PdxConfigBuilder::new()
    }

    /// Returns true if deserialization yields `PdxInstance`s rather than
    /// concrete objects.
    pub fn read_serialized(&self) -> bool {
        self.read_serialized
    }

    /// Returns true if a disconnect clears the type registry.
    pub fn clear_types_on_disconnect(&self) -> bool {
        self.clear_types_on_disconnect
    }

    /// Returns the initial capacity of output buffers.
    pub fn initial_buffer_capacity(&self) -> usize {
        self.initial_buffer_capacity
    }
}

impl Default for PdxConfig {
    fn default() -> Self {
        Self {
            read_serialized: DEFAULT_READ_SERIALIZED,
            clear_types_on_disconnect: DEFAULT_CLEAR_TYPES_ON_DISCONNECT,
            initial_buffer_capacity: DEFAULT_INITIAL_BUFFER_CAPACITY,
        }
    }
}

impl From<PdxConfig> for PdxConfigBuilder {
    fn from(config: PdxConfig) -> Self {
        Self {
            read_serialized: Some(config.read_serialized),
            clear_types_on_disconnect: Some(config.clear_types_on_disconnect),
            initial_buffer_capacity: Some(config.initial_buffer_capacity),
        }
    }
}

/// Builder for `PdxConfig`.
#[derive(Debug, Clone, Default)]
pub struct PdxConfigBuilder {
    read_serialized: Option<bool>,
    clear_types_on_disconnect: Option<bool>,
    initial_buffer_capacity: Option<usize>,
}

impl PdxConfigBuilder {
    /// Creates a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether deserialization yields `PdxInstance`s.
    pub fn read_serialized(mut self, read_serialized: bool) -> Self {
        self.read_serialized = Some(read_serialized);
        self
    }

    /// Sets whether a disconnect clears the type registry.
    pub fn clear_types_on_disconnect(mut self, clear: bool) -> Self {
        self.clear_types_on_disconnect = Some(clear);
        self
    }

    /// Sets the initial capacity of output buffers.
    pub fn initial_buffer_capacity(mut self, capacity: usize) -> Self {
        self.initial_buffer_capacity = Some(capacity);
        self
    }

    /// Builds the configuration, returning an error if validation fails.
    ///
    /// # Errors
    ///
    /// Returns `PdxError::Configuration` if `initial_buffer_capacity` is
    /// smaller than a PDX header.
    pub fn build(self) -> Result<PdxConfig> {
        let initial_buffer_capacity = self
            .initial_buffer_capacity
            .unwrap_or(DEFAULT_INITIAL_BUFFER_CAPACITY);
        if initial_buffer_capacity < MIN_BUFFER_CAPACITY {
            return Err(PdxError::Configuration(format!(
                "initial_buffer_capacity must be at least {}",
                MIN_BUFFER_CAPACITY
            )));
        }

        Ok(PdxConfig {
            read_serialized: self.read_serialized.unwrap_or(DEFAULT_READ_SERIALIZED),
            clear_types_on_disconnect: self
                .clear_types_on_disconnect
                .unwrap_or(DEFAULT_CLEAR_TYPES_ON_DISCONNECT),
            initial_buffer_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PdxConfig::default();
        assert!(!config.read_serialized());
        assert!(config.clear_types_on_disconnect());
        assert_eq!(config.initial_buffer_capacity(), DEFAULT_INITIAL_BUFFER_CAPACITY);
    }

    #[test]
    fn test_builder_defaults_match_default() {
        assert_eq!(PdxConfig::builder().build().unwrap(), PdxConfig::default());
    }

    #[test]
    fn test_builder_overrides() {
        let config = PdxConfig::builder()
            .read_serialized(true)
            .clear_types_on_disconnect(false)
            .initial_buffer_capacity(1024)
            .build()
            .unwrap();
        assert!(config.read_serialized());
        assert!(!config.clear_types_on_disconnect());
        assert_eq!(config.initial_buffer_capacity(), 1024);
    }

    #[test]
    fn test_capacity_too_small() {
        let err = PdxConfig::builder()
            .initial_buffer_capacity(8)
            .build()
            .unwrap_err();
        assert!(matches!(err, PdxError::Configuration(_)));
        assert!(err.to_string().contains("initial_buffer_capacity"));
    }

    #[test]
    fn test_builder_from_config() {
        let config = PdxConfig::builder().read_serialized(true).build().unwrap();
        let rebuilt = PdxConfigBuilder::from(config.clone())
            .initial_buffer_capacity(64)
            .build()
            .unwrap();
        assert!(rebuilt.read_serialized());
        assert_eq!(rebuilt.initial_buffer_capacity(), 64);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_round_trip() {
        let config = PdxConfig::builder()
            .clear_types_on_disconnect(false)
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let decoded: PdxConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, config);
    }
}
