use std::time::Duration;

use crate::error::{ModelError, ModelResult};

/// Configuration for relation loading
#[derive(Debug, Clone, PartialEq)]
pub struct EagerLoadConfig {
    /// Maximum number of keys in a single IN list; larger key sets are chunked
    pub max_batch_size: usize,
    /// Maximum depth of nested relation paths
    pub max_depth: usize,
    /// Run the fetches of one depth concurrently
    pub enable_parallelism: bool,
    /// Query timeout in milliseconds; 0 disables the timeout
    pub query_timeout_ms: u64,
    /// Fail on morph discriminators that map to no known type
    pub strict_morph: bool,
}

impl Default for EagerLoadConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 1000,
            max_depth: 10,
            enable_parallelism: true,
            query_timeout_ms: 30000,
            strict_morph: false,
        }
    }
}

impl EagerLoadConfig {
    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn parallel(mut self, enabled: bool) -> Self {
        self.enable_parallelism = enabled;
        self
    }

    pub fn query_timeout_ms(mut self, timeout: u64) -> Self {
        self.query_timeout_ms = timeout;
        self
    }

    pub fn strict_morph(mut self, strict: bool) -> Self {
        self.strict_morph = strict;
        self
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        (self.query_timeout_ms > 0).then(|| Duration::from_millis(self.query_timeout_ms))
    }

    pub fn validate(&self) -> ModelResult<()> {
        if self.max_batch_size == 0 {
            return Err(ModelError::Configuration(
                "max_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(ModelError::Configuration(
                "max_depth must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EagerLoadConfig::default();
        assert_eq!(config.max_batch_size, 1000);
        assert_eq!(config.max_depth, 10);
        assert!(!config.strict_morph);
        assert_eq!(config.query_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_zero_timeout_disables() {
        let config = EagerLoadConfig::default().query_timeout_ms(0);
        assert_eq!(config.query_timeout(), None);
    }

    #[test]
    fn test_validation() {
        assert!(EagerLoadConfig::default().max_batch_size(0).validate().is_err());
        assert!(EagerLoadConfig::default().max_depth(0).validate().is_err());
    }
}
