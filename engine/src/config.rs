//! Configuration types for the propagation engines.

use crate::logging::VERBOSITY_SILENT;

/// Configuration for the layered scheduler.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// A disabled scheduler skips every run
    pub enabled: bool,
    /// Logging verbosity (see `logging`)
    pub verbosity: u8,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            verbosity: VERBOSITY_SILENT,
        }
    }
}

impl SchedulerConfig {
    /// Default configuration with the given verbosity.
    pub fn with_verbosity(verbosity: u8) -> Self {
        Self {
            verbosity,
            ..Self::default()
        }
    }
}

/// Configuration for the distance-based recompute.
#[derive(Clone, Debug)]
pub struct RecalculateConfig {
    /// A disabled recompute skips every run
    pub enabled: bool,
    /// Logging verbosity (see `logging`)
    pub verbosity: u8,
}

impl Default for RecalculateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            verbosity: VERBOSITY_SILENT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::VERBOSITY_CHECKS;

    #[test]
    fn test_defaults_enabled_and_silent() {
        let config = SchedulerConfig::default();
        assert!(config.enabled);
        assert_eq!(config.verbosity, VERBOSITY_SILENT);

        let recalc = RecalculateConfig::default();
        assert!(recalc.enabled);
        assert_eq!(recalc.verbosity, VERBOSITY_SILENT);
    }

    #[test]
    fn test_with_verbosity_keeps_enabled() {
        let config = SchedulerConfig::with_verbosity(VERBOSITY_CHECKS);
        assert!(config.enabled);
        assert_eq!(config.verbosity, VERBOSITY_CHECKS);
    }
}
