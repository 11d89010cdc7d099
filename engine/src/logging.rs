//! Verbosity-gated logging for the propagation engines.
//!
//! Each engine carries a verbosity in its config. The macros below check it
//! before formatting anything and then hand the record to the `log` facade
//! under the `taskdate` target, so the host picks the backend.
//!
//! | verbosity | macro          | log level | content                          |
//! |-----------|----------------|-----------|----------------------------------|
//! | 0         |                |           | errors only                      |
//! | 1         | `log_changes!` | info      | committed dates, container fits  |
//! | 2         | `log_checks!`  | debug     | node ranges, skipped edges, snaps |
//! | 3         | `log_debug!`   | trace     | layers, distance maps            |

use log::LevelFilter;

pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_CHANGES: u8 = 1;
pub const VERBOSITY_CHECKS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// Log target of every engine message.
pub const TARGET: &str = "taskdate";

/// The `log` level filter that lets through everything a verbosity emits.
pub fn level_filter(verbosity: u8) -> LevelFilter {
    match verbosity {
        VERBOSITY_SILENT => LevelFilter::Error,
        VERBOSITY_CHANGES => LevelFilter::Info,
        VERBOSITY_CHECKS => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Date commits and container fits.
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHANGES {
            ::log::info!(target: $crate::logging::TARGET, $($arg)*);
        }
    };
}

/// Per-node ranges, refused edges, end snapping.
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHECKS {
            ::log::debug!(target: $crate::logging::TARGET, $($arg)*);
        }
    };
}

/// Graph layering and distance maps.
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_DEBUG {
            ::log::trace!(target: $crate::logging::TARGET, $($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter_follows_verbosity() {
        assert_eq!(level_filter(VERBOSITY_SILENT), LevelFilter::Error);
        assert_eq!(level_filter(VERBOSITY_CHANGES), LevelFilter::Info);
        assert_eq!(level_filter(VERBOSITY_CHECKS), LevelFilter::Debug);
        assert_eq!(level_filter(VERBOSITY_DEBUG), LevelFilter::Trace);
        assert_eq!(level_filter(9), LevelFilter::Trace);
    }

    #[test]
    fn test_macros_emit_through_log() {
        let _ = env_logger::builder()
            .is_test(true)
            .filter(Some(TARGET), level_filter(VERBOSITY_DEBUG))
            .try_init();
        log_changes!(VERBOSITY_DEBUG, "moved {} to {}", "a", 3);
        log_checks!(VERBOSITY_CHECKS, "range {}", "[1..2]");
        log_debug!(VERBOSITY_DEBUG, "layer {}", 0);
        // Below the threshold the arguments are never evaluated.
        log_changes!(VERBOSITY_SILENT, "{}", unreachable_value());
    }

    fn unreachable_value() -> u8 {
        panic!("formatted a silenced message")
    }
}
