//! Global configuration for gritflow runtime behavior.
//!
//! Process-wide switches that transforms read when they are constructed,
//! so that the per-record paths stay free of configuration lookups.

use std::sync::atomic::{AtomicBool, Ordering};

/// Global flag for validating the sort order of sweep-line input.
///
/// Sweep-line transforms (coverage) assume input sorted by chromosome and
/// start. Unsorted input silently produces wrong segments. When this flag
/// is set, such transforms verify the order as records stream through and
/// fail on the first out-of-order record.
static STRICT_ORDER: AtomicBool = AtomicBool::new(false);

/// Enable or disable input order validation.
///
/// The flag is read when a transform is built or reset, so set it before
/// building the pipeline.
///
/// # Example
///
/// ```
/// use gritflow::config;
///
/// config::set_strict_order(true);
/// assert!(config::is_strict_order());
/// config::set_strict_order(false);
/// ```
#[inline]
pub fn set_strict_order(enabled: bool) {
    STRICT_ORDER.store(enabled, Ordering::Release);
}

/// Check if input order validation is enabled.
#[inline]
pub fn is_strict_order() -> bool {
    STRICT_ORDER.load(Ordering::Acquire)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_default_is_lenient() {
        set_strict_order(false);
        assert!(!is_strict_order());
    }

    #[test]
    #[serial]
    fn test_toggle() {
        set_strict_order(true);
        assert!(is_strict_order());
        set_strict_order(false);
        assert!(!is_strict_order());
    }
}
