//! Timeout rules for step targets

use desktester_core::locator::DEFAULT_TIMEOUT_SECS;
use desktester_core::LocatorStrategy;

/// The locator a step actually searches with. A step timeout replaces the
/// primary link's timeout; otherwise a primary link still on the stock
/// default takes the project default. Fallback links keep their own.
pub fn effective_locator(target: &LocatorStrategy, step_timeout: Option<f64>, default_timeout: f64) -> LocatorStrategy {
    let mut locator = target.clone();
    match step_timeout {
        Some(t) => locator.timeout = t,
        None if (locator.timeout - DEFAULT_TIMEOUT_SECS).abs() < f64::EPSILON => locator.timeout = default_timeout,
        None => {}
    }
    locator
}

/// Copy of `locator` with every link's timeout set to `secs`.
pub fn with_link_timeouts(locator: &LocatorStrategy, secs: f64) -> LocatorStrategy {
    let mut out = locator.clone();
    let mut link = Some(&mut out);
    while let Some(l) = link {
        l.timeout = secs;
        link = l.fallback.as_deref_mut();
    }
    out
}
