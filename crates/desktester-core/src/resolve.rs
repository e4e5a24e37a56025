//! Locator resolution: tree search, polling and fallback

use crate::backend::{AppInfo, PlatformBackend};
use crate::element::UIElement;
use crate::error::{Error, Result};
use crate::locator::LocatorStrategy;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    pub max_depth: usize,
    pub poll_interval: Duration,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            max_depth: 15,
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Longest wait a timeout or duration can produce.
pub const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// `secs` as a `Duration` capped at [`MAX_WAIT`]. Negative and NaN are zero.
pub fn wait_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        Duration::ZERO
    } else {
        Duration::from_secs_f64(secs.min(MAX_WAIT.as_secs_f64()))
    }
}

/// End of a wait of `timeout` starting now, capped at [`MAX_WAIT`].
pub fn deadline_after(timeout: Duration) -> Instant {
    Instant::now() + timeout.min(MAX_WAIT)
}

/// One pass over the tree: every element matching `locator` (its fallback is
/// ignored), in depth-first order.
pub fn search<B>(backend: &B, app: &AppInfo, locator: &LocatorStrategy, max_depth: usize) -> Result<Vec<UIElement>>
where
    B: PlatformBackend + ?Sized,
{
    let nodes = backend.snapshot(app, max_depth)?;
    Ok(nodes.into_iter().filter(|e| locator.matches(e)).collect())
}

pub fn find_elements<B>(
    backend: &B,
    app: &AppInfo,
    locator: &LocatorStrategy,
    options: &ResolveOptions,
) -> Result<Vec<UIElement>>
where
    B: PlatformBackend + ?Sized,
{
    locator.validate()?;
    search(backend, app, locator, options.max_depth)
}

/// Polls each link of the chain until its own deadline, then moves on to the
/// fallback with a fresh deadline. Every link is searched at least once, so a
/// zero timeout means "look once".
pub fn find_element<B>(
    backend: &B,
    app: &AppInfo,
    locator: &LocatorStrategy,
    options: &ResolveOptions,
) -> Result<UIElement>
where
    B: PlatformBackend + ?Sized,
{
    locator.validate()?;

    for (depth, link) in locator.chain().enumerate() {
        if depth > 0 {
            tracing::debug!(locator = %link, "trying fallback locator");
        }
        let deadline = deadline_after(link.timeout_duration());
        let index = link.index.unwrap_or(0);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match search(backend, app, link, options.max_depth) {
                Ok(matches) => {
                    if let Some(found) = matches.into_iter().nth(index) {
                        return Ok(found);
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::debug!(error = %e, "tree search failed, retrying"),
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(options.poll_interval.min(deadline - now));
        }
        tracing::debug!(locator = %link, attempts, "locator exhausted");
    }

    Err(Error::element_not_found(locator.to_value(), locator.timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Bounds;
    use crate::error::ErrorCode;
    use crate::virtual_desktop::{VirtualApp, VirtualDesktop, VirtualNode};
    use std::time::Duration;

    fn desktop() -> (VirtualDesktop, AppInfo) {
        let desktop = VirtualDesktop::new().with_poll_interval(Duration::from_millis(10));
        let app = desktop.spawn(
            VirtualApp::new("Demo").with_root(
                VirtualNode::new("window")
                    .title("Main")
                    .bounds(Bounds::new(0.0, 0.0, 400.0, 300.0))
                    .child(VirtualNode::new("button").title("OK").identifier("btnOK"))
                    .child(VirtualNode::new("button").title("OK").identifier("btnOK2")),
            ),
        );
        (desktop, app)
    }

    #[test]
    fn returns_match_at_index() {
        let (desktop, app) = desktop();
        let loc = LocatorStrategy::role_title(Some("button"), "OK").with_index(1);
        let el = desktop.find_element(&app, &loc).unwrap();
        assert_eq!(el.identifier.as_deref(), Some("btnOK2"));

        let all = desktop.find_elements(&app, &LocatorStrategy::role_title(None, "OK")).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn index_past_matches_is_not_found() {
        let (desktop, app) = desktop();
        let loc = LocatorStrategy::role_title(Some("button"), "OK")
            .with_index(5)
            .with_timeout(0.0);
        let err = desktop.find_element(&app, &loc).unwrap_err();
        assert_eq!(err.code, ErrorCode::ElementNotFound);
    }

    #[test]
    fn waits_are_capped() {
        assert_eq!(wait_secs(1e19), MAX_WAIT);
        assert_eq!(wait_secs(f64::INFINITY), MAX_WAIT);
        assert_eq!(wait_secs(f64::NAN), Duration::ZERO);
        assert_eq!(wait_secs(-3.0), Duration::ZERO);
        assert_eq!(wait_secs(0.25), Duration::from_millis(250));
        assert!(deadline_after(Duration::MAX) <= Instant::now() + MAX_WAIT);
    }

    #[test]
    fn huge_timeout_still_finds_present_element() {
        let (desktop, app) = desktop();
        let loc = LocatorStrategy::id("btnOK").with_timeout(1e19);
        assert_eq!(loc.timeout_duration(), MAX_WAIT);
        let el = desktop.find_element(&app, &loc).unwrap();
        assert_eq!(el.identifier.as_deref(), Some("btnOK"));
    }

    #[test]
    fn falls_back_to_next_link() {
        let (desktop, app) = desktop();
        let loc = LocatorStrategy::id("missing")
            .with_timeout(0.05)
            .with_fallback(LocatorStrategy::id("btnOK").with_timeout(0.05));
        let el = desktop.find_element(&app, &loc).unwrap();
        assert_eq!(el.identifier.as_deref(), Some("btnOK"));
    }

    #[test]
    fn exhausted_chain_waits_for_every_link() {
        let (desktop, app) = desktop();
        let loc = LocatorStrategy::id("a")
            .with_timeout(0.1)
            .with_fallback(
                LocatorStrategy::id("b")
                    .with_timeout(0.1)
                    .with_fallback(LocatorStrategy::id("c").with_timeout(0.1)),
            );
        let started = Instant::now();
        let err = desktop.find_element(&app, &loc).unwrap_err();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(300), "gave up after {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(300 + 3 * 100), "took {:?}", elapsed);
        assert_eq!(err.code, ErrorCode::ElementNotFound);
        let ctx = err.context.unwrap();
        assert_eq!(ctx["locator"]["value"], "a");
        assert_eq!(ctx["timeout"], 0.1);
    }

    #[test]
    fn finds_element_that_appears_while_polling() {
        let (desktop, app) = desktop();
        let late = desktop.clone();
        let pid = app.pid;
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(60));
            late.update_tree(pid, |root| {
                root.children.push(VirtualNode::new("text_field").identifier("late"));
            });
        });
        let el = desktop
            .find_element(&app, &LocatorStrategy::id("late").with_timeout(1.0))
            .unwrap();
        assert_eq!(el.role, "text_field");
        handle.join().unwrap();
    }
}
