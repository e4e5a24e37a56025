//! Platform input hooks
//!
//! One listener per OS, selected at compile time. Hosts without one still
//! drive a `RecordingSession` through `ChannelListener`.

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

// Re-export the current platform
#[cfg(target_os = "macos")]
pub use macos as current;

#[cfg(target_os = "windows")]
pub use windows as current;

use crate::listener::EventListener;
use desktester_core::Result;

/// Input hooks for the host OS. The listener must be pumped on the thread
/// that created it.
#[cfg(target_os = "macos")]
pub fn create_listener() -> Result<Box<dyn EventListener>> {
    Ok(Box::new(macos::MacEventListener::new()?))
}

#[cfg(target_os = "windows")]
pub fn create_listener() -> Result<Box<dyn EventListener>> {
    Ok(Box::new(windows::WindowsEventListener::new()?))
}

/// Linux would need libevdev or XRecord; nothing else has hooks.
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub fn create_listener() -> Result<Box<dyn EventListener>> {
    Err(desktester_core::Error::platform_not_supported(std::env::consts::OS))
}

#[cfg(test)]
mod tests {
    #[cfg(target_os = "linux")]
    #[test]
    fn linux_has_no_listener() {
        use desktester_core::ErrorCode;

        let err = super::create_listener().err().map(|e| e.code);
        assert_eq!(err, Some(ErrorCode::PlatformNotSupported));
    }
}
