//! Native backends, one per OS, selected at compile time

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "windows")]
pub mod windows;

// Re-export the current platform
#[cfg(target_os = "macos")]
pub use macos as current;

#[cfg(target_os = "linux")]
pub use linux as current;

#[cfg(target_os = "windows")]
pub use windows as current;

use crate::backend::PlatformBackend;
use crate::error::Result;

/// Backend for the host OS. Fails with `PermissionDenied` when the process
/// lacks accessibility access and `PlatformNotSupported` elsewhere; neither
/// is worth retrying.
#[cfg(target_os = "macos")]
pub fn create_backend() -> Result<Box<dyn PlatformBackend>> {
    Ok(Box::new(macos::MacBackend::new()?))
}

#[cfg(target_os = "windows")]
pub fn create_backend() -> Result<Box<dyn PlatformBackend>> {
    Ok(Box::new(windows::WindowsBackend::new()?))
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub fn create_backend() -> Result<Box<dyn PlatformBackend>> {
    Err(crate::error::Error::platform_not_supported(std::env::consts::OS))
}

/// Whether the host grants the access a native backend needs.
#[cfg(any(target_os = "macos", target_os = "windows", target_os = "linux"))]
pub fn has_accessibility() -> bool {
    current::ensure_accessibility().is_ok()
}

#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
pub fn has_accessibility() -> bool {
    false
}

#[cfg(test)]
mod tests {
    #[cfg(target_os = "linux")]
    #[test]
    fn linux_is_not_supported() {
        use crate::error::ErrorCode;

        let err = super::create_backend().err().map(|e| e.code);
        assert_eq!(err, Some(ErrorCode::PlatformNotSupported));
        assert!(!super::has_accessibility());
    }
}
