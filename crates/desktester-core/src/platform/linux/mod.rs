//! Linux has no native backend yet; AT-SPI2 would be the route.

use crate::error::{Error, Result};

pub fn ensure_accessibility() -> Result<()> {
    Err(Error::platform_not_supported("linux"))
}
