//! Zone lighting actuation
//!
//! The physical driver sits behind [`ActuationLayer`]. The host build logs
//! highlight requests and tracks the active zone.

use anyhow::Result;
use tracing::info;
use zonelight_shared::ZoneSelector;

/// Capability consumed from the lighting hardware
pub trait ActuationLayer {
    /// Called once at boot; must succeed before anything else runs
    fn initialize(&mut self) -> Result<()>;

    /// Highlight one zone. Returns whether the request was acted on.
    fn highlight_zone(&mut self, zone: ZoneSelector) -> bool;
}

/// Host stand-in for the zone lighting driver
#[derive(Debug, Default)]
pub struct ZoneLightingController {
    initialized: bool,
    active: Option<ZoneSelector>,
}

impl ZoneLightingController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently highlighted zone
    #[cfg(test)]
    pub fn active_zone(&self) -> Option<ZoneSelector> {
        self.active
    }
}

impl ActuationLayer for ZoneLightingController {
    fn initialize(&mut self) -> Result<()> {
        self.initialized = true;
        self.active = None;
        info!("Zone lighting initialized ({} zones)", ZoneSelector::ALL.len());
        Ok(())
    }

    fn highlight_zone(&mut self, zone: ZoneSelector) -> bool {
        if !self.initialized {
            return false;
        }
        info!("Highlighting {}", zone);
        self.active = Some(zone);
        true
    }
}
