//! Runtime report served by the settings route.
//!
//! Collecting a report only reads: it never touches a session, the store
//! contents or the indicator.

use serde::Serialize;

use crate::adapters::device_id::DeviceIdentity;
use crate::app::ports::{HeapStats, NetworkStatus, PlatformPort};
use crate::app::service::ChimeStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsReport {
    pub identity: DeviceIdentity,
    pub network: NetworkStatus,
    pub uptime_secs: u64,
    pub heap: HeapStats,
    pub chime: ChimeStatus,
}

impl SettingsReport {
    pub fn collect(
        identity: &DeviceIdentity,
        platform: &impl PlatformPort,
        chime: ChimeStatus,
    ) -> Self {
        Self {
            identity: identity.clone(),
            network: platform.network(),
            uptime_secs: platform.uptime_secs(),
            heap: platform.heap(),
            chime,
        }
    }

    /// JSON body for the HTTP route.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
