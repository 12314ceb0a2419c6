use std::collections::HashSet;
use std::path::Path;

use hublink_envelope::{
    encode, Envelope, HubInfoResponse, NanoappListEntry, NanoappListResponse,
    DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
use serde::{Deserialize, Serialize};

use crate::error::{HubError, Result};
use crate::platform::{
    RequestKind, API_VERSION_1_2, GNSS_CAPABILITIES_LOCATION, GNSS_CAPABILITIES_MEASUREMENTS,
    WIFI_CAPABILITIES_ON_DEMAND_SCAN, WIFI_CAPABILITIES_RADIO_CHAIN_PREF,
    WIFI_CAPABILITIES_RTT_RANGING, WIFI_CAPABILITIES_SCAN_MONITORING,
    WWAN_CAPABILITIES_GET_CELL_INFO,
};
use crate::settings_test::{SETTINGS_TEST_APP_ID, SETTINGS_TEST_APP_VERSION};

/// Maximum accepted config file size.
const MAX_CONFIG_FILE_SIZE: u64 = 256 * 1024;

/// Complete hub configuration, loadable from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HubConfig {
    pub hub: HubDescription,
    pub platform: PlatformConfig,
    /// Nanoapps reported alongside the built-in feature-test nanoapp.
    pub nanoapps: Vec<NanoappConfig>,
}

/// Values reported in `HubInfoResponse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HubDescription {
    pub name: String,
    pub vendor: String,
    pub toolchain: String,
    pub legacy_platform_version: u32,
    pub legacy_toolchain_version: u32,
    pub peak_mips: f32,
    pub stopped_power: f32,
    pub sleep_power: f32,
    pub peak_power: f32,
    pub max_message_len: u32,
    pub platform_id: u64,
    pub version: u32,
}

impl Default for HubDescription {
    fn default() -> Self {
        Self {
            name: "hublink simulated hub".to_string(),
            vendor: "hublink".to_string(),
            toolchain: "rustc".to_string(),
            legacy_platform_version: 0,
            legacy_toolchain_version: 0,
            peak_mips: 350.0,
            stopped_power: 0.0,
            sleep_power: 1.0,
            peak_power: 15.0,
            max_message_len: DEFAULT_MAX_PAYLOAD as u32,
            platform_id: 0x476f_6f67_0000_0001,
            version: API_VERSION_1_2,
        }
    }
}

impl HubDescription {
    pub fn to_response(&self) -> HubInfoResponse {
        HubInfoResponse {
            name: self.name.clone(),
            vendor: self.vendor.clone(),
            toolchain: self.toolchain.clone(),
            legacy_platform_version: self.legacy_platform_version,
            legacy_toolchain_version: self.legacy_toolchain_version,
            peak_mips: self.peak_mips,
            stopped_power: self.stopped_power,
            sleep_power: self.sleep_power,
            peak_power: self.peak_power,
            max_message_len: self.max_message_len,
            platform_id: self.platform_id,
            version: self.version,
        }
    }
}

/// Runtime capabilities and simulated driver behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformConfig {
    /// Runtime API version (`major << 24 | minor << 16 | patch`).
    pub api_version: u32,
    pub wifi_capabilities: u32,
    pub gnss_capabilities: u32,
    pub wwan_capabilities: u32,
    /// Request kinds the user setting currently disables. Their completions
    /// report `FUNCTION_DISABLED`.
    pub disabled: Vec<RequestKind>,
    /// Request kinds that fail synchronously when issued.
    pub fail_to_issue: Vec<RequestKind>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION_1_2,
            wifi_capabilities: WIFI_CAPABILITIES_SCAN_MONITORING
                | WIFI_CAPABILITIES_ON_DEMAND_SCAN
                | WIFI_CAPABILITIES_RADIO_CHAIN_PREF
                | WIFI_CAPABILITIES_RTT_RANGING,
            gnss_capabilities: GNSS_CAPABILITIES_LOCATION | GNSS_CAPABILITIES_MEASUREMENTS,
            wwan_capabilities: WWAN_CAPABILITIES_GET_CELL_INFO,
            disabled: Vec::new(),
            fail_to_issue: Vec::new(),
        }
    }
}

/// A nanoapp listed in `NanoappListResponse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NanoappConfig {
    pub app_id: u64,
    pub app_version: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl HubConfig {
    /// Load and validate a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(HubError::Config(format!(
                "{}: file too large ({} bytes, max {MAX_CONFIG_FILE_SIZE})",
                path.display(),
                metadata.len()
            )));
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parse and validate a JSON config document.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: HubConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hub.max_message_len == 0 {
            return Err(HubError::Config(
                "hub.max_message_len must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for nanoapp in &self.nanoapps {
            if nanoapp.app_id == SETTINGS_TEST_APP_ID {
                return Err(HubError::Config(format!(
                    "nanoapp {:#018x} is reserved for the built-in feature-test nanoapp",
                    nanoapp.app_id
                )));
            }
            if !seen.insert(nanoapp.app_id) {
                return Err(HubError::Config(format!(
                    "duplicate nanoapp {:#018x}",
                    nanoapp.app_id
                )));
            }
        }

        self.check_response_fits(Envelope::HubInfoResponse(self.hub.to_response()))?;
        self.check_response_fits(Envelope::NanoappListResponse(self.nanoapp_list()))?;

        Ok(())
    }

    /// Loaded nanoapps as reported to the host: the built-in feature-test
    /// nanoapp first, then the configured ones in order.
    pub fn nanoapp_list(&self) -> NanoappListResponse {
        let mut entries = Vec::with_capacity(self.nanoapps.len() + 1);
        entries.push(NanoappListEntry {
            app_id: SETTINGS_TEST_APP_ID,
            app_version: SETTINGS_TEST_APP_VERSION,
            enabled: true,
            is_system: true,
        });
        entries.extend(self.nanoapps.iter().map(|app| NanoappListEntry {
            app_id: app.app_id,
            app_version: app.app_version,
            enabled: app.enabled,
            is_system: false,
        }));
        NanoappListResponse { entries }
    }

    // Both responses depend only on config.
    fn check_response_fits(&self, response: Envelope) -> Result<()> {
        let name = response.message_type().name();
        let max = self.hub.max_message_len as usize;
        let size = match encode(&response) {
            Ok(raw) => raw.len() - HEADER_SIZE,
            Err(err) => {
                return Err(HubError::Config(format!("{name} cannot be encoded: {err}")));
            }
        };
        if size > max {
            return Err(HubError::Config(format!(
                "{name} payload is {size} bytes, over hub.max_message_len {max}"
            )));
        }
        Ok(())
    }
}
