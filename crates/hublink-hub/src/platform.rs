//! Interface to the hub's subsystem drivers.
//!
//! Drivers are external collaborators: the hub only issues fire-and-forget
//! requests and later receives their completions as [`SystemEvent`]s.
//! [`SimulatedPlatform`] stands in for real drivers on a workstation.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PlatformConfig;
use crate::token::CorrelationToken;

/// Build a runtime API version (`major << 24 | minor << 16 | patch`).
pub const fn api_version(major: u8, minor: u8, patch: u16) -> u32 {
    ((major as u32) << 24) | ((minor as u32) << 16) | patch as u32
}

pub const API_VERSION_1_1: u32 = api_version(1, 1, 0);
pub const API_VERSION_1_2: u32 = api_version(1, 2, 0);

pub const WIFI_CAPABILITIES_SCAN_MONITORING: u32 = 0x1;
pub const WIFI_CAPABILITIES_ON_DEMAND_SCAN: u32 = 0x2;
pub const WIFI_CAPABILITIES_RADIO_CHAIN_PREF: u32 = 0x4;
pub const WIFI_CAPABILITIES_RTT_RANGING: u32 = 0x8;

pub const GNSS_CAPABILITIES_LOCATION: u32 = 0x1;
pub const GNSS_CAPABILITIES_MEASUREMENTS: u32 = 0x2;

pub const WWAN_CAPABILITIES_GET_CELL_INFO: u32 = 0x1;

/// Kind of asynchronous subsystem request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    WifiScan,
    WifiRanging,
    GnssLocationSessionStart,
    GnssMeasurementSessionStart,
    WwanCellInfo,
}

impl RequestKind {
    pub fn name(self) -> &'static str {
        match self {
            RequestKind::WifiScan => "wifi_scan",
            RequestKind::WifiRanging => "wifi_ranging",
            RequestKind::GnssLocationSessionStart => "gnss_location_session_start",
            RequestKind::GnssMeasurementSessionStart => "gnss_measurement_session_start",
            RequestKind::WwanCellInfo => "wwan_cell_info",
        }
    }

    /// The completion event family this request answers on.
    pub fn family(self) -> EventFamily {
        match self {
            RequestKind::WifiScan | RequestKind::WifiRanging => EventFamily::Wifi,
            RequestKind::GnssLocationSessionStart | RequestKind::GnssMeasurementSessionStart => {
                EventFamily::Gnss
            }
            RequestKind::WwanCellInfo => EventFamily::Wwan,
        }
    }
}

/// Subsystem error code carried by a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    None,
    Error,
    InvalidArgument,
    Busy,
    NoMemory,
    NotSupported,
    Timeout,
    FunctionDisabled,
    RejectedRateLimit,
    FunctionRestrictedToOtherMaster,
    /// A code this hub does not know, kept as received.
    Unknown(u8),
}

impl ErrorCode {
    pub fn code(self) -> u8 {
        match self {
            ErrorCode::None => 0,
            ErrorCode::Error => 1,
            ErrorCode::InvalidArgument => 2,
            ErrorCode::Busy => 3,
            ErrorCode::NoMemory => 4,
            ErrorCode::NotSupported => 5,
            ErrorCode::Timeout => 6,
            ErrorCode::FunctionDisabled => 7,
            ErrorCode::RejectedRateLimit => 8,
            ErrorCode::FunctionRestrictedToOtherMaster => 9,
            ErrorCode::Unknown(code) => code,
        }
    }
}

impl From<u8> for ErrorCode {
    fn from(code: u8) -> Self {
        match code {
            0 => ErrorCode::None,
            1 => ErrorCode::Error,
            2 => ErrorCode::InvalidArgument,
            3 => ErrorCode::Busy,
            4 => ErrorCode::NoMemory,
            5 => ErrorCode::NotSupported,
            6 => ErrorCode::Timeout,
            7 => ErrorCode::FunctionDisabled,
            8 => ErrorCode::RejectedRateLimit,
            9 => ErrorCode::FunctionRestrictedToOtherMaster,
            other => ErrorCode::Unknown(other),
        }
    }
}

/// Completion of an asynchronous request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncResult {
    pub request_kind: RequestKind,
    pub error_code: ErrorCode,
    /// Echo of the token the request was issued with.
    pub token: CorrelationToken,
}

/// Group of request kinds that complete on the same event tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFamily {
    Wifi,
    Gnss,
    Wwan,
}

impl EventFamily {
    /// Whether a completion of `kind` may legitimately arrive on this family.
    pub fn accepts(self, kind: RequestKind) -> bool {
        kind.family() == self
    }
}

/// Hub-internal completion event, tagged by subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEvent {
    WifiAsyncResult(AsyncResult),
    GnssAsyncResult(AsyncResult),
    WwanCellInfoResult(AsyncResult),
}

impl SystemEvent {
    /// Wrap a completion in the event tag its request kind completes on.
    pub fn for_result(result: AsyncResult) -> Self {
        match result.request_kind.family() {
            EventFamily::Wifi => SystemEvent::WifiAsyncResult(result),
            EventFamily::Gnss => SystemEvent::GnssAsyncResult(result),
            EventFamily::Wwan => SystemEvent::WwanCellInfoResult(result),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SystemEvent::WifiAsyncResult(_) => "WifiAsyncResult",
            SystemEvent::GnssAsyncResult(_) => "GnssAsyncResult",
            SystemEvent::WwanCellInfoResult(_) => "WwanCellInfoResult",
        }
    }

    pub fn family(&self) -> EventFamily {
        match self {
            SystemEvent::WifiAsyncResult(_) => EventFamily::Wifi,
            SystemEvent::GnssAsyncResult(_) => EventFamily::Gnss,
            SystemEvent::WwanCellInfoResult(_) => EventFamily::Wwan,
        }
    }

    pub fn result(&self) -> &AsyncResult {
        match self {
            SystemEvent::WifiAsyncResult(result)
            | SystemEvent::GnssAsyncResult(result)
            | SystemEvent::WwanCellInfoResult(result) => result,
        }
    }
}

/// Hub runtime services used by the feature-test nanoapp.
pub trait Platform {
    /// Runtime API version (`major << 24 | minor << 16 | patch`).
    fn api_version(&self) -> u32;

    fn wifi_capabilities(&self) -> u32;

    fn gnss_capabilities(&self) -> u32;

    fn wwan_capabilities(&self) -> u32;

    /// Issue an asynchronous request. Never blocks.
    ///
    /// Returns `false` if the request could not be issued; no completion
    /// follows in that case.
    fn request(&mut self, kind: RequestKind, token: CorrelationToken) -> bool;
}

/// In-process platform that answers requests from configuration.
///
/// Each issued request queues one completion, reported with
/// `FUNCTION_DISABLED` when the request kind is configured as disabled by
/// user setting and `NONE` otherwise.
#[derive(Debug)]
pub struct SimulatedPlatform {
    config: PlatformConfig,
    completions: VecDeque<SystemEvent>,
}

impl SimulatedPlatform {
    pub fn new(config: PlatformConfig) -> Self {
        Self {
            config,
            completions: VecDeque::new(),
        }
    }

    /// Next queued completion, in issue order.
    pub fn poll_completion(&mut self) -> Option<SystemEvent> {
        self.completions.pop_front()
    }

    /// Number of completions not yet delivered.
    pub fn pending_completions(&self) -> usize {
        self.completions.len()
    }

    /// Toggle the user setting that disables a request kind.
    pub fn set_disabled(&mut self, kind: RequestKind, disabled: bool) {
        self.config.disabled.retain(|k| *k != kind);
        if disabled {
            self.config.disabled.push(kind);
        }
    }
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new(PlatformConfig::default())
    }
}

impl Platform for SimulatedPlatform {
    fn api_version(&self) -> u32 {
        self.config.api_version
    }

    fn wifi_capabilities(&self) -> u32 {
        self.config.wifi_capabilities
    }

    fn gnss_capabilities(&self) -> u32 {
        self.config.gnss_capabilities
    }

    fn wwan_capabilities(&self) -> u32 {
        self.config.wwan_capabilities
    }

    fn request(&mut self, kind: RequestKind, token: CorrelationToken) -> bool {
        if self.config.fail_to_issue.contains(&kind) {
            debug!(kind = kind.name(), %token, "simulated request refused");
            return false;
        }

        let error_code = if self.config.disabled.contains(&kind) {
            ErrorCode::FunctionDisabled
        } else {
            ErrorCode::None
        };
        debug!(
            kind = kind.name(),
            %token,
            error_code = error_code.code(),
            "simulated request issued"
        );
        self.completions.push_back(SystemEvent::for_result(AsyncResult {
            request_kind: kind,
            error_code,
            token,
        }));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_version_encoding() {
        assert_eq!(API_VERSION_1_1, 0x0101_0000);
        assert_eq!(API_VERSION_1_2, 0x0102_0000);
        assert_eq!(api_version(1, 7, 3), 0x0107_0003);
    }

    #[test]
    fn error_codes_roundtrip_and_preserve_unknown() {
        for code in 0u8..=9 {
            assert_eq!(ErrorCode::from(code).code(), code);
        }
        assert_eq!(ErrorCode::from(7), ErrorCode::FunctionDisabled);
        assert_eq!(ErrorCode::from(42), ErrorCode::Unknown(42));
        assert_eq!(ErrorCode::Unknown(42).code(), 42);
    }

    #[test]
    fn families_accept_their_own_kinds() {
        assert!(EventFamily::Wifi.accepts(RequestKind::WifiScan));
        assert!(EventFamily::Wifi.accepts(RequestKind::WifiRanging));
        assert!(EventFamily::Gnss.accepts(RequestKind::GnssLocationSessionStart));
        assert!(EventFamily::Gnss.accepts(RequestKind::GnssMeasurementSessionStart));
        assert!(EventFamily::Wwan.accepts(RequestKind::WwanCellInfo));
        assert!(!EventFamily::Wifi.accepts(RequestKind::WwanCellInfo));
        assert!(!EventFamily::Gnss.accepts(RequestKind::WifiScan));
    }

    #[test]
    fn simulated_request_queues_completion() {
        let mut platform = SimulatedPlatform::default();
        let token = CorrelationToken::from_raw(9);
        assert!(platform.request(RequestKind::GnssLocationSessionStart, token));

        let event = platform.poll_completion().unwrap();
        assert_eq!(event.family(), EventFamily::Gnss);
        assert_eq!(event.result().token, token);
        assert_eq!(event.result().error_code, ErrorCode::None);
        assert!(platform.poll_completion().is_none());
    }

    #[test]
    fn simulated_disabled_and_refused_requests() {
        let mut platform = SimulatedPlatform::new(PlatformConfig {
            fail_to_issue: vec![RequestKind::WifiRanging],
            ..PlatformConfig::default()
        });
        platform.set_disabled(RequestKind::WifiScan, true);

        assert!(!platform.request(RequestKind::WifiRanging, CorrelationToken::from_raw(1)));
        assert_eq!(platform.pending_completions(), 0);

        assert!(platform.request(RequestKind::WifiScan, CorrelationToken::from_raw(2)));
        let event = platform.poll_completion().unwrap();
        assert_eq!(event.result().error_code, ErrorCode::FunctionDisabled);

        platform.set_disabled(RequestKind::WifiScan, false);
        assert!(platform.request(RequestKind::WifiScan, CorrelationToken::from_raw(3)));
        let event = platform.poll_completion().unwrap();
        assert_eq!(event.result().error_code, ErrorCode::None);
    }
}
