//! Feature-test messages carried inside `NanoappMessage.message`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::platform::{ErrorCode, RequestKind};

/// App id of the built-in feature-test nanoapp.
pub const SETTINGS_TEST_APP_ID: u64 = 0x476f_6f67_5400_0010;

/// Version reported for the feature-test nanoapp.
pub const SETTINGS_TEST_APP_VERSION: u32 = 1;

/// Host -> hub: start a feature test.
pub const MESSAGE_TYPE_TEST_COMMAND: u32 = 1;

/// Hub -> host: outcome of a feature test.
pub const MESSAGE_TYPE_TEST_RESULT: u32 = 2;

const TEST_COMMAND_SIZE: usize = 8;
const TEST_RESULT_SIZE: usize = 1;

/// Errors decoding feature-test payloads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("payload is {actual} bytes, expected {expected}")]
    WrongLength { expected: usize, actual: usize },

    #[error("unknown feature {0}")]
    UnknownFeature(u32),

    #[error("unknown feature state {0}")]
    UnknownState(u32),

    #[error("invalid success flag {0}")]
    InvalidSuccessFlag(u8),
}

/// Subsystem feature under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Feature {
    WifiScanning = 0,
    WifiRtt = 1,
    GnssLocation = 2,
    GnssMeasurement = 3,
    WwanCellInfo = 4,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::WifiScanning,
        Feature::WifiRtt,
        Feature::GnssLocation,
        Feature::GnssMeasurement,
        Feature::WwanCellInfo,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::WifiScanning => "wifi_scanning",
            Feature::WifiRtt => "wifi_rtt",
            Feature::GnssLocation => "gnss_location",
            Feature::GnssMeasurement => "gnss_measurement",
            Feature::WwanCellInfo => "wwan_cell_info",
        }
    }

    /// The asynchronous request that exercises this feature.
    pub fn request_kind(self) -> RequestKind {
        match self {
            Feature::WifiScanning => RequestKind::WifiScan,
            Feature::WifiRtt => RequestKind::WifiRanging,
            Feature::GnssLocation => RequestKind::GnssLocationSessionStart,
            Feature::GnssMeasurement => RequestKind::GnssMeasurementSessionStart,
            Feature::WwanCellInfo => RequestKind::WwanCellInfo,
        }
    }
}

impl TryFrom<u32> for Feature {
    type Error = CommandError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Feature::WifiScanning),
            1 => Ok(Feature::WifiRtt),
            2 => Ok(Feature::GnssLocation),
            3 => Ok(Feature::GnssMeasurement),
            4 => Ok(Feature::WwanCellInfo),
            other => Err(CommandError::UnknownFeature(other)),
        }
    }
}

/// Setting state the host has put the feature in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum FeatureState {
    Enabled = 0,
    Disabled = 1,
}

impl FeatureState {
    pub fn name(self) -> &'static str {
        match self {
            FeatureState::Enabled => "enabled",
            FeatureState::Disabled => "disabled",
        }
    }

    /// Error code a completion must carry for the test to pass.
    pub fn expected_error_code(self) -> ErrorCode {
        match self {
            FeatureState::Enabled => ErrorCode::None,
            FeatureState::Disabled => ErrorCode::FunctionDisabled,
        }
    }
}

impl TryFrom<u32> for FeatureState {
    type Error = CommandError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FeatureState::Enabled),
            1 => Ok(FeatureState::Disabled),
            other => Err(CommandError::UnknownState(other)),
        }
    }
}

/// Request to test one feature against its expected setting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestCommand {
    pub feature: Feature,
    pub state: FeatureState,
}

impl TestCommand {
    /// Layout: `feature u32 LE, state u32 LE`.
    pub fn decode(mut buf: &[u8]) -> Result<Self, CommandError> {
        if buf.len() != TEST_COMMAND_SIZE {
            return Err(CommandError::WrongLength {
                expected: TEST_COMMAND_SIZE,
                actual: buf.len(),
            });
        }
        let feature = Feature::try_from(buf.get_u32_le())?;
        let state = FeatureState::try_from(buf.get_u32_le())?;
        Ok(Self { feature, state })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(TEST_COMMAND_SIZE);
        buf.put_u32_le(self.feature as u32);
        buf.put_u32_le(self.state as u32);
        buf.freeze()
    }
}

/// Outcome of one feature test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestResult {
    pub success: bool,
}

impl TestResult {
    pub fn decode(buf: &[u8]) -> Result<Self, CommandError> {
        match buf {
            [0] => Ok(Self { success: false }),
            [1] => Ok(Self { success: true }),
            [other] => Err(CommandError::InvalidSuccessFlag(*other)),
            _ => Err(CommandError::WrongLength {
                expected: TEST_RESULT_SIZE,
                actual: buf.len(),
            }),
        }
    }

    pub fn encode(&self) -> Bytes {
        Bytes::copy_from_slice(&[u8::from(self.success)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_test_command() {
        let raw = [3, 0, 0, 0, 1, 0, 0, 0];
        let command = TestCommand::decode(&raw).unwrap();
        assert_eq!(command.feature, Feature::GnssMeasurement);
        assert_eq!(command.state, FeatureState::Disabled);
        assert_eq!(command.encode().as_ref(), &raw);
    }

    #[test]
    fn test_command_rejects_bad_values() {
        assert_eq!(
            TestCommand::decode(&[9, 0, 0, 0, 0, 0, 0, 0]),
            Err(CommandError::UnknownFeature(9))
        );
        assert_eq!(
            TestCommand::decode(&[0, 0, 0, 0, 2, 0, 0, 0]),
            Err(CommandError::UnknownState(2))
        );
        assert_eq!(
            TestCommand::decode(&[0, 0, 0, 0]),
            Err(CommandError::WrongLength {
                expected: 8,
                actual: 4
            })
        );
        assert!(TestCommand::decode(&[0; 9]).is_err());
    }

    #[test]
    fn test_result_is_one_byte() {
        assert_eq!(TestResult { success: true }.encode().as_ref(), &[1]);
        assert_eq!(TestResult { success: false }.encode().as_ref(), &[0]);
        assert_eq!(TestResult::decode(&[1]), Ok(TestResult { success: true }));
        assert_eq!(
            TestResult::decode(&[2]),
            Err(CommandError::InvalidSuccessFlag(2))
        );
        assert!(TestResult::decode(&[]).is_err());
    }

    #[test]
    fn every_feature_maps_to_a_distinct_request() {
        let kinds: std::collections::HashSet<_> =
            Feature::ALL.iter().map(|f| f.request_kind()).collect();
        assert_eq!(kinds.len(), Feature::ALL.len());
        for feature in Feature::ALL {
            assert_eq!(Feature::try_from(feature as u32), Ok(feature));
        }
    }

    #[test]
    fn expected_error_codes() {
        assert_eq!(FeatureState::Enabled.expected_error_code(), ErrorCode::None);
        assert_eq!(
            FeatureState::Disabled.expected_error_code(),
            ErrorCode::FunctionDisabled
        );
    }
}
