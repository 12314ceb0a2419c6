//! Built-in feature-test nanoapp.
//!
//! The host sends a [`TestCommand`] naming a feature and the state its user
//! setting is in. The nanoapp issues the feature's asynchronous request and,
//! when the completion arrives, checks that it reports `NONE` for an enabled
//! feature or `FUNCTION_DISABLED` for a disabled one. Exactly one
//! [`TestResult`] goes back to the host per accepted command.
//!
//! At most one test is in flight. Starting another replaces it, and the
//! replaced test's token can no longer produce a result. There is no timeout:
//! a request whose completion never arrives leaves the session pending until
//! the next command.

pub mod protocol;
pub mod session;

use hublink_envelope::{Envelope, NanoappMessage};
use tracing::{debug, error, info, warn};

use crate::context::{HostOutbox, SYSTEM_INSTANCE_ID};
use crate::platform::{AsyncResult, EventFamily, Platform, API_VERSION_1_1, API_VERSION_1_2};
use crate::platform::{
    GNSS_CAPABILITIES_LOCATION, GNSS_CAPABILITIES_MEASUREMENTS, WIFI_CAPABILITIES_ON_DEMAND_SCAN,
    WIFI_CAPABILITIES_RTT_RANGING, WWAN_CAPABILITIES_GET_CELL_INFO,
};
use crate::token::TokenGenerator;

pub use protocol::{
    CommandError, Feature, FeatureState, TestCommand, TestResult, MESSAGE_TYPE_TEST_COMMAND,
    MESSAGE_TYPE_TEST_RESULT, SETTINGS_TEST_APP_ID, SETTINGS_TEST_APP_VERSION,
};
pub use session::{SessionState, TestSession};

/// Whether the platform can run the test for `feature` at all.
pub fn is_feature_supported<P: Platform + ?Sized>(platform: &P, feature: Feature) -> bool {
    let version = platform.api_version();
    match feature {
        Feature::WifiScanning => {
            version >= API_VERSION_1_1
                && platform.wifi_capabilities() & WIFI_CAPABILITIES_ON_DEMAND_SCAN != 0
        }
        Feature::WifiRtt => {
            version >= API_VERSION_1_2
                && platform.wifi_capabilities() & WIFI_CAPABILITIES_RTT_RANGING != 0
        }
        Feature::GnssLocation => {
            version >= API_VERSION_1_1
                && platform.gnss_capabilities() & GNSS_CAPABILITIES_LOCATION != 0
        }
        Feature::GnssMeasurement => {
            version >= API_VERSION_1_1
                && platform.gnss_capabilities() & GNSS_CAPABILITIES_MEASUREMENTS != 0
        }
        Feature::WwanCellInfo => {
            version >= API_VERSION_1_1
                && platform.wwan_capabilities() & WWAN_CAPABILITIES_GET_CELL_INFO != 0
        }
    }
}

/// Session state machine of the feature-test nanoapp.
#[derive(Debug, Default)]
pub struct SettingsTestManager {
    state: SessionState,
    tokens: TokenGenerator,
}

impl SettingsTestManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Handle a nanoapp message delivered from the host.
    ///
    /// Commands that can't be accepted (wrong sender, wrong message type,
    /// malformed payload) are answered with a failed result and never touch
    /// the session slot.
    pub fn handle_message_from_host<P: Platform + ?Sized>(
        &mut self,
        platform: &mut P,
        outbox: &mut HostOutbox,
        sender_instance_id: u32,
        message: &NanoappMessage,
    ) {
        let endpoint = message.host_endpoint;

        if sender_instance_id != SYSTEM_INSTANCE_ID {
            error!(sender_instance_id, "incorrect sender instance id");
        } else if message.message_type != MESSAGE_TYPE_TEST_COMMAND {
            error!(
                message_type = message.message_type,
                host_endpoint = endpoint,
                "invalid message type"
            );
        } else {
            match TestCommand::decode(&message.message) {
                Ok(command) => {
                    self.start_test(platform, outbox, endpoint, command.feature, command.state);
                    return;
                }
                Err(err) => {
                    error!(error = %err, host_endpoint = endpoint, "failed to decode test command");
                }
            }
        }

        send_result_to_host(outbox, endpoint, false);
    }

    /// Start a test, replacing any pending one.
    pub fn start_test<P: Platform + ?Sized>(
        &mut self,
        platform: &mut P,
        outbox: &mut HostOutbox,
        host_endpoint_id: u16,
        feature: Feature,
        desired_state: FeatureState,
    ) {
        if !is_feature_supported(&*platform, feature) {
            info!(
                feature = feature.name(),
                host_endpoint = host_endpoint_id,
                "feature not supported, skipping test"
            );
            self.report_result(outbox, host_endpoint_id, true);
            return;
        }

        let token = self.tokens.next_token();
        if !platform.request(feature.request_kind(), token) {
            error!(
                feature = feature.name(),
                request = feature.request_kind().name(),
                "failed to issue request"
            );
            self.report_result(outbox, host_endpoint_id, false);
            return;
        }

        if let SessionState::Pending(previous) = self.state {
            warn!(
                previous_feature = previous.feature.name(),
                previous_token = %previous.token,
                "replacing pending test session"
            );
        }

        info!(
            feature = feature.name(),
            state = desired_state.name(),
            host_endpoint = host_endpoint_id,
            %token,
            "starting feature test"
        );
        self.state = SessionState::Pending(TestSession {
            host_endpoint_id,
            feature,
            desired_state,
            token,
        });
    }

    /// Check a completion against the pending session.
    ///
    /// `family` is the event tag the completion arrived on. A completion
    /// whose token is not the pending token is dropped without a report.
    pub fn handle_async_result(
        &mut self,
        outbox: &mut HostOutbox,
        family: EventFamily,
        result: &AsyncResult,
    ) {
        let session = match self.state {
            SessionState::Pending(session) => session,
            SessionState::Idle => {
                debug!(
                    request = result.request_kind.name(),
                    token = %result.token,
                    "no test session, dropping completion"
                );
                return;
            }
        };

        if result.token != session.token {
            warn!(
                expected = %session.token,
                received = %result.token,
                "unexpected token on async result"
            );
            return;
        }

        let success = if !family.accepts(result.request_kind) {
            error!(
                ?family,
                request = result.request_kind.name(),
                "unexpected request type"
            );
            false
        } else if result.request_kind != session.feature.request_kind() {
            error!(
                feature = session.feature.name(),
                request = result.request_kind.name(),
                "async result does not match test feature"
            );
            false
        } else {
            let expected = session.desired_state.expected_error_code();
            if result.error_code != expected {
                error!(
                    error_code = result.error_code.code(),
                    expected = expected.code(),
                    "unexpected async result"
                );
                false
            } else {
                true
            }
        };

        self.report_result(outbox, session.host_endpoint_id, success);
    }

    /// Send a test outcome to the host and return the session to idle.
    pub fn report_result(&mut self, outbox: &mut HostOutbox, host_endpoint_id: u16, success: bool) {
        send_result_to_host(outbox, host_endpoint_id, success);
        self.state = SessionState::Idle;
    }
}

fn send_result_to_host(outbox: &mut HostOutbox, host_endpoint_id: u16, success: bool) {
    info!(host_endpoint = host_endpoint_id, success, "sending test result");
    let message = NanoappMessage::new(
        SETTINGS_TEST_APP_ID,
        MESSAGE_TYPE_TEST_RESULT,
        host_endpoint_id,
        TestResult { success }.encode(),
    );
    outbox.send(&Envelope::NanoappMessage(message));
}
