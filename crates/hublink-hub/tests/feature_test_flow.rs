use hublink_envelope::{decode, encode, Envelope, NanoappMessage};
use hublink_hub::settings_test::{
    MESSAGE_TYPE_TEST_COMMAND, MESSAGE_TYPE_TEST_RESULT, SETTINGS_TEST_APP_ID,
};
use hublink_hub::{
    route_system_event, AsyncResult, CorrelationToken, ErrorCode, Feature, FeatureState,
    HubConfig, Platform, ProtocolContext, RequestKind, SystemEvent, TestCommand, TestResult,
};

/// Platform that records issued requests and leaves completion to the test.
#[derive(Default)]
struct ManualPlatform {
    api_version: u32,
    wifi: u32,
    gnss: u32,
    wwan: u32,
    refuse: bool,
    issued: Vec<(RequestKind, CorrelationToken)>,
}

impl ManualPlatform {
    fn full() -> Self {
        Self {
            api_version: 0x0102_0000,
            wifi: 0x0F,
            gnss: 0x03,
            wwan: 0x01,
            ..Self::default()
        }
    }
}

impl Platform for ManualPlatform {
    fn api_version(&self) -> u32 {
        self.api_version
    }

    fn wifi_capabilities(&self) -> u32 {
        self.wifi
    }

    fn gnss_capabilities(&self) -> u32 {
        self.gnss
    }

    fn wwan_capabilities(&self) -> u32 {
        self.wwan
    }

    fn request(&mut self, kind: RequestKind, token: CorrelationToken) -> bool {
        if self.refuse {
            return false;
        }
        self.issued.push((kind, token));
        true
    }
}

fn command_bytes(endpoint: u16, feature: Feature, state: FeatureState) -> Vec<u8> {
    encode(&Envelope::NanoappMessage(NanoappMessage::new(
        SETTINGS_TEST_APP_ID,
        MESSAGE_TYPE_TEST_COMMAND,
        endpoint,
        TestCommand { feature, state }.encode(),
    )))
    .unwrap()
    .to_vec()
}

fn drain_results<P: Platform>(ctx: &mut ProtocolContext<P>) -> Vec<(u16, bool)> {
    let mut results = Vec::new();
    while let Some(raw) = ctx.take_outbound() {
        match decode(&raw).unwrap() {
            Envelope::NanoappMessage(msg) => {
                assert_eq!(msg.message_type, MESSAGE_TYPE_TEST_RESULT);
                let result = TestResult::decode(&msg.message).unwrap();
                results.push((msg.host_endpoint, result.success));
            }
            other => panic!("unexpected envelope {other:?}"),
        }
    }
    results
}

fn completion(kind: RequestKind, error_code: ErrorCode, token: CorrelationToken) -> SystemEvent {
    SystemEvent::for_result(AsyncResult {
        request_kind: kind,
        error_code,
        token,
    })
}

#[test]
fn enabled_and_disabled_outcomes() {
    let cases = [
        (FeatureState::Enabled, ErrorCode::None, true),
        (FeatureState::Enabled, ErrorCode::FunctionDisabled, false),
        (FeatureState::Disabled, ErrorCode::FunctionDisabled, true),
        (FeatureState::Disabled, ErrorCode::None, false),
        (FeatureState::Disabled, ErrorCode::Busy, false),
    ];

    for (state, error_code, expected) in cases {
        let mut ctx = ProtocolContext::new(&HubConfig::default(), ManualPlatform::full());
        ctx.route_host_message(&command_bytes(40, Feature::GnssLocation, state))
            .unwrap();

        let (kind, token) = ctx.platform().issued[0];
        assert_eq!(kind, RequestKind::GnssLocationSessionStart);

        route_system_event(&mut ctx, &completion(kind, error_code, token));
        assert_eq!(
            drain_results(&mut ctx),
            vec![(40, expected)],
            "{state:?} with {error_code:?}"
        );
        assert!(ctx.session_state().is_idle());
    }
}

#[test]
fn every_feature_issues_its_request() {
    let expected = [
        (Feature::WifiScanning, RequestKind::WifiScan),
        (Feature::WifiRtt, RequestKind::WifiRanging),
        (Feature::GnssLocation, RequestKind::GnssLocationSessionStart),
        (Feature::GnssMeasurement, RequestKind::GnssMeasurementSessionStart),
        (Feature::WwanCellInfo, RequestKind::WwanCellInfo),
    ];

    for (feature, kind) in expected {
        let mut ctx = ProtocolContext::new(&HubConfig::default(), ManualPlatform::full());
        ctx.route_host_message(&command_bytes(1, feature, FeatureState::Enabled))
            .unwrap();
        assert_eq!(ctx.platform().issued.len(), 1);
        assert_eq!(ctx.platform().issued[0].0, kind);

        let token = ctx.platform().issued[0].1;
        route_system_event(&mut ctx, &completion(kind, ErrorCode::None, token));
        assert_eq!(drain_results(&mut ctx), vec![(1, true)]);
    }
}

#[test]
fn unsupported_feature_never_issues_request() {
    let platform = ManualPlatform {
        wwan: 0,
        ..ManualPlatform::full()
    };
    let mut ctx = ProtocolContext::new(&HubConfig::default(), platform);
    ctx.route_host_message(&command_bytes(2, Feature::WwanCellInfo, FeatureState::Disabled))
        .unwrap();

    assert!(ctx.platform().issued.is_empty());
    assert_eq!(drain_results(&mut ctx), vec![(2, true)]);
}

#[test]
fn refused_request_fails_immediately() {
    let platform = ManualPlatform {
        refuse: true,
        ..ManualPlatform::full()
    };
    let mut ctx = ProtocolContext::new(&HubConfig::default(), platform);
    ctx.route_host_message(&command_bytes(3, Feature::WifiScanning, FeatureState::Enabled))
        .unwrap();

    assert_eq!(drain_results(&mut ctx), vec![(3, false)]);
    assert!(ctx.session_state().is_idle());
}

#[test]
fn stale_completion_after_restart_cannot_finish_new_session() {
    let mut ctx = ProtocolContext::new(&HubConfig::default(), ManualPlatform::full());
    ctx.route_host_message(&command_bytes(1, Feature::WifiScanning, FeatureState::Enabled))
        .unwrap();
    ctx.route_host_message(&command_bytes(2, Feature::WifiScanning, FeatureState::Disabled))
        .unwrap();

    let (kind, first) = ctx.platform().issued[0];
    let (_, second) = ctx.platform().issued[1];
    assert_ne!(first, second);

    // Same kind, same family: only the token tells them apart.
    route_system_event(&mut ctx, &completion(kind, ErrorCode::FunctionDisabled, first));
    assert!(drain_results(&mut ctx).is_empty());
    assert!(!ctx.session_state().is_idle());

    route_system_event(&mut ctx, &completion(kind, ErrorCode::FunctionDisabled, second));
    assert_eq!(drain_results(&mut ctx), vec![(2, true)]);

    route_system_event(&mut ctx, &completion(kind, ErrorCode::FunctionDisabled, second));
    assert!(drain_results(&mut ctx).is_empty());
}

#[test]
fn garbage_bytes_never_change_state() {
    let mut ctx = ProtocolContext::new(&HubConfig::default(), ManualPlatform::full());
    ctx.route_host_message(&command_bytes(1, Feature::WifiScanning, FeatureState::Enabled))
        .unwrap();
    let pending = *ctx.session_state();

    let valid = command_bytes(9, Feature::GnssLocation, FeatureState::Enabled);
    let inputs: Vec<Vec<u8>> = vec![
        Vec::new(),
        vec![0x48],
        vec![0xFF; 64],
        valid[..valid.len() - 1].to_vec(),
        {
            let mut retagged = valid.clone();
            retagged[3] = 2;
            retagged
        },
        {
            let mut wrong_version = valid.clone();
            wrong_version[2] = 0;
            wrong_version
        },
    ];

    for input in inputs {
        assert!(ctx.route_host_message(&input).is_err(), "{input:?}");
    }

    assert_eq!(*ctx.session_state(), pending);
    assert_eq!(ctx.outbound_len(), 0);
    assert_eq!(ctx.platform().issued.len(), 1);
}
