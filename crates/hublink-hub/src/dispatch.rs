//! Routing of host envelopes and subsystem completions to their handlers.

use hublink_envelope::{decode, Envelope, NanoappMessage};
use tracing::{debug, warn};

use crate::context::{ProtocolContext, SYSTEM_INSTANCE_ID};
use crate::error::{HubError, Result};
use crate::platform::{AsyncResult, EventFamily, Platform, SystemEvent};
use crate::settings_test::SETTINGS_TEST_APP_ID;

/// Verify and decode one envelope from the host, then run its handler.
///
/// Envelopes that fail verification are logged and dropped; no response is
/// queued and no state changes. Response envelopes are not accepted from
/// the host and return [`HubError::UnexpectedMessage`].
pub fn route_host_message<P: Platform>(ctx: &mut ProtocolContext<P>, raw: &[u8]) -> Result<()> {
    let envelope = match decode(raw) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(error = %err, len = raw.len(), "dropping malformed host envelope");
            return Err(err.into());
        }
    };

    let message_type = envelope.message_type();
    debug!(message_type = message_type.name(), "routing host envelope");

    match envelope {
        Envelope::NanoappMessage(message) => handle_nanoapp_message(ctx, &message),
        Envelope::HubInfoRequest => handle_hub_info_request(ctx),
        Envelope::NanoappListRequest => handle_nanoapp_list_request(ctx),
        Envelope::HubInfoResponse(_) | Envelope::NanoappListResponse(_) => {
            warn!(
                message_type = message_type.name(),
                "host sent a response envelope, dropping"
            );
            Err(HubError::UnexpectedMessage(message_type.name()))
        }
    }
}

/// Deliver a nanoapp message to the nanoapp it is addressed to.
pub fn handle_nanoapp_message<P: Platform>(
    ctx: &mut ProtocolContext<P>,
    message: &NanoappMessage,
) -> Result<()> {
    if message.app_id != SETTINGS_TEST_APP_ID {
        warn!(
            app_id = format_args!("{:#018x}", message.app_id),
            host_endpoint = message.host_endpoint,
            "no nanoapp with this app id, dropping message"
        );
        return Ok(());
    }

    ctx.settings.handle_message_from_host(
        &mut ctx.platform,
        &mut ctx.outbox,
        SYSTEM_INSTANCE_ID,
        message,
    );
    Ok(())
}

/// Answer with the configured hub description.
pub fn handle_hub_info_request<P: Platform>(ctx: &mut ProtocolContext<P>) -> Result<()> {
    let response = Envelope::HubInfoResponse(ctx.hub_info.clone());
    ctx.outbox.send(&response);
    Ok(())
}

/// Answer with the loaded nanoapps.
pub fn handle_nanoapp_list_request<P: Platform>(ctx: &mut ProtocolContext<P>) -> Result<()> {
    let response = Envelope::NanoappListResponse(ctx.nanoapps.clone());
    ctx.outbox.send(&response);
    Ok(())
}

/// Route a completion raised by the hub runtime.
pub fn route_system_event<P: Platform>(ctx: &mut ProtocolContext<P>, event: &SystemEvent) {
    route_system_event_from(ctx, SYSTEM_INSTANCE_ID, event);
}

/// Route an event from an arbitrary sender. Only the hub runtime may raise
/// completions; anything else is logged and ignored.
pub fn route_system_event_from<P: Platform>(
    ctx: &mut ProtocolContext<P>,
    sender_instance_id: u32,
    event: &SystemEvent,
) {
    if sender_instance_id != SYSTEM_INSTANCE_ID {
        warn!(
            sender_instance_id,
            event = event.name(),
            "event from unknown sender, ignoring"
        );
        return;
    }

    match event {
        SystemEvent::WifiAsyncResult(result) => handle_wifi_async_result(ctx, result),
        SystemEvent::GnssAsyncResult(result) => handle_gnss_async_result(ctx, result),
        SystemEvent::WwanCellInfoResult(result) => handle_wwan_cell_info_result(ctx, result),
    }
}

fn handle_wifi_async_result<P: Platform>(ctx: &mut ProtocolContext<P>, result: &AsyncResult) {
    ctx.settings
        .handle_async_result(&mut ctx.outbox, EventFamily::Wifi, result);
}

fn handle_gnss_async_result<P: Platform>(ctx: &mut ProtocolContext<P>, result: &AsyncResult) {
    ctx.settings
        .handle_async_result(&mut ctx.outbox, EventFamily::Gnss, result);
}

fn handle_wwan_cell_info_result<P: Platform>(ctx: &mut ProtocolContext<P>, result: &AsyncResult) {
    ctx.settings
        .handle_async_result(&mut ctx.outbox, EventFamily::Wwan, result);
}

#[cfg(test)]
mod tests {
    use hublink_envelope::{encode, EnvelopeError, HubInfoResponse, NanoappListResponse};

    use super::*;
    use crate::config::HubConfig;
    use crate::platform::{ErrorCode, RequestKind, SimulatedPlatform};
    use crate::settings_test::{Feature, FeatureState, TestCommand, MESSAGE_TYPE_TEST_COMMAND};

    fn ctx() -> ProtocolContext<SimulatedPlatform> {
        ProtocolContext::simulated(&HubConfig::default())
    }

    fn wire(envelope: &Envelope) -> Vec<u8> {
        encode(envelope).unwrap().to_vec()
    }

    fn test_command(endpoint: u16, feature: Feature) -> Vec<u8> {
        wire(&Envelope::NanoappMessage(NanoappMessage::new(
            SETTINGS_TEST_APP_ID,
            MESSAGE_TYPE_TEST_COMMAND,
            endpoint,
            TestCommand {
                feature,
                state: FeatureState::Enabled,
            }
            .encode(),
        )))
    }

    #[test]
    fn hub_info_request_answers_from_config() {
        let mut ctx = ctx();
        route_host_message(&mut ctx, &wire(&Envelope::HubInfoRequest)).unwrap();

        let response = decode(&ctx.take_outbound().unwrap()).unwrap();
        assert_eq!(
            response,
            Envelope::HubInfoResponse(HubConfig::default().hub.to_response())
        );
        assert!(ctx.take_outbound().is_none());
    }

    #[test]
    fn nanoapp_list_request_answers_with_entries() {
        let mut ctx = ctx();
        route_host_message(&mut ctx, &wire(&Envelope::NanoappListRequest)).unwrap();

        match decode(&ctx.take_outbound().unwrap()).unwrap() {
            Envelope::NanoappListResponse(list) => {
                assert_eq!(list.entries.len(), 1);
                assert_eq!(list.entries[0].app_id, SETTINGS_TEST_APP_ID);
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn malformed_envelope_is_dropped() {
        let mut ctx = ctx();
        let mut raw = wire(&Envelope::HubInfoRequest);
        raw.push(0);

        let err = route_host_message(&mut ctx, &raw).unwrap_err();
        assert!(matches!(
            err,
            HubError::Envelope(EnvelopeError::LengthMismatch { .. })
        ));
        assert_eq!(ctx.outbound_len(), 0);
        assert!(ctx.session_state().is_idle());
    }

    #[test]
    fn response_envelopes_from_host_are_rejected() {
        let mut ctx = ctx();
        let info = wire(&Envelope::HubInfoResponse(HubInfoResponse {
            name: String::new(),
            vendor: String::new(),
            toolchain: String::new(),
            legacy_platform_version: 0,
            legacy_toolchain_version: 0,
            peak_mips: 0.0,
            stopped_power: 0.0,
            sleep_power: 0.0,
            peak_power: 0.0,
            max_message_len: 0,
            platform_id: 0,
            version: 0,
        }));
        let list = wire(&Envelope::NanoappListResponse(NanoappListResponse::default()));

        assert!(matches!(
            route_host_message(&mut ctx, &info),
            Err(HubError::UnexpectedMessage("HubInfoResponse"))
        ));
        assert!(matches!(
            route_host_message(&mut ctx, &list),
            Err(HubError::UnexpectedMessage("NanoappListResponse"))
        ));
        assert_eq!(ctx.outbound_len(), 0);
    }

    #[test]
    fn unknown_app_id_is_dropped() {
        let mut ctx = ctx();
        let raw = wire(&Envelope::NanoappMessage(NanoappMessage::new(
            0xdead,
            MESSAGE_TYPE_TEST_COMMAND,
            1,
            vec![0u8; 8],
        )));

        route_host_message(&mut ctx, &raw).unwrap();
        assert_eq!(ctx.outbound_len(), 0);
        assert!(ctx.session_state().is_idle());
    }

    #[test]
    fn completion_routes_to_session() {
        let mut ctx = ctx();
        route_host_message(&mut ctx, &test_command(9, Feature::WwanCellInfo)).unwrap();
        assert!(!ctx.session_state().is_idle());

        assert_eq!(ctx.deliver_completions(), 1);
        assert!(ctx.session_state().is_idle());
        assert_eq!(ctx.outbound_len(), 1);
    }

    #[test]
    fn events_from_other_senders_are_ignored() {
        let mut ctx = ctx();
        route_host_message(&mut ctx, &test_command(9, Feature::WifiScanning)).unwrap();
        let event = ctx.platform_mut().poll_completion().unwrap();

        route_system_event_from(&mut ctx, 3, &event);
        assert!(!ctx.session_state().is_idle());
        assert_eq!(ctx.outbound_len(), 0);

        route_system_event(&mut ctx, &event);
        assert!(ctx.session_state().is_idle());
        assert_eq!(ctx.outbound_len(), 1);
    }

    #[test]
    fn stray_event_without_session_is_silent() {
        let mut ctx = ctx();
        route_system_event(
            &mut ctx,
            &SystemEvent::WwanCellInfoResult(AsyncResult {
                request_kind: RequestKind::WwanCellInfo,
                error_code: ErrorCode::None,
                token: crate::token::CorrelationToken::from_raw(1),
            }),
        );
        assert_eq!(ctx.outbound_len(), 0);
    }
}
