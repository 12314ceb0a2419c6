use std::collections::VecDeque;

use bytes::Bytes;
use hublink_envelope::{encode, Envelope, HubInfoResponse, NanoappListResponse};
use tracing::error;

use crate::config::HubConfig;
use crate::dispatch;
use crate::error::Result;
use crate::platform::{Platform, SimulatedPlatform};
use crate::settings_test::{SessionState, SettingsTestManager};

/// Instance id of the hub runtime itself. Host messages and subsystem
/// completions are delivered with this sender.
pub const SYSTEM_INSTANCE_ID: u32 = 0;

/// Encoded envelopes waiting to go to the host, in send order.
#[derive(Debug, Default)]
pub struct HostOutbox {
    queue: VecDeque<Bytes>,
}

impl HostOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode and queue an envelope. Returns `false` if it could not be
    /// encoded; the failure is logged and nothing is queued.
    pub fn send(&mut self, envelope: &Envelope) -> bool {
        match encode(envelope) {
            Ok(raw) => {
                self.queue.push_back(raw);
                true
            }
            Err(err) => {
                error!(
                    error = %err,
                    message_type = envelope.message_type().name(),
                    "failed to encode outbound envelope"
                );
                false
            }
        }
    }

    pub fn pop(&mut self) -> Option<Bytes> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Everything the hub side of the link owns.
///
/// Host messages and completions are handled one at a time through
/// `&mut self`; handlers run in delivery order.
pub struct ProtocolContext<P> {
    pub(crate) hub_info: HubInfoResponse,
    pub(crate) nanoapps: NanoappListResponse,
    pub(crate) settings: SettingsTestManager,
    pub(crate) platform: P,
    pub(crate) outbox: HostOutbox,
}

impl<P: Platform> ProtocolContext<P> {
    pub fn new(config: &HubConfig, platform: P) -> Self {
        Self {
            hub_info: config.hub.to_response(),
            nanoapps: config.nanoapp_list(),
            settings: SettingsTestManager::new(),
            platform,
            outbox: HostOutbox::new(),
        }
    }

    /// Verify, decode and dispatch one envelope from the host.
    pub fn route_host_message(&mut self, raw: &[u8]) -> Result<()> {
        dispatch::route_host_message(self, raw)
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn session_state(&self) -> &SessionState {
        self.settings.state()
    }

    /// Next encoded envelope for the host.
    pub fn take_outbound(&mut self) -> Option<Bytes> {
        self.outbox.pop()
    }

    pub fn outbound_len(&self) -> usize {
        self.outbox.len()
    }
}

impl ProtocolContext<SimulatedPlatform> {
    /// Context backed by the simulated platform described in `config`.
    pub fn simulated(config: &HubConfig) -> Self {
        Self::new(config, SimulatedPlatform::new(config.platform.clone()))
    }

    /// Dispatch every completion the simulated platform has queued.
    /// Returns the number delivered.
    pub fn deliver_completions(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(event) = self.platform.poll_completion() {
            dispatch::route_system_event(self, &event);
            delivered += 1;
        }
        delivered
    }
}
