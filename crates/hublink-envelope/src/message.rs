//! Typed envelope contents.
//!
//! Tags 1-5 are assigned; tag 0 is reserved as "none" and is never valid on
//! the wire.

use bytes::Bytes;

use crate::error::EnvelopeError;

/// Envelope type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Opaque message exchanged between a host endpoint and a nanoapp.
    NanoappMessage = 1,
    /// Host asks for the hub description.
    HubInfoRequest = 2,
    /// Hub description.
    HubInfoResponse = 3,
    /// Host asks for the loaded nanoapps.
    NanoappListRequest = 4,
    /// Loaded nanoapps.
    NanoappListResponse = 5,
}

impl MessageType {
    /// Returns a human-readable name for the tag.
    pub fn name(self) -> &'static str {
        match self {
            MessageType::NanoappMessage => "NanoappMessage",
            MessageType::HubInfoRequest => "HubInfoRequest",
            MessageType::HubInfoResponse => "HubInfoResponse",
            MessageType::NanoappListRequest => "NanoappListRequest",
            MessageType::NanoappListResponse => "NanoappListResponse",
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = EnvelopeError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(MessageType::NanoappMessage),
            2 => Ok(MessageType::HubInfoRequest),
            3 => Ok(MessageType::HubInfoResponse),
            4 => Ok(MessageType::NanoappListRequest),
            5 => Ok(MessageType::NanoappListResponse),
            other => Err(EnvelopeError::UnknownMessageType(other)),
        }
    }
}

/// A message exchanged between a host endpoint and a nanoapp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NanoappMessage {
    /// Target (host -> hub) or source (hub -> host) nanoapp.
    pub app_id: u64,
    /// Application-defined message type.
    pub message_type: u32,
    /// Host endpoint the message came from or is addressed to.
    pub host_endpoint: u16,
    /// Application payload. May be empty but is always present on the wire.
    pub message: Bytes,
}

impl NanoappMessage {
    /// Create a new nanoapp message.
    pub fn new(
        app_id: u64,
        message_type: u32,
        host_endpoint: u16,
        message: impl Into<Bytes>,
    ) -> Self {
        Self {
            app_id,
            message_type,
            host_endpoint,
            message: message.into(),
        }
    }
}

/// Description of the hub and its runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct HubInfoResponse {
    pub name: String,
    pub vendor: String,
    pub toolchain: String,
    pub legacy_platform_version: u32,
    pub legacy_toolchain_version: u32,
    pub peak_mips: f32,
    pub stopped_power: f32,
    pub sleep_power: f32,
    pub peak_power: f32,
    /// Largest nanoapp message the hub accepts, in bytes.
    pub max_message_len: u32,
    pub platform_id: u64,
    /// Runtime version (`major << 24 | minor << 16 | patch`).
    pub version: u32,
}

/// One loaded nanoapp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NanoappListEntry {
    pub app_id: u64,
    pub app_version: u32,
    pub enabled: bool,
    pub is_system: bool,
}

/// Loaded nanoapps, in hub order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NanoappListResponse {
    pub entries: Vec<NanoappListEntry>,
}

/// A typed envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    NanoappMessage(NanoappMessage),
    HubInfoRequest,
    HubInfoResponse(HubInfoResponse),
    NanoappListRequest,
    NanoappListResponse(NanoappListResponse),
}

impl Envelope {
    /// The tag this envelope is written with.
    pub fn message_type(&self) -> MessageType {
        match self {
            Envelope::NanoappMessage(_) => MessageType::NanoappMessage,
            Envelope::HubInfoRequest => MessageType::HubInfoRequest,
            Envelope::HubInfoResponse(_) => MessageType::HubInfoResponse,
            Envelope::NanoappListRequest => MessageType::NanoappListRequest,
            Envelope::NanoappListResponse(_) => MessageType::NanoappListResponse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_conversion_matches_discriminants() {
        for tag in 1u8..=5 {
            let message_type = MessageType::try_from(tag).unwrap();
            assert_eq!(message_type as u8, tag);
        }
    }

    #[test]
    fn none_and_out_of_range_tags_are_unknown() {
        assert!(matches!(
            MessageType::try_from(0),
            Err(EnvelopeError::UnknownMessageType(0))
        ));
        assert!(matches!(
            MessageType::try_from(6),
            Err(EnvelopeError::UnknownMessageType(6))
        ));
    }
}
