//! Hub side of the host link.
//!
//! A [`ProtocolContext`] owns everything the hub keeps between messages: the
//! configured hub description and nanoapp list, the feature-test nanoapp
//! and its single session slot, the platform handle, and the outbox of
//! encoded envelopes for the host. The [`dispatch`] functions route each
//! verified host envelope and each subsystem completion to one handler.

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
#[cfg(unix)]
pub mod link;
pub mod platform;
pub mod settings_test;
pub mod token;

pub use config::{HubConfig, HubDescription, NanoappConfig, PlatformConfig};
pub use context::{HostOutbox, ProtocolContext, SYSTEM_INSTANCE_ID};
pub use dispatch::{route_host_message, route_system_event, route_system_event_from};
pub use error::{HubError, Result};
#[cfg(unix)]
pub use link::{connect, serve_connection, HubListener, LinkStats};
pub use platform::{
    AsyncResult, ErrorCode, EventFamily, Platform, RequestKind, SimulatedPlatform, SystemEvent,
};
pub use settings_test::{
    Feature, FeatureState, SessionState, SettingsTestManager, TestCommand, TestResult, TestSession,
};
pub use token::{CorrelationToken, TokenGenerator};
