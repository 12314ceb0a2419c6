//! Message link between a host processor and an always-on hub.
//!
//! # Crate Structure
//!
//! - [`envelope`]: Verified binary envelope codec and stream reader/writer
//! - [`hub`]: Hub-side dispatch, feature-test session and simulated platform

/// Re-export envelope types.
pub mod envelope {
    pub use hublink_envelope::*;
}

/// Re-export hub types.
pub mod hub {
    pub use hublink_hub::*;
}
