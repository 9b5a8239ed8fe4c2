//! Vault discovery.
//!
//! Backfills every historically created vault once at startup, then
//! watches live creation events, pushing each address into the shared
//! candidate queue. Both phases feed the same queue interface.

pub mod discovery;
pub mod error;

pub use discovery::{DiscoveryService, DiscoveryState};
pub use error::{DiscoveryError, DiscoveryResult};
